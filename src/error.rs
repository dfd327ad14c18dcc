use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PortalError {
    #[error("invalid data portal: {0}")]
    InvalidPortal(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("unknown app state key: {0}")]
    InvalidStateKey(String),

    #[error("portal API request failed: {0}")]
    Http(String),

    #[error("portal API returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to read app state at {path}: {message}")]
    #[diagnostic(help("delete the file to restore the default portal and format"))]
    StateParse { path: PathBuf, message: String },

    #[error("failed to read response cache at {path}: {message}")]
    #[diagnostic(help("clear the cache with `ena-pb cache clear` or delete the file"))]
    CacheParse { path: PathBuf, message: String },

    #[error("invalid configuration value for {key}: {message}")]
    ConfigParse { key: String, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
}

impl PortalError {
    /// Transport-class failures: surfaced as a transient notification in the
    /// browser instead of ending the session.
    pub fn is_transport(&self) -> bool {
        matches!(self, PortalError::Http(_) | PortalError::Status { .. })
    }

    /// Bad enum values or keys handed to the state store.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PortalError::InvalidPortal(_)
                | PortalError::InvalidFormat(_)
                | PortalError::InvalidStateKey(_)
                | PortalError::StateParse { .. }
        )
    }
}
