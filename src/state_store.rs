use camino::Utf8PathBuf;

use crate::domain::{AppState, StateUpdate};
use crate::error::PortalError;
use crate::store::{JsonLayout, read_json, write_json_atomic};

/// Durable home of the global portal/format selection.
pub trait AppStateStore {
    fn read(&self) -> Result<AppState, PortalError>;
    fn update(&mut self, update: StateUpdate) -> Result<AppState, PortalError>;

    /// String form of [`AppStateStore::update`]; unknown keys or values fail
    /// before anything is written.
    fn update_field(&mut self, key: &str, value: &str) -> Result<AppState, PortalError> {
        let update = StateUpdate::parse(key, value)?;
        self.update(update)
    }
}

#[derive(Debug, Clone)]
pub struct FileAppStateStore {
    path: Utf8PathBuf,
}

impl FileAppStateStore {
    /// Opens the store, writing the default state if the file is missing.
    pub fn open(path: impl Into<Utf8PathBuf>) -> Result<Self, PortalError> {
        let store = Self { path: path.into() };
        match store.load()? {
            Some(state) => tracing::debug!("app state exists at {}: {state:?}", store.path),
            None => {
                tracing::info!("making new default app state at {}", store.path);
                write_json_atomic(&store.path, &AppState::default(), JsonLayout::Pretty)?;
            }
        }
        Ok(store)
    }

    fn load(&self) -> Result<Option<AppState>, PortalError> {
        read_json(&self.path, |message| PortalError::StateParse {
            path: self.path.clone().into_std_path_buf(),
            message,
        })
    }
}

impl AppStateStore for FileAppStateStore {
    fn read(&self) -> Result<AppState, PortalError> {
        Ok(self.load()?.unwrap_or_default())
    }

    fn update(&mut self, update: StateUpdate) -> Result<AppState, PortalError> {
        let mut state = self.read()?;
        update.apply(&mut state);
        write_json_atomic(&self.path, &state, JsonLayout::Pretty)?;
        tracing::info!("app state updated: {update:?}");
        Ok(state)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAppStateStore {
    state: AppState,
}

impl MemoryAppStateStore {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl AppStateStore for MemoryAppStateStore {
    fn read(&self) -> Result<AppState, PortalError> {
        Ok(self.state)
    }

    fn update(&mut self, update: StateUpdate) -> Result<AppState, PortalError> {
        update.apply(&mut self.state);
        Ok(self.state)
    }
}
