use std::path::Path;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::PortalError;

pub const DEFAULT_API_URL_PREFIX: &str = "https://www.ebi.ac.uk/ena/portal/api/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CACHE_FILE: &str = ".cache";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url_prefix: String,
    pub timeout: Duration,
    pub cache_file: Utf8PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url_prefix: DEFAULT_API_URL_PREFIX.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cache_file: Utf8PathBuf::from(DEFAULT_CACHE_FILE),
        }
    }
}

impl Config {
    pub fn state_path(&self) -> Utf8PathBuf {
        suffixed(&self.cache_file, "-state.json")
    }

    pub fn data_path(&self) -> Utf8PathBuf {
        suffixed(&self.cache_file, "-data.json")
    }

    pub fn log_path(&self) -> Utf8PathBuf {
        suffixed(&self.cache_file, ".log")
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_url_prefix: Option<String>,
    pub timeout_secs: Option<u64>,
    pub cache_file: Option<Utf8PathBuf>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `.env` (or `env_file`) into the process environment without
    /// overriding variables that are already set, then reads the options.
    pub fn resolve(env_file: Option<&Path>) -> Result<Config, PortalError> {
        let loaded = match env_file {
            Some(path) => dotenvy::from_path(path).map(|_| Some(path.to_path_buf())),
            None => dotenvy::dotenv().map(Some),
        };
        match loaded {
            Ok(Some(path)) => tracing::debug!("loaded env file {}", path.display()),
            Ok(None) => {}
            Err(err) if err.not_found() && env_file.is_none() => {}
            Err(err) => {
                return Err(PortalError::ConfigParse {
                    key: "env_file".to_string(),
                    message: err.to_string(),
                });
            }
        }

        Self::resolve_with(|key| std::env::var(key).ok())
    }

    /// Option names are matched case-insensitively, bare or with an `ENA_`
    /// prefix.
    pub fn resolve_with<F>(lookup: F) -> Result<Config, PortalError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            let upper = name.to_uppercase();
            [
                upper.clone(),
                name.to_string(),
                format!("ENA_{upper}"),
                format!("ena_{name}"),
            ]
            .iter()
            .find_map(|key| lookup(key.as_str()))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
        };

        let mut config = Config::default();

        if let Some(prefix) = read("api_url_prefix") {
            if !(prefix.starts_with("http://") || prefix.starts_with("https://")) {
                return Err(PortalError::ConfigParse {
                    key: "api_url_prefix".to_string(),
                    message: format!("not an http(s) URL: {prefix}"),
                });
            }
            config.api_url_prefix = prefix;
        }

        if let Some(timeout) = read("timeout") {
            let secs = timeout
                .parse::<u64>()
                .map_err(|err| PortalError::ConfigParse {
                    key: "timeout".to_string(),
                    message: err.to_string(),
                })?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(cache_file) = read("cache_file") {
            config.cache_file = Utf8PathBuf::from(cache_file);
        }

        Ok(config)
    }

    pub fn apply_overrides(mut config: Config, overrides: ConfigOverrides) -> Config {
        if let Some(prefix) = overrides.api_url_prefix {
            config.api_url_prefix = prefix;
        }
        if let Some(secs) = overrides.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(cache_file) = overrides.cache_file {
            config.cache_file = cache_file;
        }
        config
    }
}

fn suffixed(base: &Utf8Path, suffix: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{base}{suffix}"))
}
