use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::PortalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DataPortal {
    Ena,
    Metagenome,
    Pathogen,
    Faang,
}

impl DataPortal {
    pub const ALL: [DataPortal; 4] = [
        DataPortal::Ena,
        DataPortal::Metagenome,
        DataPortal::Pathogen,
        DataPortal::Faang,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DataPortal::Ena => "ena",
            DataPortal::Metagenome => "metagenome",
            DataPortal::Pathogen => "pathogen",
            DataPortal::Faang => "faang",
        }
    }

    /// Human label shown in the portal selector.
    pub fn title(self) -> &'static str {
        match self {
            DataPortal::Ena => "Ena data portal",
            DataPortal::Metagenome => "Metagenome data portal",
            DataPortal::Pathogen => "Pathogen data portal",
            DataPortal::Faang => "Faang data portal",
        }
    }

    pub fn next(self) -> Self {
        cycle(&Self::ALL, self, 1)
    }

    pub fn previous(self) -> Self {
        cycle(&Self::ALL, self, Self::ALL.len() - 1)
    }
}

impl fmt::Display for DataPortal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DataPortal {
    type Err = PortalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|portal| portal.as_str() == normalized)
            .ok_or_else(|| PortalError::InvalidPortal(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Tsv,
    Json,
}

impl Format {
    pub const ALL: [Format; 2] = [Format::Tsv, Format::Json];

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Tsv => "tsv",
            Format::Json => "json",
        }
    }

    pub fn next(self) -> Self {
        cycle(&Self::ALL, self, 1)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Format {
    type Err = PortalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "tsv" => Ok(Format::Tsv),
            "json" => Ok(Format::Json),
            _ => Err(PortalError::InvalidFormat(value.to_string())),
        }
    }
}

/// Global selections that survive restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    pub data_portal: DataPortal,
    pub format: Format,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            data_portal: DataPortal::Ena,
            format: Format::Tsv,
        }
    }
}

/// A single-field change to [`AppState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateUpdate {
    DataPortal(DataPortal),
    Format(Format),
}

impl StateUpdate {
    /// Builds an update from a `key`/`value` pair, rejecting unknown keys and
    /// values outside the enums.
    pub fn parse(key: &str, value: &str) -> Result<Self, PortalError> {
        match key.trim() {
            "data_portal" | "portal" => Ok(StateUpdate::DataPortal(value.parse()?)),
            "format" => Ok(StateUpdate::Format(value.parse()?)),
            other => Err(PortalError::InvalidStateKey(other.to_string())),
        }
    }

    pub fn apply(self, state: &mut AppState) {
        match self {
            StateUpdate::DataPortal(portal) => state.data_portal = portal,
            StateUpdate::Format(format) => state.format = format,
        }
    }
}

fn cycle<T: Copy + PartialEq>(all: &[T], current: T, step: usize) -> T {
    let index = all.iter().position(|item| *item == current).unwrap_or(0);
    all[(index + step) % all.len()]
}
