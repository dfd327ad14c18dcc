use std::io::{self, Write};

use serde::Serialize;

use crate::cache::CachedDataset;
use crate::domain::AppState;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

#[derive(Debug, Clone, Serialize)]
pub struct UrlResult {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearResult {
    pub cleared: bool,
    pub entries: usize,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_dataset(result: &CachedDataset) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_state(state: &AppState) -> io::Result<()> {
        Self::print_json(state)
    }

    pub fn print_url(result: &UrlResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_clear(result: &ClearResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
