use std::fs;
use std::io::{ErrorKind, Write};

use camino::Utf8Path;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::Builder;

use crate::error::PortalError;

/// Reads a JSON document, returning `Ok(None)` when the file does not exist.
/// Decoding failures are handed to `on_invalid` so each store can report its
/// own error variant.
pub fn read_json<T, F>(path: &Utf8Path, on_invalid: F) -> Result<Option<T>, PortalError>
where
    T: DeserializeOwned,
    F: FnOnce(String) -> PortalError,
{
    let content = match fs::read_to_string(path.as_std_path()) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(PortalError::Filesystem(format!("read {path}: {err}"))),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|err| on_invalid(err.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonLayout {
    Pretty,
    Compact,
}

/// Serializes `value` into a temp file next to `path` and renames it over the
/// target, so readers see either the old document or the new one.
pub fn write_json_atomic<T: Serialize>(
    path: &Utf8Path,
    value: &T,
    layout: JsonLayout,
) -> Result<(), PortalError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| PortalError::Filesystem(err.to_string()))?;

    let content = match layout {
        JsonLayout::Pretty => serde_json::to_vec_pretty(value),
        JsonLayout::Compact => serde_json::to_vec(value),
    }
    .map_err(|err| PortalError::Filesystem(err.to_string()))?;
    let mut temp = Builder::new()
        .prefix(".ena-pb")
        .suffix(".tmp")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| PortalError::Filesystem(err.to_string()))?;
    temp.write_all(&content)
        .map_err(|err| PortalError::Filesystem(err.to_string()))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| PortalError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| PortalError::Filesystem(err.to_string()))?;
    Ok(())
}
