//! Festival lineups on disk.
//!
//! The data directory holds one sub-directory per festival, each with an
//! `artists.json` of the form `{"artists": ["Artist", ...]}`.

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::LineupError;

/// File name of a festival's lineup.
pub const LINEUP_FILE: &str = "artists.json";

/// Festival directories under `data_dir`, sorted; hidden entries are skipped.
/// A missing data directory has no festivals.
pub fn list_festivals(data_dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(data_dir) else {
        return Vec::new();
    };
    let mut festivals: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|name| !name.starts_with('.'))
        .collect();
    festivals.sort();
    festivals
}

pub fn lineup_path(data_dir: &Path, festival: &str) -> PathBuf {
    data_dir.join(festival).join(LINEUP_FILE)
}

/// Read and validate a lineup file, keeping the artists in file order.
pub fn load_lineup(path: &Path) -> Result<Vec<String>, LineupError> {
    let text = std::fs::read_to_string(path).map_err(|source| LineupError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|source| LineupError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    parse_lineup(value)
}

/// Validate an already decoded lineup document.
pub fn parse_lineup(value: Value) -> Result<Vec<String>, LineupError> {
    let Value::Object(mut root) = value else {
        return Err(LineupError::NotAnObject);
    };
    let artists = root.remove("artists").ok_or(LineupError::MissingArtists)?;
    let Value::Array(items) = artists else {
        return Err(LineupError::ArtistsNotAList);
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(name) => Ok(name),
            _ => Err(LineupError::NonStringArtist),
        })
        .collect()
}
