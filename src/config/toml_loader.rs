//! TOML file loading and saving for every configuration file.
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::document::Mapping;
use crate::error::ConfigError;

fn io_error(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Deserialize a TOML file, treating a missing file as empty TOML.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or if
/// empty TOML does not satisfy `T` for a missing file.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return toml::from_str("").map_err(|e| ConfigError::InvalidContent {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        });
    }
    load_required(path)
}

/// Deserialize a TOML file that must exist.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_required<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    toml::from_str(&content).map_err(|e| ConfigError::InvalidSyntax {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })
}

/// Load a TOML file as a [`Mapping`]; a missing file yields an empty one.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_mapping(path: &Path) -> Result<Mapping, ConfigError> {
    load_config(path)
}

/// Load every `*.toml` file in `dir` as a [`Mapping`] keyed by file stem.
///
/// A missing directory yields nothing. Files that fail to load are returned
/// alongside the successes so the caller can report and skip them.
#[must_use]
pub fn load_dir_mappings(dir: &Path) -> (BTreeMap<String, Mapping>, Vec<ConfigError>) {
    let mut loaded = BTreeMap::new();
    let mut errors = Vec::new();
    for path in files_with_extension(dir, "toml") {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match load_required::<Mapping>(&path) {
            Ok(mapping) => {
                loaded.insert(stem.to_string(), mapping);
            }
            Err(e) => errors.push(e),
        }
    }
    (loaded, errors)
}

/// List files in `dir` with the given extension, sorted by name.
#[must_use]
pub fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == extension))
        .collect();
    files.sort();
    files
}

/// List subdirectories of `dir`, sorted by name.
#[must_use]
pub fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

/// Serialize `value` as TOML and write it to `path`, creating parents.
///
/// # Errors
///
/// Returns an error if serialization fails or the file cannot be written.
pub fn save_toml<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(value).map_err(|e| ConfigError::InvalidContent {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    fs::write(path, content).map_err(|e| io_error(path, e))
}
