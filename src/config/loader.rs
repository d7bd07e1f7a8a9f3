// src/config/loader.rs

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{RawSettingsFile, Settings};
use crate::errors::Result;
use crate::fs::FileSystem;

/// Read and deserialize a settings file into the raw `RawSettingsFile`.
///
/// Durations and names are checked by [`load_and_validate`].
pub fn load_from_path(fs: &dyn FileSystem, path: &Path) -> Result<RawSettingsFile> {
    let contents = fs.read_to_string(path)?;
    let raw: RawSettingsFile = toml::from_str(&contents)?;
    Ok(raw)
}

/// Load a settings file from path and validate it.
pub fn load_and_validate(fs: &dyn FileSystem, path: &Path) -> Result<Settings> {
    let raw = load_from_path(fs, path)?;
    Settings::try_from(raw)
}

/// Resolve settings for a run.
///
/// - An explicit path must exist and be valid.
/// - Otherwise [`default_config_path`] is used if present.
/// - Otherwise built-in defaults apply.
pub fn load_settings(fs: &dyn FileSystem, explicit: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        debug!(?path, "loading settings file");
        return load_and_validate(fs, path);
    }

    let default_path = default_config_path();
    if fs.is_file(&default_path) {
        debug!(path = ?default_path, "loading settings file from working directory");
        return load_and_validate(fs, &default_path);
    }

    debug!("no settings file; using defaults");
    Settings::try_from(RawSettingsFile::default())
}

/// `RunSource.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("RunSource.toml")
}
