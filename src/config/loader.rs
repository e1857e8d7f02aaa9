// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    load_from_str(&contents)
}

/// Parse configuration from TOML text.
pub fn load_from_str(contents: &str) -> Result<RawConfigFile> {
    let config: RawConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls), including the
///   standard task table when no task is declared.
/// - Checks for unknown `after` references, task graph cycles, and that every
///   glob and regex compiles.
///
/// A missing file is not an error: the defaults describe the conventional
/// project layout, so a bare project builds without any config.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw_config = if path.exists() {
        load_from_path(path)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        RawConfigFile::default()
    };
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// `Spabuild.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Spabuild.toml")
}

/// Directory relative paths in the config are resolved against.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
