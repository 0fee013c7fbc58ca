// src/config/loader.rs

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{JobkitError, Result};
use crate::fs::FileSystem;

pub const CONFIG_FILE_NAME: &str = "Jobkit.toml";

/// Read and deserialize a config file without validating it.
pub fn load_from_path(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs
        .read_to_string(path)
        .map_err(|e| JobkitError::ConfigError(format!("reading {:?}: {e:#}", path)))?;
    Ok(toml::from_str(&contents)?)
}

/// Read, deserialize and validate a config file.
///
/// A relative `modules_dir` is resolved against the file's directory.
pub fn load_and_validate(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let config = ConfigFile::try_from(load_from_path(fs, path)?)?;
    let base = path.parent().unwrap_or(Path::new("."));
    Ok(config.resolve_modules_dir(base))
}

/// Like [`load_and_validate`], but a missing file yields the defaults.
pub fn load_or_default(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    if !fs.exists(path) {
        debug!(path = ?path, "no config file; using defaults");
        let base = path.parent().unwrap_or(Path::new("."));
        return Ok(ConfigFile::default().resolve_modules_dir(base));
    }
    load_and_validate(fs, path)
}

/// `Jobkit.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE_NAME)
}
