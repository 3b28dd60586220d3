//! Locating and loading the configuration file

use crate::config::Config;
use crate::error::{SettingsError, SettingsResult};
use std::path::{Path, PathBuf};

/// Directory name under the platform config directory
const APP_DIR: &str = "tvmkit";
/// File name of the default configuration
const CONFIG_FILE: &str = "config.toml";

/// Resolves the configuration location and loads it
#[derive(Debug, Clone, Default)]
pub struct SettingsManager;

impl SettingsManager {
    /// Platform configuration directory for TVMKit
    pub fn config_dir() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no platform config directory".to_string())
            })
    }

    /// Create the configuration directory if needed
    pub fn ensure_config_dir() -> SettingsResult<PathBuf> {
        let dir = Self::config_dir()?;
        std::fs::create_dir_all(&dir)
            .map_err(|e| SettingsError::ConfigDirectory(format!("{}: {}", dir.display(), e)))?;
        Ok(dir)
    }

    /// Path of the default configuration file
    pub fn default_config_path() -> SettingsResult<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Load `path`, or the default file when `path` is `None`. A missing
    /// file yields the default configuration.
    pub fn load_or_default(path: Option<&Path>) -> SettingsResult<Config> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if path.exists() {
            tracing::info!("Loading configuration from {}", path.display());
            Config::load_from_file(&path)
        } else {
            tracing::info!("No configuration at {}, using defaults", path.display());
            Ok(Config::default())
        }
    }

    /// Write the default configuration to `path` unless a file exists there
    pub fn write_default_if_missing(path: &Path) -> SettingsResult<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Config::default().save_to_file(path)?;
        Ok(true)
    }
}
