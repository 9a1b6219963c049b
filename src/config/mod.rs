use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::HotspotId;

/// Default configuration embedded at compile time
const DEFAULT_CONFIG: &str = include_str!("defaults.toml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Dwell time shared by every hotspot
    #[serde(default = "default_activation_time_ms")]
    pub activation_time_ms: u64,

    /// Hotspots known to the board; empty means any id
    #[serde(default)]
    pub hotspots: Vec<HotspotId>,

    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_activation_time_ms() -> u64 {
    5000
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            activation_time_ms: default_activation_time_ms(),
            hotspots: Vec::new(),
            log_filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Parse TOML contents; `path` is only used for error reporting.
    pub fn from_toml(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn activation_time(&self) -> Result<Duration, ConfigError> {
        if self.activation_time_ms == 0 {
            return Err(ConfigError::InvalidActivationTime);
        }
        Ok(Duration::from_millis(self.activation_time_ms))
    }
}

/// Get the path to the user's config file
pub fn get_user_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(config_dir.join("hotspot-scheduler").join("config.toml"))
}

/// Load the user config, writing the defaults there first if it does not exist yet
pub fn load_config() -> Result<Config, ConfigError> {
    let path = get_user_config_path()?;

    if !path.exists() {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let _ = fs::write(&path, DEFAULT_CONFIG);
        return Config::from_toml(&path, DEFAULT_CONFIG);
    }

    load_from(&path)
}

/// Load config from an explicit file
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Config::from_toml(path, &contents)
}
