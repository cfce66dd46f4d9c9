//! Walle configuration system
//!
//! Backend address, motion calibration and logging, with merge semantics.
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high → low):
//! 1. CLI arguments
//! 2. Environment variables (WALLE_BACKEND_URL, WALLE_PASSWORD, WALLE_LOG)
//! 3. Explicit --config file, else project-level (./walle.toml)
//! 4. User-level (~/.config/walle/config.toml)
//! 5. Default values
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use walle::util::config::load_config;
//!
//! let config = load_config(None).unwrap();
//! println!("backend: {}", config.backend.url);
//! ```

use crate::runtime::motion::{MotionError, MotionProfile};
use crate::util::logger::LogLevel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Project-level config file name.
pub const PROJECT_CONFIG: &str = "walle.toml";

/// Complete configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Robot backend settings
    #[serde(default)]
    pub backend: BackendConfig,
    /// Motion calibration for `move`/`turn`
    #[serde(default)]
    pub motion: MotionProfile,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// Robot backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base url of the web interface
    #[serde(default = "default_url")]
    pub url: String,
    /// Login password; no login is attempted when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Per-request timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_timeout_ms() -> u64 {
    2000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            password: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum level
    #[serde(default = "default_level")]
    pub level: LogLevel,
}

fn default_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid value `{value}` for {var}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Invalid motion calibration: {0}")]
    Motion(#[from] MotionError),

    #[error("Cannot determine config directory")]
    NoConfigDir,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `WALLE_*` overrides from the given variables.
    pub fn apply_env<I>(
        &mut self,
        vars: I,
    ) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                "WALLE_BACKEND_URL" => self.backend.url = value,
                "WALLE_PASSWORD" => self.backend.password = Some(value),
                "WALLE_LOG" => {
                    self.log.level = value.parse().map_err(|_| ConfigError::InvalidEnv {
                        var: "WALLE_LOG",
                        value,
                    })?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.motion.validate()?;
        Ok(())
    }
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    // Try XDG config directory on Unix
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join("walle"));
    }

    // Fallback to ~/.config/walle
    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".config").join("walle"));
    }

    // On Windows, try %APPDATA%
    if let Ok(appdata) = std::env::var("APPDATA") {
        return Some(PathBuf::from(appdata).join("walle"));
    }

    None
}

/// Get the user config file path (~/.config/walle/config.toml)
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Read one config file.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Config::from_toml(&content)
}

/// Pick the file to load: the explicit one, else `./walle.toml`, else the
/// user config, else none.
pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let project = PathBuf::from(PROJECT_CONFIG);
    if project.exists() {
        return Some(project);
    }

    get_config_path().filter(|p| p.exists())
}

/// Load configuration with file, environment and validation applied.
///
/// A missing explicit file is an error; missing implicit files fall back to
/// defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match resolve_path(explicit) {
        Some(path) => load_from(&path)?,
        None => Config::default(),
    };
    config.apply_env(std::env::vars())?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to `path`, creating parent directories.
pub fn save_config(
    config: &Config,
    path: &Path,
) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

/// Save to the user config location.
pub fn save_user_config(config: &Config) -> Result<PathBuf, ConfigError> {
    let path = get_config_path().ok_or(ConfigError::NoConfigDir)?;
    save_config(config, &path)?;
    Ok(path)
}
