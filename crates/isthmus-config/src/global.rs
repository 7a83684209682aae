//! Global Configuration (~/.isthmus/config.toml)
//!
//! Handles user-level configuration stored in `~/.isthmus/config.toml`.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.isthmus/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Logging preferences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    /// FFI defaults shared by every project
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffi: Option<GlobalFfiConfig>,
}

/// Logging preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Minimum level ("error", "warn", "info", "debug", "trace")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Output format ("auto", "text", "json")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// FFI defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalFfiConfig {
    /// Extra directories searched for shared libraries, after project paths
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub search_paths: Vec<PathBuf>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(logging) = &self.logging {
            if let Some(level) = &logging.level {
                validate_log_level("logging.level", level)?;
            }
            if let Some(format) = &logging.format {
                validate_log_format("logging.format", format)?;
            }
        }
        Ok(())
    }

    /// Get the global config file path (~/.isthmus/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".isthmus").join("config.toml"))
    }

    /// Configured log level, if any
    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    /// Configured log format, if any
    pub fn log_format(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.format.as_deref())
    }

    /// Default library search paths
    pub fn search_paths(&self) -> &[PathBuf] {
        self.ffi
            .as_ref()
            .map(|f| f.search_paths.as_slice())
            .unwrap_or(&[])
    }

    /// Merge another global config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &GlobalConfig) {
        if other.logging.is_some() {
            self.logging = other.logging.clone();
        }
        if other.ffi.is_some() {
            self.ffi = other.ffi.clone();
        }
    }
}

/// Validate a log level name
pub(crate) fn validate_log_level(field: &str, value: &str) -> ConfigResult<()> {
    if !matches!(
        value.to_ascii_lowercase().as_str(),
        "error" | "warn" | "info" | "debug" | "trace"
    ) {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!(
                "must be one of error, warn, info, debug, trace; got '{}'",
                value
            ),
        });
    }
    Ok(())
}

/// Validate a log format name
pub(crate) fn validate_log_format(field: &str, value: &str) -> ConfigResult<()> {
    if !matches!(value.to_ascii_lowercase().as_str(), "auto" | "text" | "json") {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("must be 'auto', 'text', or 'json', got '{}'", value),
        });
    }
    Ok(())
}
