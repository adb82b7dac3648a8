//! Configuration management for the sideload component.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/file-sideload/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::files::access;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("log level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("the sideload directory is not a directory or does not have sufficient permissions: {0}")]
    InvalidDirectory(PathBuf),

    #[error("the sideload directory is not writable but deletion after import is enabled: {0}")]
    DirectoryNotWritable(PathBuf),

    #[error("user directory must be a plain sub-path of the sideload directory, got {0}")]
    InvalidUserDirectory(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Default cap for both file and directory listings.
pub const DEFAULT_LISTING_CAP: usize = 1000;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Drop folder configuration.
    pub sideload: SideloadConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub level: String,
}

/// Drop folder configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SideloadConfig {
    /// Absolute path of the drop folder. Unset disables sideloading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Delete source files (and emptied directories) after import.
    pub delete_file: bool,

    /// Maximum number of files to list (0 = unbounded).
    pub max_files: usize,

    /// Maximum number of directories to list (0 = unbounded).
    pub max_directories: usize,

    /// Default listing directory, relative to `directory`. Empty means the
    /// drop folder itself.
    pub user_directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for SideloadConfig {
    fn default() -> Self {
        Self {
            directory: None,
            delete_file: false,
            max_files: DEFAULT_LISTING_CAP,
            max_directories: DEFAULT_LISTING_CAP,
            user_directory: String::new(),
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("file-sideload")
        .join("config.toml")
}

/// Check that a directory can serve as the drop folder.
///
/// It must be a directory the process can list and enter; with deletion
/// enabled it must also be writable.
pub fn directory_is_valid(dir: &Path, delete_file: bool) -> bool {
    let valid = dir.is_dir() && access::is_traversable(dir);
    if delete_file {
        valid && access::is_writable(dir)
    } else {
        valid
    }
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - FILE_SIDELOAD_DIRECTORY: Override the drop folder
    /// - FILE_SIDELOAD_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("FILE_SIDELOAD_DIRECTORY") {
            if !dir.is_empty() {
                tracing::info!("Overriding sideload directory from environment: {}", dir);
                self.sideload.directory = Some(PathBuf::from(dir));
            }
        }

        if let Ok(level) = std::env::var("FILE_SIDELOAD_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log level from environment: {}", level);
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// An unset drop folder is valid: sideloading is simply disabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.logging.level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.logging.level.clone()));
        }

        if let Some(dir) = &self.sideload.directory {
            if !directory_is_valid(dir, false) {
                return Err(ConfigError::InvalidDirectory(dir.clone()));
            }
            if !directory_is_valid(dir, self.sideload.delete_file) {
                return Err(ConfigError::DirectoryNotWritable(dir.clone()));
            }
        }

        let user_dir = &self.sideload.user_directory;
        if user_dir.contains("..") || Path::new(user_dir).is_absolute() {
            return Err(ConfigError::InvalidUserDirectory(user_dir.clone()));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
