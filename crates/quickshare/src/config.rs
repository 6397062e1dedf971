//! Configuration management for QuickShare.
//!
//! This module provides TOML-based configuration file loading.
//! The default configuration path is `~/.config/quickshare/config.toml`.
//! Values from the file can be overridden by environment variables and,
//! in the binary, by command-line flags.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default cap on the total size of an upload request body (1 GiB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 1024 * 1024 * 1024;

/// Default per-read/per-write deadline for upload I/O, in seconds.
pub const DEFAULT_IO_TIMEOUT_SECS: u64 = 30;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max_upload_size must be greater than 0, got {0}")]
    InvalidMaxUploadSize(u64),

    #[error("io_timeout_secs must be between 1 and 3600 seconds, got {0}")]
    InvalidIoTimeout(u64),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("port must be a number between 0 and 65535, got {0:?}")]
    InvalidPort(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// What the server does with its root directory.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Expose the directory tree read-only.
    #[default]
    Download,
    /// Accept file uploads into the directory.
    Upload,
}

impl Mode {
    /// Human-facing label used by the startup banner.
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Download => "Download",
            Mode::Upload => "Upload",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Main configuration structure for QuickShare.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Sharing server configuration.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Sharing server configuration.
///
/// Immutable once the server starts; the server owns it for its lifetime.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port to listen on (0 picks an ephemeral port).
    pub port: u16,

    /// Directory served (download) or written to (upload). Must already exist.
    pub root_directory: PathBuf,

    /// Download or upload mode.
    pub mode: Mode,

    /// Maximum total size of an upload request body in bytes (default: 1 GiB).
    pub max_upload_size: u64,

    /// Deadline in seconds for each body read and file write.
    pub io_timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            root_directory: PathBuf::from("."),
            mode: Mode::Download,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            io_timeout_secs: DEFAULT_IO_TIMEOUT_SECS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Create a configuration for the given root and mode with default limits.
    pub fn new(port: u16, root_directory: impl Into<PathBuf>, mode: Mode) -> Self {
        Self {
            port,
            root_directory: root_directory.into(),
            mode,
            ..Self::default()
        }
    }

    /// The I/O deadline as a [`Duration`].
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quickshare")
        .join("config.toml")
}

/// Parse a port given as text, as it arrives from the environment or CLI.
pub fn parse_port(value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidPort(value.to_string()))
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - QUICKSHARE_PORT: Override the listening port
    /// - QUICKSHARE_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(port) = std::env::var("QUICKSHARE_PORT") {
            if !port.is_empty() {
                self.server.port = parse_port(&port)?;
                tracing::info!("Overriding port from environment: {}", self.server.port);
            }
        }

        if let Ok(level) = std::env::var("QUICKSHARE_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.logging.level = level;
            }
        }

        Ok(())
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_upload_size == 0 {
            return Err(ConfigError::InvalidMaxUploadSize(self.server.max_upload_size));
        }

        if self.server.io_timeout_secs == 0 || self.server.io_timeout_secs > 3600 {
            return Err(ConfigError::InvalidIoTimeout(self.server.io_timeout_secs));
        }

        let level = self.logging.level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.logging.level.clone()));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
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
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
