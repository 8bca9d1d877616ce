// crates/exposure-relay-config/src/config.rs
// ============================================================================
// Module: Exposure Relay Configuration
// Description: Configuration loading and validation for Exposure Relay.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: exposure-relay-core, exposure-relay-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed. Each section validates
//! itself; cross-section constraints (such as a required sqlite section) are
//! checked at the top level.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use exposure_relay_core::runtime::validation::DEFAULT_RETENTION_DAYS;
use exposure_relay_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "exposure-relay.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "EXPOSURE_RELAY_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default maximum request body size in bytes.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;
/// Maximum allowed request body size in bytes.
pub(crate) const MAX_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Maximum allowed retention window in days.
pub(crate) const MAX_RETENTION_DAYS: u16 = 365;
/// Maximum length of the configured origin tag.
pub(crate) const MAX_APP_SOURCE_LENGTH: usize = 256;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Config file could not be parsed.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Config contents are invalid.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Exposure Relay configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExposureRelayConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Temporal policy configuration.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Exposed-key store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Audit sink configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl ExposureRelayConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.policy.validate()?;
        self.store.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (`host:port`).
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum allowed request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Origin tag recorded with each stored submission.
    #[serde(default = "default_app_source")]
    pub app_source: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            app_source: default_app_source(),
        }
    }
}

impl ServerConfig {
    /// Validates the server section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bind address or limits are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid(format!("invalid bind address: {}", self.bind)))?;
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_MAX_BODY_BYTES {
            return Err(ConfigError::Invalid(format!(
                "max_body_bytes out of range: {} (max {MAX_MAX_BODY_BYTES})",
                self.max_body_bytes
            )));
        }
        if self.app_source.is_empty() || self.app_source.len() > MAX_APP_SOURCE_LENGTH {
            return Err(ConfigError::Invalid("app_source length out of range".to_string()));
        }
        Ok(())
    }
}

/// Returns the default bind address.
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Returns the default maximum request body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Returns the default origin tag.
fn default_app_source() -> String {
    "org.example.exposure-relay".to_string()
}

/// Temporal policy configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PolicyConfig {
    /// Maximum accepted key-date age in whole days.
    #[serde(default = "default_retention_days")]
    pub retention_days: u16,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

impl PolicyConfig {
    /// Validates the policy section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the retention window is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_days == 0 || self.retention_days > MAX_RETENTION_DAYS {
            return Err(ConfigError::Invalid(format!(
                "retention_days out of range: {} (max {MAX_RETENTION_DAYS})",
                self.retention_days
            )));
        }
        Ok(())
    }
}

/// Returns the default retention window.
const fn default_retention_days() -> u16 {
    DEFAULT_RETENTION_DAYS
}

/// Exposed-key store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// In-memory store (single instance only; state is lost on restart).
    Memory,
    /// Durable `SQLite` store (default).
    #[default]
    Sqlite,
}

/// Exposed-key store configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StoreConfig {
    /// Selected backend.
    #[serde(default, rename = "type")]
    pub store_type: StoreType,
    /// `SQLite` settings; required when the backend is `sqlite`.
    #[serde(default)]
    pub sqlite: Option<SqliteStoreConfig>,
}

impl StoreConfig {
    /// Validates the store section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the selected backend is missing its
    /// settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Sqlite => {
                let sqlite = self.sqlite.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires a [store.sqlite] section".to_string())
                })?;
                if sqlite.read_pool_size == 0 {
                    return Err(ConfigError::Invalid(
                        "store.sqlite.read_pool_size must be greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
            StoreType::Memory => Ok(()),
        }
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines to stderr (default).
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard all events.
    None,
}

/// Audit sink configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditConfig {
    /// Selected sink.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file path; required when the sink is `file`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates the audit section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file sink is missing its path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sink == AuditSinkKind::File {
            let path = self.path.as_ref().ok_or_else(|| {
                ConfigError::Invalid("file audit sink requires audit.path".to_string())
            })?;
            validate_path(path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Path Resolution
// ============================================================================

/// Resolves the effective config path from the argument or environment.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(value) = env::var(CONFIG_ENV_VAR)
        && !value.is_empty()
    {
        return Ok(PathBuf::from(value));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates a path against component and length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let display = path.display().to_string();
    if display.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("path too long".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("path component too long".to_string()));
        }
    }
    Ok(())
}
