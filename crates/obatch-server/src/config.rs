//! Configuration management for the obatch server.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! # Configuration Hierarchy
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use obatch_server::config::ServerConfig;
//!
//! // Load from file with env overrides
//! let config = ServerConfig::load("config.yaml")?;
//!
//! // Or load from environment only
//! let config = ServerConfig::from_env()?;
//! ```

use config::{Config, ConfigError, Environment, File, FileFormat};
use obatch_domain::model::QueryLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::handlers::batch::BatchLimits;

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Server settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageSettings,

    /// Batch engine limits
    #[serde(default)]
    pub batch: BatchSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Metrics settings
    #[serde(default)]
    pub metrics: MetricsSettings,
}

/// Server network settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerSettings {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Timeout in seconds for non-batch routes
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum accepted request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StorageSettings {
    /// Storage backend type. Only "memory" is available.
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// JSON schema file declaring collections, entity types and associations
    #[serde(default)]
    pub schema_path: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            schema_path: None,
        }
    }
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

/// Batch engine limits.
///
/// Environment variables use the `OBATCH_BATCH__` prefix, e.g.
/// `OBATCH_BATCH__TOP_SUM_MAX=5000`.
///
/// ```yaml
/// batch:
///   max_parts: 1000
///   top_sum_max: 10000
///   link_max_per_triple: 10000
///   read_delete_only: false
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BatchSettings {
    /// Maximum number of parts in one envelope
    #[serde(default = "default_max_parts")]
    pub max_parts: usize,

    /// Maximum sum of `$top` over all GET parts of one envelope
    #[serde(default = "default_top_sum_max")]
    pub top_sum_max: u64,

    /// Maximum `$top` of one part
    #[serde(default = "default_top_max")]
    pub top_max: u64,

    /// Maximum `$skip` of one part
    #[serde(default = "default_skip_max")]
    pub skip_max: u64,

    /// Maximum number of `$expand` properties
    #[serde(default = "default_expand_max_properties")]
    pub expand_max_properties: usize,

    /// Maximum `$top` when combined with `$expand`
    #[serde(default = "default_expand_top_max")]
    pub expand_top_max: u64,

    /// Maximum byte length of `q`
    #[serde(default = "default_q_max_bytes")]
    pub q_max_bytes: usize,

    /// Maximum links from one source entity to one target entity type
    #[serde(default = "default_link_max_per_triple")]
    pub link_max_per_triple: u64,

    /// Reject everything except GET and DELETE
    #[serde(default)]
    pub read_delete_only: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_parts: default_max_parts(),
            top_sum_max: default_top_sum_max(),
            top_max: default_top_max(),
            skip_max: default_skip_max(),
            expand_max_properties: default_expand_max_properties(),
            expand_top_max: default_expand_top_max(),
            q_max_bytes: default_q_max_bytes(),
            link_max_per_triple: default_link_max_per_triple(),
            read_delete_only: false,
        }
    }
}

fn default_max_parts() -> usize {
    1000
}

fn default_top_sum_max() -> u64 {
    10_000
}

fn default_top_max() -> u64 {
    10_000
}

fn default_skip_max() -> u64 {
    100_000
}

fn default_expand_max_properties() -> usize {
    2
}

fn default_expand_top_max() -> u64 {
    100
}

fn default_q_max_bytes() -> usize {
    255
}

fn default_link_max_per_triple() -> u64 {
    10_000
}

impl From<&BatchSettings> for BatchLimits {
    fn from(settings: &BatchSettings) -> Self {
        BatchLimits {
            max_parts: settings.max_parts,
            top_sum_max: settings.top_sum_max,
            link_max_per_triple: settings.link_max_per_triple,
            read_delete_only: settings.read_delete_only,
            query: QueryLimits {
                top_max: settings.top_max,
                skip_max: settings.skip_max,
                expand_max_properties: settings.expand_max_properties,
                expand_top_max: settings.expand_top_max,
                q_max_bytes: settings.q_max_bytes,
            },
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MetricsSettings {
    /// Enable metrics endpoint
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_metrics_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

fn invalid(message: impl Into<String>) -> ConfigLoadError {
    ConfigLoadError::Invalid {
        message: message.into(),
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `OBATCH_` and use `__` as separator.
    /// For example:
    /// - `OBATCH_SERVER__PORT=9090` overrides `server.port`
    /// - `OBATCH_BATCH__READ_DELETE_ONLY=true` overrides `batch.read_delete_only`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            // OBATCH_SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("OBATCH")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(
                Environment::with_prefix("OBATCH")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.server.port == 0 {
            return Err(invalid("server.port must be greater than 0"));
        }

        let valid_backends = ["memory"];
        if !valid_backends.contains(&self.storage.backend.as_str()) {
            return Err(invalid(format!(
                "storage.backend must be one of: {:?}, got: {}",
                valid_backends, self.storage.backend
            )));
        }

        let batch = &self.batch;
        let ceilings = [
            ("batch.max_parts", batch.max_parts as u64),
            ("batch.top_sum_max", batch.top_sum_max),
            ("batch.top_max", batch.top_max),
            ("batch.skip_max", batch.skip_max),
            ("batch.expand_max_properties", batch.expand_max_properties as u64),
            ("batch.expand_top_max", batch.expand_top_max),
            ("batch.q_max_bytes", batch.q_max_bytes as u64),
            ("batch.link_max_per_triple", batch.link_max_per_triple),
        ];
        if let Some((name, _)) = ceilings.iter().find(|(_, v)| *v == 0) {
            return Err(invalid(format!("{name} must be greater than 0")));
        }
        if batch.top_max > batch.top_sum_max {
            return Err(invalid(format!(
                "batch.top_max ({}) must not exceed batch.top_sum_max ({})",
                batch.top_max, batch.top_sum_max
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(invalid(format!(
                "logging.level must be one of: {:?}, got: {}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}
