//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod messaging;
mod pipeline;
mod storage;

pub use messaging::{MessagingConfig, MessagingType, SnsSqsSettings, DEFAULT_EVENT_SOURCE};
pub use pipeline::{
    DlqConfig, DlqType, ListenerConfig, TriggerConfig, DEFAULT_MAX_ATTEMPTS,
};
pub use storage::{DynamoConfig, StorageConfig, StorageType, DEFAULT_QUERY_PAGE_SIZE};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "DASHBOARD_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "DASHBOARD";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "DASHBOARD_LOG";

use serde::Deserialize;

/// Errors loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shared table configuration.
    pub storage: StorageConfig,
    /// Event bus configuration.
    pub messaging: MessagingConfig,
    /// Change-feed consumer configuration.
    pub trigger: TriggerConfig,
    /// Inbound listener configuration.
    pub listener: ListenerConfig,
    /// Dead-letter configuration.
    pub dlq: DlqConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no component can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trigger.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "trigger.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.storage.query_page_size == 0 {
            return Err(ConfigError::Invalid(
                "storage.query_page_size must be at least 1".to_string(),
            ));
        }
        if self.messaging.source.is_empty() {
            return Err(ConfigError::Invalid(
                "messaging.source must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}
