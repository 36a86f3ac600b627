//! Configuration management
//!
//! Layered configuration loaded from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the
//! pattern `LECTORIA__<section>__<key>`:
//!
//! - `LECTORIA__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `LECTORIA__QUEUE__SCAN_INTERVAL_SECS=30`
//! - `LECTORIA__PROVIDER__API_BASE=https://api.zoom.us/v2`
//!
//! # Configuration File
//!
//! By default the configuration is loaded from `config/lectoria.toml`.
//! This can be overridden using the `LECTORIA_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{
    Config, EncoderConfig, FetcherSettings, NotificationSettings, PollerSettings, ProviderConfig,
    QueueSettings, ServerConfig, StorageProvider, StorageSettings,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or if
    /// validation fails (zero intervals, empty endpoints).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[queue]
scan_interval_secs = 15
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.queue.scan_interval_secs, 15);
    }

    #[test]
    fn test_validation_catches_zero_interval() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[notifications]
scan_interval_secs = 0
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::ZeroValue { .. })
        ));
    }
}
