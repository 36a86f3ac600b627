use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "LECTORIA_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/lectoria.toml";
const ENV_PREFIX: &str = "LECTORIA";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    // Start with defaults (handled by struct Default implementations)
    // Add TOML file if it exists (optional)
    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // Add environment variable overrides
    // LECTORIA__QUEUE__SCAN_INTERVAL_SECS -> queue.scan_interval_secs
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.queue.scan_interval_secs, 120);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"

[queue]
scan_interval_secs = 30
stale_after_secs = 600

[poller]
ongoing_limit = 10
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.queue.scan_interval_secs, 30);
        assert_eq!(config.queue.stale_after_secs, 600);
        assert_eq!(config.poller.ongoing_limit, 10);
        // Untouched sections keep their defaults
        assert_eq!(config.notifications.error_retry_interval_secs, 240);
    }

    #[test]
    fn test_full_config_example() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "0.0.0.0:8080"
store_path = "data/store"

[provider]
api_base = "https://api.zoom.us/v2"
oauth_token_url = "https://zoom.us/oauth/token"
connect_timeout_secs = 5
request_timeout_secs = 30

[poller]
not_found_limit = 5
ongoing_limit = 20
first_wait_secs = 120
second_wait_secs = 240
ceiling_wait_secs = 480
failure_wait_secs = 480

[fetcher]
max_attempts = 20
retry_delay_secs = 10

[queue]
scan_interval_secs = 120
stale_after_secs = 1200
dispatch_url = "http://127.0.0.1:8080/api/worker/start_download"

[notifications]
scan_interval_secs = 120
error_retry_interval_secs = 240
endpoint = "http://127.0.0.1:8004/api/telegram/send_notification"

[storage]
provider = "local"
root = "data/recordings"

[encoder]
endpoint = "http://127.0.0.1:8005/trim-video"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.provider.connect_timeout_secs, 5);
        assert_eq!(config.fetcher.retry_delay_secs, 10);
        assert_eq!(
            config.queue.dispatch_url,
            "http://127.0.0.1:8080/api/worker/start_download"
        );
        assert_eq!(
            config.storage.provider,
            super::super::models::StorageProvider::Local
        );
    }
}
