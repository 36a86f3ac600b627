use thiserror::Error;

use super::models::Config;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("{field} must not be empty")]
    EmptyEndpoint { field: &'static str },
}

/// Reject configurations that would make a loop spin or a client dial
/// nowhere. Values are otherwise taken at face value.
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    let nonzero: [(&'static str, u64); 7] = [
        ("poller.not_found_limit", config.poller.not_found_limit as u64),
        ("poller.ongoing_limit", config.poller.ongoing_limit as u64),
        ("fetcher.max_attempts", config.fetcher.max_attempts as u64),
        ("queue.scan_interval_secs", config.queue.scan_interval_secs),
        ("queue.stale_after_secs", config.queue.stale_after_secs),
        (
            "notifications.scan_interval_secs",
            config.notifications.scan_interval_secs,
        ),
        (
            "notifications.error_retry_interval_secs",
            config.notifications.error_retry_interval_secs,
        ),
    ];

    for (field, value) in nonzero {
        if value == 0 {
            return Err(ValidationError::ZeroValue { field });
        }
    }

    let endpoints: [(&'static str, &str); 4] = [
        ("provider.api_base", &config.provider.api_base),
        ("provider.oauth_token_url", &config.provider.oauth_token_url),
        ("queue.dispatch_url", &config.queue.dispatch_url),
        ("notifications.endpoint", &config.notifications.endpoint),
    ];

    for (field, value) in endpoints {
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyEndpoint { field });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn zero_scan_interval_rejected() {
        let mut config = Config::default();
        config.queue.scan_interval_secs = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroValue {
                field: "queue.scan_interval_secs"
            })
        ));
    }

    #[test]
    fn empty_dispatch_url_rejected() {
        let mut config = Config::default();
        config.queue.dispatch_url = "  ".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::EmptyEndpoint {
                field: "queue.dispatch_url"
            })
        ));
    }
}
