//! Configuration validation.

use crate::config::types::ObserraConfig;
use crate::errors::ConfigError;

/// Validate a merged configuration.
///
/// # Errors
///
/// Returns `InvalidEndpoint` when the HTTP or WebSocket URL has the wrong
/// scheme, and `InvalidConfiguration` when a duration is zero or the reconnect
/// delays are inverted.
pub fn validate_config(config: &ObserraConfig) -> Result<(), ConfigError> {
    let url = config.endpoint.url();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::InvalidEndpoint {
            url: url.to_string(),
            expected: "http:// or https://",
        });
    }

    let ws_url = config.endpoint.ws_url();
    if !(ws_url.starts_with("ws://") || ws_url.starts_with("wss://")) {
        return Err(ConfigError::InvalidEndpoint {
            url: ws_url,
            expected: "ws:// or wss://",
        });
    }

    if config.query.timeout_ms() == 0 {
        return Err(ConfigError::InvalidConfiguration {
            message: "query.timeout_ms must be greater than 0".to_string(),
        });
    }

    if config.refresh.interval().is_zero() {
        return Err(ConfigError::InvalidConfiguration {
            message: "refresh.interval_ms must be greater than 0".to_string(),
        });
    }

    if config.subscription.reconnect_delay() > config.subscription.max_reconnect_delay() {
        return Err(ConfigError::InvalidConfiguration {
            message: "subscription.reconnect_delay_ms must not exceed max_reconnect_delay_ms"
                .to_string(),
        });
    }

    Ok(())
}
