//! Default values for configuration settings.
//!
//! Settings are stored as `Option`s so that config files can be merged
//! field by field; the accessors on each settings type fall back to these.

/// Default GraphQL endpoint of a locally running backend.
pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:5000/graphql";

/// Environment variable that overrides the endpoint URL.
pub const ENDPOINT_ENV_VAR: &str = "OBSERRA_ENDPOINT";

/// Overall budget for one query operation, including retries (30s).
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Retries after the first attempt (3 attempts total).
pub const DEFAULT_RETRIES: u32 = 2;

/// Fixed delay between attempts.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Auto-refresh interval, measured from the completion of the previous fetch.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 10_000;

/// Initial delay before reconnecting a dropped live connection.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1_000;

/// Cap for the exponential reconnect backoff.
pub const DEFAULT_MAX_RECONNECT_DELAY_MS: u64 = 30_000;

/// Derive the WebSocket URL from an HTTP endpoint URL.
///
/// `http://` becomes `ws://` and `https://` becomes `wss://`. Any other
/// scheme is returned unchanged and rejected later by validation.
pub fn derive_ws_url(http_url: &str) -> String {
    if let Some(rest) = http_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = http_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        http_url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_ws_url() {
        assert_eq!(
            derive_ws_url("http://localhost:5000/graphql"),
            "ws://localhost:5000/graphql"
        );
        assert_eq!(
            derive_ws_url("https://obserra.example/graphql"),
            "wss://obserra.example/graphql"
        );
        assert_eq!(derive_ws_url("localhost:5000"), "localhost:5000");
    }
}
