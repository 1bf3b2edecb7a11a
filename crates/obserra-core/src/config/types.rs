//! Configuration type definitions.
//!
//! These types are deserialized from TOML config files. Every setting is
//! optional so user and project files can be merged field by field.
//!
//! # Example Configuration
//!
//! ```toml
//! [endpoint]
//! url = "http://localhost:5000/graphql"
//!
//! [query]
//! timeout_ms = 30000
//! retries = 2
//! retry_delay_ms = 1000
//! retry_operation_errors = true
//!
//! [refresh]
//! interval_ms = 10000
//! auto_refresh = false
//!
//! [subscription]
//! reconnect_delay_ms = 1000
//! max_reconnect_delay_ms = 30000
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults::{
    DEFAULT_ENDPOINT_URL, DEFAULT_MAX_RECONNECT_DELAY_MS, DEFAULT_RECONNECT_DELAY_MS,
    DEFAULT_REFRESH_INTERVAL_MS, DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_MS, DEFAULT_TIMEOUT_MS,
    derive_ws_url,
};
use crate::query::QueryConfig;

/// Main configuration loaded from TOML config files.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ObserraConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,

    #[serde(default)]
    pub query: QuerySettings,

    #[serde(default)]
    pub refresh: RefreshSettings,

    #[serde(default)]
    pub subscription: SubscriptionSettings,
}

/// Backend endpoint addresses.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EndpointConfig {
    /// GraphQL HTTP endpoint.
    /// Default: `http://localhost:5000/graphql`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// GraphQL WebSocket endpoint. Derived from `url` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,
}

/// Query executor defaults. Individual calls may override them.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct QuerySettings {
    /// Overall timeout per operation in milliseconds.
    /// Default: 30000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Retries after the first attempt.
    /// Default: 2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    /// Fixed delay between attempts in milliseconds.
    /// Default: 1000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,

    /// Whether GraphQL-level errors are retried like transport errors.
    /// Default: true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_operation_errors: Option<bool>,
}

/// Auto-refresh behaviour of dashboard views.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RefreshSettings {
    /// Delay between the end of one fetch and the start of the next.
    /// Default: 10000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,

    /// Whether new sessions start with auto-refresh enabled.
    /// Default: false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_refresh: Option<bool>,
}

/// Live connection reconnect policy.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SubscriptionSettings {
    /// Default: 1000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_delay_ms: Option<u64>,

    /// Default: 30000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_reconnect_delay_ms: Option<u64>,
}

impl EndpointConfig {
    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or(DEFAULT_ENDPOINT_URL)
    }

    pub fn ws_url(&self) -> String {
        match &self.ws_url {
            Some(url) => url.clone(),
            None => derive_ws_url(self.url()),
        }
    }
}

impl QuerySettings {
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    pub fn retries(&self) -> u32 {
        self.retries.unwrap_or(DEFAULT_RETRIES)
    }

    pub fn retry_delay_ms(&self) -> u64 {
        self.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS)
    }

    pub fn retry_operation_errors(&self) -> bool {
        self.retry_operation_errors.unwrap_or(true)
    }
}

impl RefreshSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.unwrap_or(DEFAULT_REFRESH_INTERVAL_MS))
    }

    pub fn auto_refresh(&self) -> bool {
        self.auto_refresh.unwrap_or(false)
    }
}

impl SubscriptionSettings {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(
            self.reconnect_delay_ms
                .unwrap_or(DEFAULT_RECONNECT_DELAY_MS),
        )
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_millis(
            self.max_reconnect_delay_ms
                .unwrap_or(DEFAULT_MAX_RECONNECT_DELAY_MS),
        )
    }
}

impl ObserraConfig {
    /// Executor settings resolved against the built-in defaults.
    pub fn query_config(&self) -> QueryConfig {
        QueryConfig {
            timeout: Duration::from_millis(self.query.timeout_ms()),
            retries: self.query.retries(),
            retry_delay: Duration::from_millis(self.query.retry_delay_ms()),
            retry_operation_errors: self.query.retry_operation_errors(),
        }
    }
}
