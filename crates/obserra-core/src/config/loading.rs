//! Configuration loading and merging logic.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in the following order (later sources override earlier ones):
//! 1. **Hardcoded defaults** - Built-in fallback values
//! 2. **User config** - `~/.obserra/config.toml`
//! 3. **Project config** - `./.obserra/config.toml`
//! 4. **Environment** - `OBSERRA_ENDPOINT`

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::defaults::ENDPOINT_ENV_VAR;
use crate::config::types::{
    EndpointConfig, ObserraConfig, QuerySettings, RefreshSettings, SubscriptionSettings,
};
use crate::config::validation::validate_config;
use crate::errors::ConfigError;

/// Load configuration from the hierarchy of config files.
///
/// # Errors
///
/// Returns an error if a present file cannot be read or parsed, or if the
/// merged configuration fails validation. Missing config files are not errors.
pub fn load_hierarchy() -> Result<ObserraConfig, ConfigError> {
    let user_path = user_config_path();
    if user_path.is_none() {
        warn!(
            event = "core.config.home_dir_missing",
            "Could not find home directory, skipping user config"
        );
    }
    let project_path = std::env::current_dir()
        .ok()
        .map(|dir| dir.join(".obserra").join("config.toml"));

    load_from_paths(
        user_path.as_deref(),
        project_path.as_deref(),
        std::env::var(ENDPOINT_ENV_VAR).ok(),
    )
}

/// Load and merge the given config files, then apply the environment override.
pub fn load_from_paths(
    user_path: Option<&Path>,
    project_path: Option<&Path>,
    endpoint_env: Option<String>,
) -> Result<ObserraConfig, ConfigError> {
    let mut config = ObserraConfig::default();

    for path in [user_path, project_path].into_iter().flatten() {
        if let Some(file_config) = load_config_file(path)? {
            debug!(event = "core.config.file_loaded", path = %path.display());
            config = merge_configs(config, file_config);
        }
    }

    config = apply_endpoint_override(config, endpoint_env);
    validate_config(&config)?;

    Ok(config)
}

/// Load a configuration file, returning `None` when it does not exist.
pub fn load_config_file(path: &Path) -> Result<Option<ObserraConfig>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ConfigError::ConfigReadError {
                path: path.display().to_string(),
                message: e.to_string(),
            });
        }
    };

    let config = toml::from_str(&content).map_err(|e| ConfigError::ConfigParseError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    Ok(Some(config))
}

/// Path of the user config file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".obserra").join("config.toml"))
}

/// Replace the endpoint URL with the environment value when it is set and non-empty.
///
/// An explicit `ws_url` from a config file is dropped as well so that the
/// WebSocket address follows the overridden endpoint.
pub fn apply_endpoint_override(
    mut config: ObserraConfig,
    endpoint_env: Option<String>,
) -> ObserraConfig {
    if let Some(url) = endpoint_env.filter(|u| !u.trim().is_empty()) {
        debug!(event = "core.config.endpoint_overridden", url = %url);
        config.endpoint = EndpointConfig {
            url: Some(url.trim().to_string()),
            ws_url: None,
        };
    }
    config
}

/// Merge two configurations, with override_config taking precedence.
///
/// Each setting is taken from the override when present and from the base otherwise.
pub fn merge_configs(base: ObserraConfig, override_config: ObserraConfig) -> ObserraConfig {
    ObserraConfig {
        endpoint: EndpointConfig {
            url: override_config.endpoint.url.or(base.endpoint.url),
            ws_url: override_config.endpoint.ws_url.or(base.endpoint.ws_url),
        },
        query: QuerySettings {
            timeout_ms: override_config.query.timeout_ms.or(base.query.timeout_ms),
            retries: override_config.query.retries.or(base.query.retries),
            retry_delay_ms: override_config
                .query
                .retry_delay_ms
                .or(base.query.retry_delay_ms),
            retry_operation_errors: override_config
                .query
                .retry_operation_errors
                .or(base.query.retry_operation_errors),
        },
        refresh: RefreshSettings {
            interval_ms: override_config
                .refresh
                .interval_ms
                .or(base.refresh.interval_ms),
            auto_refresh: override_config
                .refresh
                .auto_refresh
                .or(base.refresh.auto_refresh),
        },
        subscription: SubscriptionSettings {
            reconnect_delay_ms: override_config
                .subscription
                .reconnect_delay_ms
                .or(base.subscription.reconnect_delay_ms),
            max_reconnect_delay_ms: override_config
                .subscription
                .max_reconnect_delay_ms
                .or(base.subscription.max_reconnect_delay_ms),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn write_config(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_files_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from_paths(
            Some(&dir.path().join("missing-user.toml")),
            Some(&dir.path().join("missing-project.toml")),
            None,
        )
        .unwrap();

        assert_eq!(config, ObserraConfig::default());
    }

    #[test]
    fn test_project_overrides_user() {
        let dir = tempfile::tempdir().unwrap();
        let user = write_config(
            dir.path(),
            "user.toml",
            "[query]\nretries = 5\ntimeout_ms = 9000\n\n[refresh]\nauto_refresh = true\n",
        );
        let project = write_config(dir.path(), "project.toml", "[query]\nretries = 1\n");

        let config = load_from_paths(Some(&user), Some(&project), None).unwrap();

        assert_eq!(config.query.retries(), 1);
        assert_eq!(config.query.timeout_ms(), 9000);
        assert!(config.refresh.auto_refresh());
    }

    #[test]
    fn test_env_overrides_files() {
        let dir = tempfile::tempdir().unwrap();
        let user = write_config(
            dir.path(),
            "user.toml",
            "[endpoint]\nurl = \"http://file:5000/graphql\"\nws_url = \"ws://file:5001/graphql\"\n",
        );

        let config = load_from_paths(
            Some(&user),
            None,
            Some("https://env.example/graphql".to_string()),
        )
        .unwrap();

        assert_eq!(config.endpoint.url(), "https://env.example/graphql");
        assert_eq!(config.endpoint.ws_url(), "wss://env.example/graphql");
    }

    #[test]
    fn test_empty_env_is_ignored() {
        let config = apply_endpoint_override(ObserraConfig::default(), Some("  ".to_string()));
        assert_eq!(config.endpoint.url(), "http://localhost:5000/graphql");
    }

    #[test]
    fn test_parse_error_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let user = write_config(dir.path(), "user.toml", "[query\nretries = ");

        let result = load_from_paths(Some(&user), None, None);
        assert!(matches!(
            result,
            Err(ConfigError::ConfigParseError { .. })
        ));
    }

    #[test]
    fn test_invalid_merged_config_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let project = write_config(dir.path(), "project.toml", "[refresh]\ninterval_ms = 0\n");

        let result = load_from_paths(None, Some(&project), None);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_merge_keeps_base_when_override_absent() {
        let base = ObserraConfig {
            subscription: SubscriptionSettings {
                reconnect_delay_ms: Some(200),
                max_reconnect_delay_ms: None,
            },
            ..Default::default()
        };
        let merged = merge_configs(base, ObserraConfig::default());
        assert_eq!(
            merged.subscription.reconnect_delay(),
            Duration::from_millis(200)
        );
    }
}
