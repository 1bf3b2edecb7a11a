//! # Configuration System
//!
//! Hierarchical TOML configuration for the Obserra data-access layer.
//!
//! ## Configuration Hierarchy
//!
//! Configuration is loaded in the following order (later sources override earlier ones):
//! 1. **Hardcoded defaults** - Built-in fallback values
//! 2. **User config** - `~/.obserra/config.toml` (global user preferences)
//! 3. **Project config** - `./.obserra/config.toml` (project-specific overrides)
//! 4. **Environment** - `OBSERRA_ENDPOINT` overrides the endpoint URL
//! 5. **CLI arguments** - Command-line flags (highest priority)
//!
//! ## Usage Example
//!
//! ```toml
//! # ~/.obserra/config.toml
//! [endpoint]
//! url = "http://obserra.internal:5000/graphql"
//!
//! [query]
//! timeout_ms = 10000
//! retries = 3
//!
//! [refresh]
//! interval_ms = 5000
//! auto_refresh = true
//! ```
//!
//! ## Loading Configuration
//!
//! ```rust,no_run
//! use obserra_core::config::ObserraConfig;
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ObserraConfig::load_hierarchy()?;
//!     let query_config = config.query_config();
//!     Ok(())
//! }
//! ```

pub mod defaults;
pub mod loading;
pub mod types;
pub mod validation;

pub use types::{
    EndpointConfig, ObserraConfig, QuerySettings, RefreshSettings, SubscriptionSettings,
};
pub use validation::validate_config;

impl ObserraConfig {
    /// Load configuration from the hierarchy of config files.
    ///
    /// See [`loading::load_hierarchy`] for details.
    pub fn load_hierarchy() -> Result<Self, crate::errors::ConfigError> {
        loading::load_hierarchy()
    }

    /// Validate the configuration.
    ///
    /// See [`validation::validate_config`] for details.
    pub fn validate(&self) -> Result<(), crate::errors::ConfigError> {
        validation::validate_config(self)
    }
}
