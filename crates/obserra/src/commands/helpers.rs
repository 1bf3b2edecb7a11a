use std::time::Duration;

use clap::ArgMatches;
use tracing::{debug, error};

use obserra_core::config::ObserraConfig;
use obserra_core::events;
use obserra_core::{CachedTransport, HttpTransport, QueryConfig, QueryExecutor};

pub type Executor = QueryExecutor<CachedTransport<HttpTransport>>;

/// Resolved configuration for one command invocation.
pub struct Context {
    pub config: ObserraConfig,
    pub query: QueryConfig,
}

impl Context {
    pub fn executor(&self) -> Result<Executor, Box<dyn std::error::Error>> {
        let transport = HttpTransport::new(self.config.endpoint.url())?;
        Ok(QueryExecutor::new(CachedTransport::new(transport)))
    }
}

/// Load the config hierarchy and apply the global CLI overrides.
pub fn load_context(matches: &ArgMatches) -> Result<Context, Box<dyn std::error::Error>> {
    let mut config = match ObserraConfig::load_hierarchy() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            error!(event = "cli.config_load_failed", error = %e);
            events::log_app_error(&e);
            return Err(e.into());
        }
    };

    if let Some(url) = matches.get_one::<String>("endpoint") {
        config.endpoint.url = Some(url.clone());
        config.endpoint.ws_url = None;
    }

    if let Err(e) = config.validate() {
        eprintln!("❌ Invalid configuration: {}", e);
        error!(event = "cli.config_invalid", error = %e);
        events::log_app_error(&e);
        return Err(e.into());
    }

    let mut query = config.query_config();
    if let Some(ms) = matches.get_one::<u64>("timeout-ms") {
        query = query.with_timeout(Duration::from_millis(*ms));
    }
    if let Some(retries) = matches.get_one::<u32>("retries") {
        query = query.with_retries(*retries);
    }
    if let Some(ms) = matches.get_one::<u64>("retry-delay-ms") {
        query = query.with_retry_delay(Duration::from_millis(*ms));
    }

    debug!(
        event = "cli.context_resolved",
        endpoint = config.endpoint.url(),
        timeout_ms = query.timeout.as_millis() as u64,
        retries = query.retries,
    );

    Ok(Context { config, query })
}
