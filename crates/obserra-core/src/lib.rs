//! obserra-core: Resilient data access for the Obserra monitoring dashboard
//!
//! This library provides everything a dashboard view needs to talk to the
//! Obserra backend. It is used by the CLI and by any other front end.
//!
//! # Main Entry Points
//!
//! - [`query`] - Execute queries and mutations with timeout and retry
//! - [`subscription`] - Multiplex live subscriptions over one connection
//! - [`refresh`] - Per-view result sessions with auto-refresh polling
//! - [`normalize`] - Map insight responses into the legacy flat shape
//! - [`operations`] - Dashboard documents, typed results and REST actions
//! - [`config`] - Configuration management

pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod normalize;
pub mod operations;
pub mod protocol;
pub mod query;
pub mod refresh;
pub mod subscription;
pub mod transport;

// Re-export commonly used types at crate root for convenience
pub use config::ObserraConfig;
pub use errors::{ConfigError, ObserraError};
pub use normalize::{LegacyMetrics, ServiceDetail, normalize_insights, normalize_service};
pub use operations::RestClient;
pub use operations::types::{LogEntry, ServiceInfo, ServiceStatus};
pub use protocol::{OperationKind, QueryKey, Request, RequestPolicy};
pub use query::{Execution, QueryConfig, QueryError, QueryExecutor};
pub use refresh::{RefreshCoordinator, RefreshHandle, RefreshState, SessionSnapshot};
pub use subscription::{Subscription, SubscriptionBridge, SubscriptionError, SubscriptionEvent};
pub use transport::{CachedTransport, HttpTransport, Transport, TransportError, WsConnector};

// Re-export logging initialization
pub use logging::init_logging;
