//! The dashboard's operations: typed results of the GraphQL schema, the
//! documents that fetch them, and the REST action client.

pub mod documents;
pub mod errors;
pub mod rest;
pub mod types;

pub use documents::{
    decode_log_stream, decode_logs, decode_service, decode_service_metrics, decode_services,
    get_service, get_service_logs, get_service_metrics, get_services, service_log_stream,
};
pub use errors::{DecodeError, RestError};
pub use rest::RestClient;
pub use types::{LogEntry, ServiceInfo, ServiceStatus};
