use serde_json::Value;

use crate::errors::ObserraError;
use crate::protocol::GraphQlError;
use crate::protocol::response::join_messages;
use crate::transport::TransportError;

/// Failure of a query or mutation after the executor's retry policy ran.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    /// The request never produced a response (connection refused, reset, ...).
    #[error("Transport error: {source}")]
    Transport { source: TransportError },

    /// The server answered without a valid GraphQL envelope.
    #[error("Protocol error: {source}")]
    Protocol { source: TransportError },

    /// A well-formed envelope carried `errors`. Partial `data` is kept.
    #[error("Operation failed: {}", join_messages(.errors))]
    Operation {
        errors: Vec<GraphQlError>,
        data: Option<Value>,
    },

    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Operation cancelled")]
    Cancelled,
}

impl QueryError {
    /// Whether another attempt may be made after this failure.
    ///
    /// Timeouts and cancellations never are. Operation errors are retried
    /// unless the caller classified them as permanent.
    pub fn is_retryable(&self, retry_operation_errors: bool) -> bool {
        match self {
            QueryError::Transport { .. } | QueryError::Protocol { .. } => true,
            QueryError::Operation { .. } => retry_operation_errors,
            QueryError::Timeout { .. } | QueryError::Cancelled => false,
        }
    }

    /// Data that arrived alongside `errors`, if any.
    pub fn partial_data(&self) -> Option<&Value> {
        match self {
            QueryError::Operation { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueryError::Cancelled)
    }
}

impl From<TransportError> for QueryError {
    fn from(source: TransportError) -> Self {
        if source.is_protocol_error() {
            QueryError::Protocol { source }
        } else {
            QueryError::Transport { source }
        }
    }
}

impl ObserraError for QueryError {
    fn error_code(&self) -> &'static str {
        match self {
            QueryError::Transport { .. } => "QUERY_TRANSPORT_ERROR",
            QueryError::Protocol { .. } => "QUERY_PROTOCOL_ERROR",
            QueryError::Operation { .. } => "QUERY_OPERATION_ERROR",
            QueryError::Timeout { .. } => "QUERY_TIMEOUT",
            QueryError::Cancelled => "QUERY_CANCELLED",
        }
    }
}
