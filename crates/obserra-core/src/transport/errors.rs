use crate::errors::ObserraError;

/// Failure of a single request or live-channel operation.
///
/// `ConnectionFailed` and `Closed` are network-level failures. `HttpStatus`
/// and `MalformedPayload` mean the server answered, but not with a valid
/// GraphQL envelope.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Server returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Malformed response: {message}")]
    MalformedPayload { message: String },

    #[error("Connection closed")]
    Closed,
}

impl TransportError {
    /// Whether the server answered with something other than a valid envelope.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            TransportError::HttpStatus { .. } | TransportError::MalformedPayload { .. }
        )
    }
}

impl ObserraError for TransportError {
    fn error_code(&self) -> &'static str {
        match self {
            TransportError::ConnectionFailed { .. } => "TRANSPORT_CONNECTION_FAILED",
            TransportError::HttpStatus { .. } => "TRANSPORT_HTTP_STATUS",
            TransportError::MalformedPayload { .. } => "TRANSPORT_MALFORMED_PAYLOAD",
            TransportError::Closed => "TRANSPORT_CLOSED",
        }
    }
}
