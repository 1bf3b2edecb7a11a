use crate::errors::ObserraError;

/// Response data that does not have the shape an operation expects.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("Response is missing field '{field}'")]
    MissingField { field: &'static str },

    #[error("Field '{field}' has an unexpected shape: {message}")]
    InvalidShape { field: &'static str, message: String },
}

impl ObserraError for DecodeError {
    fn error_code(&self) -> &'static str {
        match self {
            DecodeError::MissingField { .. } => "DECODE_MISSING_FIELD",
            DecodeError::InvalidShape { .. } => "DECODE_INVALID_SHAPE",
        }
    }
}

/// Failures of the REST action endpoints.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("Invalid endpoint '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Request failed: {message}")]
    RequestFailed { message: String },

    #[error("Service '{service_id}' not found")]
    ServiceNotFound { service_id: String },

    #[error("Server responded with HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Invalid response body: {message}")]
    InvalidBody { message: String },
}

impl ObserraError for RestError {
    fn error_code(&self) -> &'static str {
        match self {
            RestError::InvalidUrl { .. } => "REST_INVALID_URL",
            RestError::RequestFailed { .. } => "REST_REQUEST_FAILED",
            RestError::ServiceNotFound { .. } => "REST_SERVICE_NOT_FOUND",
            RestError::HttpStatus { .. } => "REST_HTTP_STATUS",
            RestError::InvalidBody { .. } => "REST_INVALID_BODY",
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(
            self,
            RestError::InvalidUrl { .. } | RestError::ServiceNotFound { .. }
        )
    }
}
