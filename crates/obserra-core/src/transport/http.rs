use tracing::debug;

use super::{Transport, TransportError};
use crate::protocol::{Request, Response};

/// Longest response body excerpt kept in `HttpStatus` errors.
const MAX_ERROR_BODY_LEN: usize = 512;

/// GraphQL over HTTP POST.
///
/// Timeouts are not configured on the client: the query executor owns the
/// operation deadline and drops the request future when it expires.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("obserra/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::ConnectionFailed {
                message: format!("HTTP client error: {}", e),
            })?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpTransport {
    async fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        debug!(
            event = "core.transport.http_request_started",
            operation = request.operation_name(),
            url = %self.url,
        );

        let response = self
            .client
            .post(&self.url)
            .json(&request.payload())
            .send()
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                message: e.to_string(),
            })?;

        if !status.is_success() {
            let mut text = String::from_utf8_lossy(&body).into_owned();
            if text.len() > MAX_ERROR_BODY_LEN {
                let mut cut = MAX_ERROR_BODY_LEN;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
            }
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        let envelope: Response =
            serde_json::from_slice(&body).map_err(|e| TransportError::MalformedPayload {
                message: e.to_string(),
            })?;

        debug!(
            event = "core.transport.http_request_completed",
            operation = request.operation_name(),
            status = status.as_u16(),
            has_errors = envelope.has_errors(),
        );

        Ok(envelope)
    }
}
