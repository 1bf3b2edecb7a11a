use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info};

use super::errors::RestError;
use super::types::LogEntry;

/// Client for the REST action endpoints served next to the GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base: Url,
}

impl RestClient {
    /// `endpoint_url` is the GraphQL endpoint; its origin hosts `/api`.
    pub fn new(endpoint_url: &str) -> Result<Self, RestError> {
        let base = Url::parse(endpoint_url).map_err(|e| RestError::InvalidUrl {
            url: endpoint_url.to_string(),
            message: e.to_string(),
        })?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("obserra/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RestError::RequestFailed {
                message: format!("HTTP client error: {}", e),
            })?;
        Ok(Self { client, base })
    }

    fn service_url(&self, service_id: &str, action: &str) -> Result<Url, RestError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RestError::InvalidUrl {
                url: self.base.to_string(),
                message: "endpoint cannot be a base URL".to_string(),
            })?
            .clear()
            .extend(["api", "services", service_id, action]);
        url.set_query(None);
        Ok(url)
    }

    /// Ask the backend to restart a service. Returns the backend's reply.
    pub async fn restart_service(&self, service_id: &str) -> Result<Value, RestError> {
        let url = self.service_url(service_id, "restart")?;
        info!(event = "core.rest.restart_started", service_id = service_id);

        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| RestError::RequestFailed {
                message: e.to_string(),
            })?;
        let body = check_status(response, service_id).await?;

        info!(event = "core.rest.restart_completed", service_id = service_id);
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| RestError::InvalidBody {
            message: e.to_string(),
        })
    }

    pub async fn service_logs(&self, service_id: &str) -> Result<Vec<LogEntry>, RestError> {
        let url = self.service_url(service_id, "logs")?;
        debug!(event = "core.rest.logs_started", service_id = service_id);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RestError::RequestFailed {
                message: e.to_string(),
            })?;
        let body = check_status(response, service_id).await?;

        serde_json::from_str(&body).map_err(|e| RestError::InvalidBody {
            message: e.to_string(),
        })
    }
}

async fn check_status(response: reqwest::Response, service_id: &str) -> Result<String, RestError> {
    let status = response.status();
    let body = response.text().await.map_err(|e| RestError::RequestFailed {
        message: e.to_string(),
    })?;

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(RestError::ServiceNotFound {
            service_id: service_id.to_string(),
        });
    }
    if !status.is_success() {
        return Err(RestError::HttpStatus {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}
