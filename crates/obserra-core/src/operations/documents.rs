//! Operation documents of the dashboard schema and their request builders.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::DecodeError;
use super::types::{LogEntry, ServiceInfo};
use crate::normalize::insights::MetricsInsight;
use crate::protocol::Request;

const LOG_FIELDS: &str = "
fragment LogFields on Log {
  id
  serviceId
  timestamp
  level
  message
  logger
  thread
  exception
}";

const SERVICE_SUMMARY: &str = "
fragment ServiceSummary on Service {
  id
  name
  app
  version
  namespace
  status
  updated
}";

pub const GET_SERVICES: &str = "query GetServices {
  services {
    ...ServiceSummary
    insights {
      metrics {
        memory { used max maxHeap maxNonHeap usagePercentage }
        cpu { processUsage systemUsage availableProcessors }
        uptime { startTime uptime }
      }
    }
  }
}";

pub const GET_SERVICE: &str = "query GetService($id: ID!) {
  service(id: $id) {
    ...ServiceSummary
    insights {
      health {
        status
        components { name component { status details } }
      }
      metrics {
        memory { used max maxHeap maxNonHeap committed liveDataSize maxDataSize usagePercentage }
        cpu { processUsage systemUsage availableProcessors }
        uptime { startTime uptime }
        threads { liveThreads daemonThreads peakThreads }
        threadPool { poolSize activeThreads corePoolSize maxPoolSize queuedTasks usagePercentage }
        disk { total free usable usagePercentage }
      }
    }
  }
}";

pub const GET_SERVICE_METRICS: &str = "query GetServiceMetrics($serviceId: ID!) {
  service(id: $serviceId) {
    insights {
      metrics {
        memory { used max maxHeap maxNonHeap committed liveDataSize maxDataSize usagePercentage }
        cpu { processUsage systemUsage availableProcessors }
        uptime { startTime uptime }
        threads { liveThreads daemonThreads peakThreads }
        threadPool { poolSize activeThreads corePoolSize maxPoolSize queuedTasks usagePercentage }
        disk { total free usable usagePercentage }
      }
    }
  }
}";

pub const GET_SERVICE_LOGS: &str = "query GetServiceLogs($serviceId: ID!, $limit: Int) {
  logs(serviceId: $serviceId, limit: $limit) {
    ...LogFields
  }
}";

pub const SERVICE_LOG_STREAM: &str = "subscription ServiceLogStream($serviceId: ID!) {
  logStream(serviceId: $serviceId) {
    ...LogFields
  }
}";

fn with_fragment(document: &str, fragment: &str) -> String {
    format!("{}\n{}", document, fragment)
}

pub fn get_services() -> Request {
    Request::query("GetServices", with_fragment(GET_SERVICES, SERVICE_SUMMARY))
}

pub fn get_service(id: &str) -> Request {
    Request::query("GetService", with_fragment(GET_SERVICE, SERVICE_SUMMARY)).with_variable("id", id)
}

pub fn get_service_metrics(service_id: &str) -> Request {
    Request::query("GetServiceMetrics", GET_SERVICE_METRICS).with_variable("serviceId", service_id)
}

/// Recent logs of a service. Without `limit` the server default applies.
pub fn get_service_logs(service_id: &str, limit: Option<u32>) -> Request {
    let request = Request::query("GetServiceLogs", with_fragment(GET_SERVICE_LOGS, LOG_FIELDS))
        .with_variable("serviceId", service_id);
    match limit {
        Some(limit) => request.with_variable("limit", limit),
        None => request,
    }
}

pub fn service_log_stream(service_id: &str) -> Request {
    Request::subscription(
        "ServiceLogStream",
        with_fragment(SERVICE_LOG_STREAM, LOG_FIELDS),
    )
    .with_variable("serviceId", service_id)
}

fn field<T: DeserializeOwned>(data: &Value, name: &'static str) -> Result<T, DecodeError> {
    let value = data
        .get(name)
        .ok_or(DecodeError::MissingField { field: name })?;
    serde_json::from_value(value.clone()).map_err(|e| DecodeError::InvalidShape {
        field: name,
        message: e.to_string(),
    })
}

pub fn decode_services(data: &Value) -> Result<Vec<ServiceInfo>, DecodeError> {
    field(data, "services")
}

/// `None` when the server knows no service with that id.
pub fn decode_service(data: &Value) -> Result<Option<ServiceInfo>, DecodeError> {
    field(data, "service")
}

pub fn decode_service_metrics(data: &Value) -> Result<Option<MetricsInsight>, DecodeError> {
    let Some(service) = data.get("service").filter(|s| !s.is_null()) else {
        return Ok(None);
    };
    match service.get("insights").filter(|i| !i.is_null()) {
        Some(insights) => field(insights, "metrics").map(Some),
        None => Ok(None),
    }
}

pub fn decode_logs(data: &Value) -> Result<Vec<LogEntry>, DecodeError> {
    field(data, "logs")
}

/// One `logStream` event.
pub fn decode_log_stream(data: &Value) -> Result<Vec<LogEntry>, DecodeError> {
    field(data, "logStream")
}
