use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalize::ServiceInsights;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Up,
    Down,
    Warning,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceStatus::Up => "up",
            ServiceStatus::Down => "down",
            ServiceStatus::Warning => "warning",
            ServiceStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// A monitored service as returned by `services` and `service(id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub id: String,
    pub name: String,
    pub app: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub status: ServiceStatus,
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub insights: Option<ServiceInsights>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub service_id: String,
    pub timestamp: String,
    pub level: String,
    pub message: String,
    #[serde(default)]
    pub logger: Option<String>,
    #[serde(default)]
    pub thread: Option<String>,
    #[serde(default)]
    pub exception: Option<String>,
}
