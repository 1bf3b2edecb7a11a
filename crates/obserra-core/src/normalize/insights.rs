//! The nested `insights` shape returned by the backend.
//!
//! All fields are optional on the wire. Missing objects deserialize to
//! their defaults so normalization never has to fail.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceInsights {
    pub health: Option<HealthInsight>,
    pub metrics: Option<MetricsInsight>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HealthInsight {
    pub status: Option<String>,
    pub components: Vec<HealthComponentEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthComponentEntry {
    pub name: String,
    pub component: HealthComponent,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthComponent {
    pub status: String,
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetricsInsight {
    pub memory: Option<MemoryInsight>,
    pub cpu: Option<CpuInsight>,
    pub uptime: Option<UptimeInsight>,
    pub threads: Option<ThreadInsight>,
    pub thread_pool: Option<ThreadPoolInsight>,
    pub disk: Option<DiskInsight>,
}

/// Sizes are display strings such as `"256 MB"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemoryInsight {
    pub used: Option<String>,
    pub max: Option<String>,
    pub max_heap: Option<String>,
    pub max_non_heap: Option<String>,
    pub committed: Option<String>,
    pub live_data_size: Option<String>,
    pub max_data_size: Option<String>,
    pub usage_percentage: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CpuInsight {
    /// Percent of one host.
    pub process_usage: Option<f64>,
    pub system_usage: Option<f64>,
    pub available_processors: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UptimeInsight {
    /// Formatted as `"1d 2h 3m 4s"`.
    pub uptime: Option<String>,
    pub start_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThreadInsight {
    pub live_threads: Option<u32>,
    pub daemon_threads: Option<u32>,
    pub peak_threads: Option<u32>,
}

/// Counts are display strings such as `"1.2K"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThreadPoolInsight {
    pub pool_size: Option<String>,
    pub active_threads: Option<String>,
    pub core_pool_size: Option<String>,
    pub max_pool_size: Option<String>,
    pub queued_tasks: Option<String>,
    pub usage_percentage: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiskInsight {
    pub total: Option<String>,
    pub free: Option<String>,
    pub usable: Option<String>,
    pub usage_percentage: Option<f64>,
}
