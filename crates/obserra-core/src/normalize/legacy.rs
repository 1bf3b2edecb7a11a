use serde::{Deserialize, Serialize};

use super::insights::ServiceInsights;
use super::quantity::{finite_or_zero, parse_bytes, parse_duration_secs};
use crate::operations::types::{ServiceInfo, ServiceStatus};

/// The flat metrics shape older dashboard views consume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyMetrics {
    pub memory: MemoryUsage,
    pub cpu: CpuUsage,
    pub errors: ErrorSummary,
    pub uptime: UptimeSummary,
}

/// Bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub used: u64,
    pub max: u64,
    pub usage_percentage: f64,
    pub trend: Vec<u64>,
}

/// Percent, with `max` fixed at 100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    pub used: f64,
    pub max: f64,
    pub trend: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub count: u64,
    pub trend: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UptimeSummary {
    pub seconds: u64,
    pub start_time: Option<String>,
}

/// A service in the legacy shape: identity plus flat metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDetail {
    pub id: String,
    pub name: String,
    pub app: String,
    pub version: Option<String>,
    pub namespace: Option<String>,
    pub status: ServiceStatus,
    pub updated: String,
    pub pod_name: Option<String>,
    #[serde(flatten)]
    pub metrics: LegacyMetrics,
}

/// Map the nested insights into the legacy flat metrics.
pub fn normalize_insights(insights: Option<&ServiceInsights>) -> LegacyMetrics {
    let metrics = insights.and_then(|i| i.metrics.as_ref());
    let memory = metrics.and_then(|m| m.memory.as_ref());
    let cpu = metrics.and_then(|m| m.cpu.as_ref());
    let uptime = metrics.and_then(|m| m.uptime.as_ref());

    let bytes = |value: Option<&String>| value.map(|v| parse_bytes(v)).unwrap_or(0);

    LegacyMetrics {
        memory: MemoryUsage {
            used: bytes(memory.and_then(|m| m.used.as_ref())),
            max: bytes(memory.and_then(|m| m.max.as_ref())),
            usage_percentage: finite_or_zero(memory.and_then(|m| m.usage_percentage)),
            trend: Vec::new(),
        },
        cpu: CpuUsage {
            used: finite_or_zero(cpu.and_then(|c| c.process_usage)),
            max: 100.0,
            trend: Vec::new(),
        },
        errors: ErrorSummary::default(),
        uptime: UptimeSummary {
            seconds: uptime
                .and_then(|u| u.uptime.as_deref())
                .map(parse_duration_secs)
                .unwrap_or(0),
            start_time: uptime.and_then(|u| u.start_time.clone()),
        },
    }
}

pub fn normalize_service(service: &ServiceInfo) -> ServiceDetail {
    ServiceDetail {
        id: service.id.clone(),
        name: service.name.clone(),
        app: service.app.clone(),
        version: service.version.clone(),
        namespace: service.namespace.clone(),
        status: service.status,
        updated: service.updated.clone(),
        pod_name: None,
        metrics: normalize_insights(service.insights.as_ref()),
    }
}
