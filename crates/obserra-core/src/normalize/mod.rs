//! Reconciles the backend's nested `insights` shape with the flat legacy
//! metrics shape. Pure and total.

pub mod insights;
mod legacy;
pub mod quantity;

pub use insights::ServiceInsights;
pub use legacy::{
    CpuUsage, ErrorSummary, LegacyMetrics, MemoryUsage, ServiceDetail, UptimeSummary,
    normalize_insights, normalize_service,
};
pub use quantity::{parse_bytes, parse_duration_secs, parse_quantity};
