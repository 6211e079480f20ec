pub mod analytics;
pub mod metrics;

#[cfg(feature = "tracing-basic")]
pub mod logging;

pub use analytics::ObservabilityLayer;
pub use metrics::{LiveMetrics, MetricsSnapshot, TargetMetrics};

#[cfg(feature = "tracing-basic")]
pub use logging::{init_tracing, LogFormat};
