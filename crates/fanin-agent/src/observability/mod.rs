//! Observability infrastructure for the agent.
//!
//! - Structured logging configuration (`tracing-subscriber`)
//! - Prometheus metrics endpoint (`metrics-exporter-prometheus`)

mod logging;
mod metrics;

pub use logging::{init_logging, parse_log_level, LoggingConfig};
pub use metrics::{init_metrics, metrics_handler, MetricsError, MetricsState};
