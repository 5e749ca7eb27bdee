//! Prometheus metrics infrastructure.
//!
//! The batching engine records through the `metrics` facade; this module
//! installs the Prometheus recorder and serves the rendered text format.
//!
//! # Metrics exposed
//!
//! - `fanin_requests_total` - submitted requests
//! - `fanin_batches_total` - batches processed
//! - `fanin_batch_size` - requests per batch (histogram)
//! - `fanin_backend_calls_total` - backend calls issued
//! - `fanin_coalesced_requests_total` - requests satisfied by another
//!   request's backend call

use std::sync::Arc;

use axum::{extract::State, http::header::CONTENT_TYPE, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Shared state containing the Prometheus handle for rendering.
#[derive(Clone)]
pub struct MetricsState {
    handle: Arc<PrometheusHandle>,
}

impl MetricsState {
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Error type for metrics initialization.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to install Prometheus recorder: recorder already installed")]
    AlreadyInstalled,
}

/// Installs the Prometheus recorder. Must run once, before any metric
/// is recorded.
pub fn init_metrics() -> Result<MetricsState, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|_| MetricsError::AlreadyInstalled)?;

    describe_metrics();

    Ok(MetricsState {
        handle: Arc::new(handle),
    })
}

fn describe_metrics() {
    metrics::describe_counter!("fanin_requests_total", "Total requests submitted to the batcher");
    metrics::describe_counter!("fanin_batches_total", "Total batches processed");
    metrics::describe_histogram!("fanin_batch_size", "Requests per batch");
    metrics::describe_counter!("fanin_backend_calls_total", "Backend calls issued");
    metrics::describe_counter!(
        "fanin_coalesced_requests_total",
        "Requests satisfied by another request's backend call"
    );
}

/// `GET /metrics` in Prometheus text format.
pub async fn metrics_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.render(),
    )
}
