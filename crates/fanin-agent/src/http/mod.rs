//! HTTP front: route definitions, shared handlers, and error mapping.
//!
//! One router per backend family, generic over the executor behind the
//! batcher. Validation failures answer 400 before anything is
//! submitted; everything the batcher delivers on the error channel
//! surfaces as 500 with its cause.

mod kv;
mod object;
mod state;


use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::error;

use fanin_backend::{KvOp, KvReply, ObjectOp, ObjectReply};
use fanin_batch::{BatchError, BatchResult, Executor};

pub use state::AppState;

use crate::observability::{metrics_handler, MetricsState};

/// Request body size limit (1MB). The surface is query-driven, so this
/// is pure protection against oversized payloads.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Builds the key-value router (`/redis/*`).
pub fn kv_router<E>(state: AppState<E>) -> Router
where
    E: Executor<Op = KvOp, Reply = KvReply>,
{
    let debug_mode = state.config.debug_mode;
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/redis/get", get(kv::get_value::<E>))
        .route("/redis/set", post(kv::set_value::<E>))
        .route("/redis/del", delete(kv::del_value::<E>))
        .route("/redis/exists", get(kv::exists_value::<E>));

    if debug_mode {
        router = router.route("/debug/config", get(debug_config::<E>));
    }

    router
        .with_state(Arc::new(state))
        .layer(RequestBodyLimitLayer::new(DEFAULT_BODY_LIMIT))
}

/// Builds the object-store router (`/s3/*`).
pub fn object_router<E>(state: AppState<E>) -> Router
where
    E: Executor<Op = ObjectOp, Reply = ObjectReply>,
{
    let debug_mode = state.config.debug_mode;
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/s3/listBuckets", get(object::list_buckets::<E>))
        .route("/s3/listObjects", get(object::list_objects::<E>))
        .route("/s3/getObject", get(object::get_object::<E>));

    if debug_mode {
        router = router.route("/debug/config", get(debug_config::<E>));
    }

    router
        .with_state(Arc::new(state))
        .layer(RequestBodyLimitLayer::new(DEFAULT_BODY_LIMIT))
}

/// Observability routes, merged onto either family's router.
pub fn observability_router(metrics: MetricsState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

/// `GET /health` - unconditionally OK; never touches the backend.
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// `GET /debug/config` - effective configuration, secrets redacted.
/// Mounted only in debug mode.
async fn debug_config<E: Executor>(
    State(state): State<Arc<AppState<E>>>,
) -> Json<crate::config::AgentConfig> {
    Json(state.config.clone())
}

// ============================================================
// Error handling
// ============================================================

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    pub fn missing_parameter(name: &str) -> Self {
        Self::invalid_input(format!("missing required parameter: {name}"))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.code.as_str() {
            "validation_error" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        error!("request failed: {err}");
        ApiError::internal(err.to_string())
    }
}

/// Extracts a required, non-empty query parameter.
pub(crate) fn require(value: Option<String>, name: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::missing_parameter(name)),
    }
}

/// Awaits a request's delivery channel.
///
/// A closed channel means the worker was torn down mid-flight; the
/// caller is unblocked with the shutdown error.
pub(crate) async fn await_delivery<R>(
    rx: tokio::sync::oneshot::Receiver<BatchResult<R>>,
) -> Result<R, ApiError> {
    match rx.await {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(err)) => Err(ApiError::from(err)),
        Err(_) => Err(ApiError::from(BatchError::ShuttingDown)),
    }
}

/// The delivered reply variant did not match the endpoint, which means
/// a grouping bug rather than a backend failure.
pub(crate) fn unexpected_reply(endpoint: &str) -> ApiError {
    ApiError::internal(format!("unexpected reply type for {endpoint}"))
}
