//! fanin-agent binary
//!
//! Node-local batching proxy for serverless backend calls.
//!
//! # Usage
//!
//! ```bash
//! # Key-value agent against a local Redis
//! fanin-agent --backend redis --redis-host localhost
//!
//! # Object-store agent, environment overriding flags
//! BATCH_WINDOW=50 fanin-agent --backend s3 --default-bucket artifacts
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::signal;
use tracing::{info, warn};

use fanin_backend::{KvExecutor, ObjectStoreExecutor};
use fanin_batch::{Batcher, Executor};

use fanin_agent::config::{AgentConfig, BackendFamily};
use fanin_agent::http::{kv_router, object_router, observability_router, AppState};
use fanin_agent::observability::{
    init_logging, init_metrics, parse_log_level, LoggingConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AgentConfig::load();

    init_logging(&LoggingConfig {
        json_format: config.log_json,
        default_level: parse_log_level(&config.log_level),
    });

    info!(version = env!("CARGO_PKG_VERSION"), "starting fanin agent");
    config.log_effective();

    let metrics_state = init_metrics()?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    match config.backend {
        BackendFamily::Redis => {
            let executor = Arc::new(KvExecutor::connect(&config.kv_config())?);
            probe_backend(&*executor).await;

            let state = AppState::new(executor, config);
            let batcher = Arc::clone(&state.batcher);
            let router = kv_router(state).merge(observability_router(metrics_state));
            run_server(router, addr, batcher).await
        }
        BackendFamily::S3 => {
            let executor = Arc::new(ObjectStoreExecutor::connect(&config.object_config()).await);
            probe_backend(&*executor).await;

            let state = AppState::new(executor, config);
            let batcher = Arc::clone(&state.batcher);
            let router = object_router(state).merge(observability_router(metrics_state));
            run_server(router, addr, batcher).await
        }
    }
}

/// Verifies backend connectivity once at startup. A failing probe is a
/// warning: endpoints that do not touch the backend keep working, and
/// the rest surface errors per request.
async fn probe_backend<E: Executor>(executor: &E) {
    match executor.probe().await {
        Ok(()) => info!(backend = executor.backend_name(), "backend connectivity verified"),
        Err(error) => warn!(
            backend = executor.backend_name(),
            %error,
            "backend probe failed, continuing startup"
        ),
    }
}

/// Serves until a termination signal, then drains: the listener stops
/// accepting, in-flight handlers finish, and the batcher shuts down
/// (bounded by its grace period, after which still-parked handlers are
/// unblocked with a shutdown error).
async fn run_server<E: Executor>(
    router: Router,
    addr: SocketAddr,
    batcher: Arc<Batcher<E>>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    batcher.shutdown().await;
    info!("shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("received SIGTERM, initiating graceful shutdown");
        }
    }
}
