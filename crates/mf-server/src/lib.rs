//! mf-server: HTTP submission API and the background worker.
//!
//! This crate ties the other mf-* crates into a running service:
//!
//! - Axum-based HTTP API for submitting jobs and reading their status
//! - Background [`Worker`](mf_pipeline::Worker) that drains the job queue
//!   through the executor
//! - Graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod router;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use mf_av::{FfmpegEngine, ToolRegistry, TransformEngine};
use mf_core::config::Config;
use mf_pipeline::{JobExecutor, JobQueue, Worker};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use crate::context::AppContext;

/// Start the mediaflow server.
///
/// Discovers ffmpeg, prepares the storage root, binds the configured
/// address and serves until a shutdown signal is received.
pub async fn start(config: Config) -> mf_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let tools = ToolRegistry::discover(&config.tools);
    for info in tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::debug!("Tool not found: {}", info.name);
        }
    }
    let engine: Arc<dyn TransformEngine> = Arc::new(FfmpegEngine::from_registry(
        &tools,
        config.transform.timeout(),
    )?);

    let root = &config.storage.root;
    if !root.exists() {
        std::fs::create_dir_all(root)?;
        tracing::info!("Created storage root {}", root.display());
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| mf_core::Error::Internal(format!("Invalid server address: {e}")))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| mf_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;
    tracing::info!("Starting server on {addr}");

    serve(AppContext::new(config), engine, listener, CancellationToken::new()).await
}

/// Serve the API on `listener` and run the worker alongside it.
///
/// Returns once `cancel` fires or a shutdown signal arrives. The queue is
/// closed to new submissions first, then jobs already running are driven
/// to their terminal state before this returns.
pub async fn serve(
    ctx: AppContext,
    engine: Arc<dyn TransformEngine>,
    listener: TcpListener,
    cancel: CancellationToken,
) -> mf_core::Result<()> {
    let executor = Arc::new(JobExecutor::from_config(&ctx.config, engine));
    let queue: Arc<dyn JobQueue> = ctx.queue.clone();
    let worker = Worker::new(
        queue,
        executor,
        ctx.store.clone(),
        ctx.config.worker.concurrency,
    );

    let worker_cancel = cancel.clone();
    let worker_handle = tokio::spawn(async move {
        worker.run(worker_cancel).await;
    });

    let app = router::build_router(ctx.clone());
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .map_err(|e| mf_core::Error::Internal(format!("Server error: {e}")));

    ctx.queue.close();
    cancel.cancel();
    if let Err(e) = worker_handle.await {
        tracing::error!("Worker task failed: {e}");
    }

    tracing::info!("Server shutdown complete");
    result
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
