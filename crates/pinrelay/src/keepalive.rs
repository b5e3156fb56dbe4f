//! Tiny HTTP endpoint so hosting platforms that probe a port keep the
//! process running.

use anyhow::Context;
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

fn router() -> Router {
    Router::new().route("/", get(|| async { "alive" }))
}

/// Bind `0.0.0.0:port` and answer until `shutdown` is cancelled.
pub async fn serve(port: u16, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind keep-alive server to {addr}"))?;
    info!(%addr, "keep-alive server listening");
    serve_on(listener, shutdown).await
}

async fn serve_on(listener: TcpListener, shutdown: CancellationToken) -> anyhow::Result<()> {
    axum::serve(listener, router())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("keep-alive server error")
}
