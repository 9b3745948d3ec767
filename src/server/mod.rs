pub mod metrics;
mod routes;
pub mod state;

pub use state::ServerState;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub fn make_router(state: ServerState) -> Router {
    let admin_routes = Router::new()
        .route("/refresh/rebuild", post(routes::trigger_rebuild))
        .route("/refresh/pending", get(routes::pending_refreshes))
        .route("/audit", get(routes::audit_log));

    Router::new()
        .route("/search", get(routes::search))
        .nest("/admin", admin_routes)
        .route("/health", get(routes::health))
        .route("/metrics", get(metrics::metrics_handler))
        .with_state(state)
}

pub async fn run_server(state: ServerState, port: u16, shutdown: CancellationToken) -> Result<()> {
    let router = make_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on port {}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Server error")?;

    Ok(())
}
