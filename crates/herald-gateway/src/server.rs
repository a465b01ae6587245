// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::{get, post};
use herald_core::{HeraldError, ServiceStatus};
use herald_plugin::PluginRuntime;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;

/// Produces the live service status for `/api/status`.
pub type StatusFn = Arc<dyn Fn() -> ServiceStatus + Send + Sync>;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub runtime: Arc<PluginRuntime>,
    /// Process start time for uptime calculation.
    pub started_at: Instant,
    pub status: StatusFn,
}

impl GatewayState {
    pub fn new(runtime: Arc<PluginRuntime>, status: StatusFn) -> Self {
        Self {
            runtime,
            started_at: Instant::now(),
            status,
        }
    }
}

/// All routes, without binding a socket.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/api/status", get(handlers::get_status))
        .route("/api/plugins", get(handlers::get_plugins))
        .route("/api/plugins/{id}/reload", post(handlers::post_reload_plugin))
        .route("/api/headlines", get(handlers::get_headlines))
        .route("/feed.xml", get(handlers::get_feed))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the listener. Failing here aborts service start.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, HeraldError> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|e| HeraldError::Lifecycle(format!("failed to bind HTTP listener on {addr}: {e}")))
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), HeraldError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "gateway listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| HeraldError::Internal(format!("gateway server error: {e}")))?;
    info!("gateway stopped");
    Ok(())
}
