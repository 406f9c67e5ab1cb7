//! Health check and Prometheus metrics HTTP server
//!
//! Serves liveness and queue statistics over Axum alongside the Prometheus
//! text exposition, on a port separate from the AMQP plumbing.

use crate::metrics::collector::MetricsCollector;
use crate::queue::coordinator::MatchCoordinator;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    /// Port to bind the health server to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Shared state for the health server
#[derive(Clone)]
pub struct HealthServerState {
    pub metrics: Arc<MetricsCollector>,
    pub coordinator: MatchCoordinator,
}

/// HTTP server exposing health and metrics endpoints
pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    pub fn new(
        config: HealthServerConfig,
        metrics: Arc<MetricsCollector>,
        coordinator: MatchCoordinator,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            state: HealthServerState {
                metrics,
                coordinator,
            },
            shutdown_tx,
        }
    }

    /// Bind and serve until a shutdown signal arrives
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid health server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr).await?;

        info!("Health server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Health server shutdown signal received");
            })
            .await?;

        info!("Health server stopped");
        Ok(())
    }

    fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/healthz", get(healthz_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state.clone())
    }

    /// Signal the serving task to stop
    pub fn stop(&self) {
        if self.shutdown_tx.send(()).is_err() {
            warn!("Health server was not running");
        }
    }
}

/// Service information for the root path
async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "ready-room",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/healthz", "/metrics"]
    }))
}

/// Liveness plus current queue statistics
async fn healthz_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Health check requested");

    match state.coordinator.stats() {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "ready-room",
                "version": env!("CARGO_PKG_VERSION"),
                "players_waiting": stats.players_waiting,
                "players_in_groups": stats.players_in_groups,
                "active_groups": stats.active_groups,
                "categories": stats.categories,
                "timestamp": chrono::Utc::now(),
            })),
        ),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "ready-room",
                    "error": e.to_string(),
                })),
            )
        }
    }
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<HealthServerState>) -> Response {
    debug!("Metrics endpoint requested");

    match state.metrics.gather() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}
