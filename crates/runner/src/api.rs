//! HTTP API exposing run status and Prometheus metrics

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chaos_lib::{ExperimentMetrics, ExperimentState, StateTracker};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub tracker: StateTracker,
    pub metrics: ExperimentMetrics,
}

impl AppState {
    pub fn new(tracker: StateTracker, metrics: ExperimentMetrics) -> Self {
        Self { tracker, metrics }
    }
}

#[derive(Debug, Serialize)]
struct HealthBody {
    state: ExperimentState,
}

/// 200 while the run is in progress or done, 503 once it has failed
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let current = state.tracker.state().await;

    let status_code = match current {
        ExperimentState::Error(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (status_code, Json(HealthBody { state: current }))
}

/// Full snapshot of the current run
async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.tracker.snapshot().await)
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting status server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind status server on {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
