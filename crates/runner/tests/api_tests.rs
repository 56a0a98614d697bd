//! Integration tests for the status API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chaos_lib::{ExperimentMetrics, ExperimentState, RunResult, StateTracker};
use node_cpu_hog::api::{create_router, serve, AppState};
use std::sync::Arc;
use tower::ServiceExt;

fn setup_test_app() -> (Router, Arc<AppState>) {
    let tracker = StateTracker::new("node-cpu-hog", "abcdef");
    let metrics = ExperimentMetrics::new();
    let state = Arc::new(AppState::new(tracker, metrics));
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_healthz_ok_while_running() {
    let (app, state) = setup_test_app();
    state
        .tracker
        .transition(ExperimentState::HelperRunning)
        .await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["state"], "helper_running");
}

#[tokio::test]
async fn test_healthz_unavailable_after_failure() {
    let (app, state) = setup_test_app();
    state
        .tracker
        .transition(ExperimentState::Error(RunResult::HelperNotRunning))
        .await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["state"]["error"], "helper_not_running");
}

#[tokio::test]
async fn test_status_returns_snapshot() {
    let (app, state) = setup_test_app();
    state.tracker.set_target("node-a").await;
    state.tracker.set_cpu_cores(4).await;
    state
        .tracker
        .transition(ExperimentState::TargetResolved)
        .await;

    let (status, body) = get(app, "/status").await;
    assert_eq!(status, StatusCode::OK);

    let snapshot: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(snapshot["experiment"], "node-cpu-hog");
    assert_eq!(snapshot["run_id"], "abcdef");
    assert_eq!(snapshot["target_node"], "node-a");
    assert_eq!(snapshot["cpu_cores"], 4);
    assert_eq!(snapshot["state"], "target_resolved");
    assert_eq!(snapshot["history"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_metrics_exposes_experiment_series() {
    let (app, state) = setup_test_app();
    state.metrics.inc_run("completed");
    state.metrics.set_cpu_cores(2);

    let (status, body) = get(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);

    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("node_cpu_hog_runs_total"));
    assert!(text.contains("node_cpu_hog_cpu_cores"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _state) = setup_test_app();
    let (status, _) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_serve_reports_bind_failure() {
    let occupied = tokio::net::TcpListener::bind("0.0.0.0:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();
    let (_app, state) = setup_test_app();

    let err = serve(port, state).await.unwrap_err();
    assert!(err.to_string().contains("Failed to bind status server"));
}
