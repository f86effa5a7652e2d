//! Observability router: metrics endpoint and middleware wiring.

mod common;

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use common::*;
use metrics_exporter_prometheus::PrometheusBuilder;
use obatch_api::http::{create_router_with_observability_and_limit, AppState, RouterLimits};
use obatch_api::middleware::REQUEST_ID_HEADER;
use obatch_api::observability::{init_metrics, MetricsError, MetricsState};
use serial_test::serial;
use tower::ServiceExt;

/// Metrics state over a recorder that is not installed globally.
fn detached_metrics() -> MetricsState {
    MetricsState::new(PrometheusBuilder::new().build_recorder().handle())
}

fn app(metrics: MetricsState) -> Router {
    create_router_with_observability_and_limit(
        AppState::new(sales_store()),
        metrics,
        RouterLimits {
            body_limit: 1024 * 1024,
            probe_timeout: Duration::from_secs(5),
        },
    )
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_metrics_endpoint_served() {
    let response = app(detached_metrics())
        .oneshot(get_request("/metrics"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/plain"));
}

#[tokio::test]
async fn test_metrics_endpoint_custom_path() {
    let app = app(detached_metrics().with_path("/internal/metrics"));

    let response = app
        .clone()
        .oneshot(get_request("/internal/metrics"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get_request("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Test: Batch responses carry a request id and are counted
#[tokio::test]
async fn test_batch_through_middleware() {
    let metrics = detached_metrics();
    let requests = metrics.request_metrics();
    let app = app(metrics);

    let request = Request::builder()
        .method("POST")
        .uri(BATCH_URI)
        .header("Content-Type", format!("multipart/mixed; boundary={BOUNDARY}"))
        .header(REQUEST_ID_HEADER, "trace-me")
        .body(Body::from(envelope_of(&[get("Sales")])))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "trace-me");

    let reply = send_batch(&app, "garbage".to_string()).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    assert_eq!(requests.get_request_count(), 2);
    assert_eq!(requests.get_accepted_count(), 1);
    assert_eq!(requests.get_client_error_count(), 1);
}

/// Test: The global recorder installs once per process
#[test]
#[serial]
fn test_init_metrics_installs_once() {
    let state = init_metrics().expect("first install");
    assert_eq!(state.path(), "/metrics");

    metrics::counter!("obatch_batch_requests_total", "outcome" => "accepted").increment(1);
    assert!(state.render().contains("obatch_batch_requests_total"));

    assert!(matches!(init_metrics(), Err(MetricsError::AlreadyInstalled)));
}
