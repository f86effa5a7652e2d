//! Middleware stack tests.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::Extension,
    http::{Request, StatusCode},
    routing::{get, post},
    Router,
};
use tower::ServiceExt;

use super::*;

/// Same layer order as the production router: request id outermost.
fn app(metrics: Arc<RequestMetrics>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/:cell/:box_name/:collection/$batch",
            post(|| async { StatusCode::ACCEPTED }),
        )
        .route(
            "/echo-id",
            get(|Extension(id): Extension<RequestId>| async move { id.0 }),
        )
        .route("/boom", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .layer(RequestLoggingLayer::new())
        .layer(TracingLayer::new())
        .layer(MetricsLayer::new(metrics))
        .layer(RequestIdLayer::new())
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Test: Request id is generated when absent
#[tokio::test]
async fn test_request_id_generated() {
    let response = app(RequestMetrics::new_shared())
        .oneshot(get_request("/health"))
        .await
        .unwrap();

    let id = response.headers().get(REQUEST_ID_HEADER).unwrap();
    assert!(uuid::Uuid::parse_str(id.to_str().unwrap()).is_ok());
}

/// Test: Client request id is echoed and visible to handlers
#[tokio::test]
async fn test_request_id_propagated() {
    let response = app(RequestMetrics::new_shared())
        .oneshot(
            Request::builder()
                .uri("/echo-id")
                .header(REQUEST_ID_HEADER, "client-7")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "client-7");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"client-7");
}

/// Test: Metrics count batches, errors and unmatched routes
#[tokio::test]
async fn test_metrics_collected() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let metrics = RequestMetrics::new_shared();
    let app = app(Arc::clone(&metrics));

    let batch = Request::builder()
        .method("POST")
        .uri("/cell/box/odata/$batch")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(batch).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app.clone().oneshot(get_request("/boom")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = app.oneshot(get_request("/nowhere")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(metrics.get_request_count(), 3);
    assert_eq!(metrics.get_accepted_count(), 1);
    assert_eq!(metrics.get_server_error_count(), 1);
    assert_eq!(metrics.get_client_error_count(), 1);
}

/// Test: Concurrent requests are all counted
#[tokio::test]
async fn test_concurrent_requests_counted() {
    let metrics = RequestMetrics::new_shared();
    let app = app(Arc::clone(&metrics));

    let calls = (0..20).map(|_| app.clone().oneshot(get_request("/health")));
    let responses = futures::future::join_all(calls).await;

    assert!(responses
        .into_iter()
        .all(|r| r.map(|r| r.status() == StatusCode::OK).unwrap_or(false)));
    assert_eq!(metrics.get_request_count(), 20);
    assert_eq!(metrics.get_success_count(), 20);
}
