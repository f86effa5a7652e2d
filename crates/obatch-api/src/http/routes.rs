//! HTTP route definitions and handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, warn};

use obatch_domain::{boundary_from_content_type, DomainError};
use obatch_server::handlers::batch::{error_envelope, BatchError, BatchRequest};
use obatch_storage::{EntityStore, DATA_SERVICE_VERSION};

use super::state::AppState;
use crate::middleware::{MetricsLayer, RequestIdLayer, RequestLoggingLayer, TracingLayer};
use crate::observability::{metrics_handler, MetricsState};

/// Default request body size limit (10MB).
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Default timeout for probe routes. `$batch` is never timed out.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the protocol version on every batch response.
pub const DATA_SERVICE_VERSION_HEADER: &str = "DataServiceVersion";

/// Size and time limits applied by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterLimits {
    /// Maximum request body size in bytes.
    pub body_limit: usize,
    /// Timeout for `/health` and `/ready`.
    pub probe_timeout: Duration,
}

impl Default for RouterLimits {
    fn default() -> Self {
        Self {
            body_limit: DEFAULT_BODY_LIMIT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

fn batch_routes<S: EntityStore + ?Sized>(body_limit: usize) -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/:cell/:box_name/:collection/$batch", post(batch::<S>))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
}

fn probe_routes<S: EntityStore + ?Sized>(timeout: Duration) -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check::<S>))
        .layer(TimeoutLayer::new(timeout))
}

/// Creates the HTTP router with the default limits.
pub fn create_router<S: EntityStore + ?Sized>(state: AppState<S>) -> Router {
    create_router_with_body_limit(state, DEFAULT_BODY_LIMIT)
}

/// Creates the HTTP router with a custom body size limit.
pub fn create_router_with_body_limit<S: EntityStore + ?Sized>(
    state: AppState<S>,
    body_limit: usize,
) -> Router {
    let limits = RouterLimits {
        body_limit,
        ..Default::default()
    };
    create_router_with_limits(state, limits)
}

/// Creates the HTTP router with custom limits and no observability.
pub fn create_router_with_limits<S: EntityStore + ?Sized>(
    state: AppState<S>,
    limits: RouterLimits,
) -> Router {
    batch_routes::<S>(limits.body_limit)
        .merge(probe_routes::<S>(limits.probe_timeout))
        .with_state(Arc::new(state))
}

/// Creates the HTTP router with observability endpoints and middleware.
///
/// This includes the batch and probe routes plus the metrics endpoint
/// (`/metrics` unless [`MetricsState::with_path`] says otherwise), wrapped in the
/// request id, metrics, tracing and logging layers.
pub fn create_router_with_observability<S: EntityStore + ?Sized>(
    state: AppState<S>,
    metrics_state: MetricsState,
) -> Router {
    create_router_with_observability_and_limit(state, metrics_state, RouterLimits::default())
}

/// Creates the HTTP router with observability endpoints and custom limits.
pub fn create_router_with_observability_and_limit<S: EntityStore + ?Sized>(
    state: AppState<S>,
    metrics_state: MetricsState,
    limits: RouterLimits,
) -> Router {
    let api_router = create_router_with_limits(state, limits);

    let request_metrics = metrics_state.request_metrics();
    let metrics_path = metrics_state.path().to_string();
    let observability_router = Router::new()
        .route(&metrics_path, get(metrics_handler))
        .with_state(metrics_state);

    // Layers are applied bottom-to-top: last .layer() is outermost
    api_router
        .merge(observability_router)
        .layer(RequestLoggingLayer::new())
        .layer(TracingLayer::new())
        .layer(MetricsLayer::new(request_metrics))
        .layer(RequestIdLayer::new())
}

// ============================================================
// Error Handling
// ============================================================

/// Top-level error codes: the whole-batch rejections of the batch engine.
pub mod error_codes {
    pub use obatch_domain::codes::{
        BATCH_BODY_FORMAT_CHANGESET_NEST_ERROR, BATCH_BODY_FORMAT_HEADER_ERROR,
        BATCH_BODY_FORMAT_METHOD_ERROR, BATCH_BODY_FORMAT_PATH_ERROR, BATCH_BODY_PARSE_ERROR,
    };
    pub use obatch_server::handlers::batch::error_codes::{
        BATCH_TOTAL_TOP_COUNT_LIMITATION_EXCEEDED, TOO_MANY_REQUESTS,
    };
}

/// Top-level error response.
///
/// Serialized as `{"code": ..., "message": {"lang": "en", "value": ...}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        use error_codes::*;

        match self.code.as_str() {
            BATCH_BODY_PARSE_ERROR
            | BATCH_BODY_FORMAT_HEADER_ERROR
            | BATCH_BODY_FORMAT_CHANGESET_NEST_ERROR
            | BATCH_BODY_FORMAT_PATH_ERROR
            | BATCH_BODY_FORMAT_METHOD_ERROR
            | TOO_MANY_REQUESTS
            | BATCH_TOTAL_TOP_COUNT_LIMITATION_EXCEEDED => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(DATA_SERVICE_VERSION_HEADER, DATA_SERVICE_VERSION)],
            Json(error_envelope(&self.code, &self.message)),
        )
            .into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::new(err.code(), err.to_string())
    }
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        ApiError::new(err.code(), err.to_string())
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================
// Health and Readiness Checks
// ============================================================

/// Basic health check - returns 200 if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Readiness check - returns 200 when the storage backend reports healthy.
///
/// Error details are logged but not exposed in the response.
async fn readiness_check<S: EntityStore + ?Sized>(
    State(state): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    match state.storage.health_check().await {
        Ok(status) if status.healthy => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "checks": { "storage": "ok" }
            })),
        ),
        Ok(status) => {
            warn!(message = ?status.message, "readiness check failed: storage unhealthy");
            not_ready()
        }
        Err(e) => {
            error!(error = %e, "readiness check failed: storage unavailable");
            not_ready()
        }
    }
}

fn not_ready() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({
            "status": "not_ready",
            "checks": { "storage": "unavailable" }
        })),
    )
}

// ============================================================
// Batch
// ============================================================

/// `POST /{cell}/{box}/{collection}/$batch`
///
/// Answers 202 with the multipart response once the batch is admitted, or
/// 400 with a single error envelope when nothing was executed.
async fn batch<S: EntityStore + ?Sized>(
    State(state): State<Arc<AppState<S>>>,
    Path((cell, box_name, collection)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let boundary = boundary_from_content_type(content_type)?;
    let body = String::from_utf8(body.to_vec()).map_err(|_| DomainError::BodyParse)?;

    let request = BatchRequest::new(format!("{cell}/{box_name}/{collection}"), boundary, body);
    let response = state.batch_handler.process(request).await?;

    Ok((
        StatusCode::ACCEPTED,
        [
            ("Content-Type", response.content_type()),
            (DATA_SERVICE_VERSION_HEADER, DATA_SERVICE_VERSION.to_string()),
        ],
        response.body,
    )
        .into_response())
}
