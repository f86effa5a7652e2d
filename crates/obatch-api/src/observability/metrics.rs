//! Prometheus metrics.
//!
//! The recorder is installed once per process by [`init_metrics`]. Metrics
//! recorded before that go to the no-op recorder of the `metrics` facade.

use std::sync::Arc;

use axum::{extract::State, http::header::CONTENT_TYPE, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::middleware::RequestMetrics;

/// Default path of the exposition endpoint.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// State of the `/metrics` route.
///
/// Also carries the request counters fed by the HTTP metrics layer.
#[derive(Clone)]
pub struct MetricsState {
    handle: Arc<PrometheusHandle>,
    requests: Arc<RequestMetrics>,
    path: String,
}

impl MetricsState {
    pub fn new(handle: PrometheusHandle) -> Self {
        Self {
            handle: Arc::new(handle),
            requests: RequestMetrics::new_shared(),
            path: DEFAULT_METRICS_PATH.to_string(),
        }
    }

    /// Serves the exposition on `path` instead of `/metrics`.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn request_metrics(&self) -> Arc<RequestMetrics> {
        Arc::clone(&self.requests)
    }

    /// Renders the current metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to install Prometheus recorder: recorder already installed")]
    AlreadyInstalled,
}

/// Installs the global Prometheus recorder and describes the service metrics.
///
/// # Errors
///
/// Returns an error if a recorder is already installed.
pub fn init_metrics() -> Result<MetricsState, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|_| MetricsError::AlreadyInstalled)?;

    describe_metrics();

    Ok(MetricsState::new(handle))
}

fn describe_metrics() {
    metrics::describe_counter!("obatch_http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "obatch_http_request_duration_seconds",
        metrics::Unit::Seconds,
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "obatch_batch_requests_total",
        "Batch requests by outcome (accepted, rejected)"
    );
    metrics::describe_counter!(
        "obatch_batch_parts_total",
        "Executed batch parts by response status class"
    );
    metrics::describe_histogram!(
        "obatch_batch_duration_seconds",
        metrics::Unit::Seconds,
        "Time to execute and assemble one accepted batch"
    );
    metrics::describe_counter!(
        "obatch_shutter_trips_total",
        "Times the admission shutter switched to read-only"
    );
}

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Handler for the metrics endpoint.
pub async fn metrics_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    ([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], state.render())
}
