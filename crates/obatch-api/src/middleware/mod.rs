//! HTTP middleware.
//!
//! Every request passes, outermost first, through:
//! - request id assignment ([`RequestIdLayer`])
//! - request metrics ([`MetricsLayer`])
//! - a tracing span ([`TracingLayer`])
//! - access logging ([`RequestLoggingLayer`])

mod logging;
mod metrics;
mod request_id;
mod tracing_layer;

pub use logging::RequestLoggingLayer;
pub use metrics::{MetricsLayer, RequestMetrics};
pub use request_id::{RequestId, RequestIdLayer, REQUEST_ID_HEADER};
pub use tracing_layer::TracingLayer;

#[cfg(test)]
mod tests;
