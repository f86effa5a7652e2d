//! Observability for the batch service.
//!
//! - Prometheus exposition on `/metrics`
//! - Structured logging setup

mod logging;
mod metrics;

pub use logging::{create_json_layer, init_logging, LoggingConfig};
pub use metrics::{init_metrics, metrics_handler, MetricsError, MetricsState};
