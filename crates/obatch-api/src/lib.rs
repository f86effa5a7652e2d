//! obatch-api: HTTP API layer
//!
//! This crate provides the HTTP surface of the batch engine:
//! - `$batch` endpoint via Axum
//! - Health, readiness and Prometheus metrics endpoints
//! - Middleware (request id, logging, metrics, tracing)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 obatch-api                   │
//! ├─────────────────────────────────────────────┤
//! │  http/          - Routes, state, errors     │
//! │  middleware/    - Request id, metrics, logs │
//! │  observability/ - Logging & Prometheus      │
//! └─────────────────────────────────────────────┘
//! ```

pub mod http;
pub mod middleware;
pub mod observability;
