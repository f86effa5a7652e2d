//! obatch-server: Batch processing core
//!
//! This crate contains the business logic behind `$batch`:
//! - Envelope admission (structural parse, part count, aggregate `$top`)
//! - Admission shutter shedding writes once the store saturates
//! - Link cardinality guard
//! - Ordered part dispatcher and multipart response assembly
//! - Configuration management
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               obatch-server                  │
//! ├─────────────────────────────────────────────┤
//! │  config.rs   - Configuration management     │
//! │  handlers/   - Request handlers             │
//! │    batch/handler.rs    - Dispatcher         │
//! │    batch/shutter.rs    - Admission shutter  │
//! │    batch/quota.rs      - Whole-batch limits │
//! │    batch/link_guard.rs - Link cardinality   │
//! │    batch/assembler.rs  - Response body      │
//! └─────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod handlers;

// Re-exports for convenience
pub use config::{ConfigLoadError, ServerConfig};
pub use handlers::batch::{
    AdmissionShutter, BatchError, BatchHandler, BatchLimits, BatchRequest, BatchResponse,
    BatchResult, PartResult,
};
