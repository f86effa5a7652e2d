//! obatch-domain: Batch envelope protocol logic
//!
//! This crate contains the synchronous, storage-independent parts of
//! `$batch` processing:
//! - Sub-request model (methods, resource paths, query options, bodies)
//! - Envelope parsing and structural validation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                obatch-domain                 │
//! ├─────────────────────────────────────────────┤
//! │  model/     - Paths, query facet, bodies    │
//! │  envelope/  - Multipart batch parser        │
//! │  error      - Structural & per-part errors  │
//! └─────────────────────────────────────────────┘
//! ```

pub mod envelope;
pub mod error;
pub mod model;

// Re-export commonly used types at the crate root
pub use envelope::{boundary_from_content_type, parse_envelope, Envelope, RequestPart};
pub use error::{codes, DomainError, DomainResult};
