//! obatch-storage: Entity store abstraction
//!
//! This crate provides the store seam consumed by the batch engine:
//! - EntityStore trait (execute, live link count, association multiplicity)
//! - Collection schema definitions
//! - In-memory implementation for the binary and tests
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               obatch-storage                 │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs  - EntityStore trait definition  │
//! │  schema.rs  - Entity types & associations   │
//! │  memory.rs  - In-memory implementation      │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod schema;
pub mod traits;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use memory::MemoryEntityStore;
pub use schema::{AssociationSchema, CollectionSchema, SchemaFile};
pub use traits::{EntityStore, HealthStatus, StoreRequest, StoreResponse, DATA_SERVICE_VERSION};
