//! Storage error types.

use obatch_domain::DomainError;
use thiserror::Error;

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Collection (cell/box/collection scope) not found.
    #[error("collection not found: {collection}")]
    CollectionNotFound { collection: String },

    /// Entity set not declared in the collection schema.
    #[error("entity set not found: {entity_set}")]
    EntitySetNotFound { entity_set: String },

    /// Entity not found.
    #[error("entity not found: {entity_set}('{key}')")]
    EntityNotFound { entity_set: String, key: String },

    /// No association between the two entity types.
    #[error("no association between {source_type} and {target_type}")]
    AssociationNotFound {
        source_type: String,
        target_type: String,
    },

    /// Entity with the same key already exists.
    #[error("entity already exists: {entity_set}('{key}')")]
    EntityAlreadyExists { entity_set: String, key: String },

    /// Link would violate a single-valued association end, or already exists.
    #[error("link conflict: {message}")]
    LinkConflict { message: String },

    /// `If-Match` did not match the current entity tag.
    #[error("precondition failed for {entity_set}('{key}')")]
    PreconditionFailed { entity_set: String, key: String },

    /// Operation not supported on this kind of resource.
    #[error("unsupported operation: {message}")]
    UnsupportedOperation { message: String },

    /// Request body or query could not be interpreted.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Backend is saturated and refuses new work.
    #[error("too many concurrent requests: {message}")]
    TooManyConcurrentRequests { message: String },

    /// Schema file could not be loaded.
    #[error("schema error: {message}")]
    SchemaError { message: String },

    /// Backend connection error.
    #[error("storage connection error: {message}")]
    ConnectionError { message: String },

    /// Internal error.
    #[error("internal storage error: {message}")]
    InternalError { message: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
