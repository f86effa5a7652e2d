//! Data types for batch operations.

use obatch_domain::model::{HttpMethod, QueryLimits};
use obatch_domain::{DomainError, RequestPart};
use obatch_storage::{StorageError, StoreResponse};
use serde_json::json;

/// Wire codes for per-part and whole-batch outcomes raised by the engine.
pub mod error_codes {
    // Whole batch
    pub const TOO_MANY_REQUESTS: &str = "too_many_requests";
    pub const BATCH_TOTAL_TOP_COUNT_LIMITATION_EXCEEDED: &str =
        "batch_total_top_count_limitation_exceeded";

    // Admission
    pub const TOO_MANY_CONCURRENT_REQUESTS: &str = "too_many_concurrent_requests";
    pub const READ_DELETE_ONLY: &str = "read_delete_only";

    // Routing
    pub const KEY_FOR_NAVPROP_SHOULD_NOT_BE_SPECIFIED: &str =
        "key_for_navprop_should_not_be_specified";
    pub const METHOD_NOT_IMPLEMENTED: &str = "method_not_implemented";

    // Store outcomes
    pub const NO_SUCH_COLLECTION: &str = "no_such_collection";
    pub const NO_SUCH_ENTITY_SET: &str = "no_such_entity_set";
    pub const NO_SUCH_ENTITY: &str = "no_such_entity";
    pub const NO_SUCH_NAVIGATION_PROPERTY: &str = "no_such_navigation_property";
    pub const NO_SUCH_ASSOCIATION: &str = "no_such_association";
    pub const ENTITY_ALREADY_EXISTS: &str = "entity_already_exists";
    pub const CONFLICT_LINKS: &str = "conflict_links";
    pub const LINK_UPPER_LIMIT_RECORD_EXCEEDED: &str = "link_upper_limit_record_exceeded";
    pub const PRECONDITION_FAILED: &str = "precondition_failed";
    pub const SERVER_ERROR: &str = "server_error";
}

/// Limits applied by the batch engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    /// Maximum parts per envelope.
    pub max_parts: usize,
    /// Maximum sum of `$top` over the GET parts of one envelope.
    pub top_sum_max: u64,
    /// Maximum links per (source type, source key, target type).
    pub link_max_per_triple: u64,
    /// Only GET and DELETE are accepted.
    pub read_delete_only: bool,
    /// Per-part query option bounds.
    pub query: QueryLimits,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_parts: 1000,
            top_sum_max: 10_000,
            link_max_per_triple: 10_000,
            read_delete_only: false,
            query: QueryLimits::default(),
        }
    }
}

/// One `$batch` call.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Collection scope, `cell/box/collection`.
    pub collection: String,
    /// Outer boundary from the ingress `Content-Type`.
    pub boundary: String,
    pub body: String,
}

impl BatchRequest {
    pub fn new(
        collection: impl Into<String>,
        boundary: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            boundary: boundary.into(),
            body: body.into(),
        }
    }
}

/// Assembled response of an admitted batch.
#[derive(Debug, Clone)]
pub struct BatchResponse {
    pub boundary: String,
    /// Per-part outcomes in request order.
    pub parts: Vec<PartResult>,
    /// Multipart body.
    pub body: String,
}

impl BatchResponse {
    /// `Content-Type` of the response. The boundary is quoted when it is not
    /// a plain MIME token.
    pub fn content_type(&self) -> String {
        if is_token(&self.boundary) {
            format!("multipart/mixed; boundary={}", self.boundary)
        } else {
            let escaped = self.boundary.replace('\\', "\\\\").replace('"', "\\\"");
            format!("multipart/mixed; boundary=\"{escaped}\"")
        }
    }
}

fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?=".contains(&b))
}

/// Classification of a failed part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartErrorKind {
    NotFound,
    Conflict,
    BadRequest,
    PreconditionFailed,
    MethodNotImplemented,
    /// Refused by the admission shutter.
    ShutterRejected,
    /// The store reported saturation.
    TooManyConcurrentRequests,
    ReadDeleteOnly,
    Internal,
}

impl PartErrorKind {
    pub fn status(&self) -> u16 {
        match self {
            PartErrorKind::NotFound => 404,
            PartErrorKind::Conflict => 409,
            PartErrorKind::BadRequest => 400,
            PartErrorKind::PreconditionFailed => 412,
            PartErrorKind::MethodNotImplemented => 501,
            PartErrorKind::ShutterRejected
            | PartErrorKind::TooManyConcurrentRequests
            | PartErrorKind::ReadDeleteOnly => 503,
            PartErrorKind::Internal => 500,
        }
    }
}

/// A failed part: kind, wire code and message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct PartError {
    pub kind: PartErrorKind,
    pub code: &'static str,
    pub message: String,
}

impl PartError {
    pub fn new(kind: PartErrorKind, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.kind.status()
    }

    /// `{"code": ..., "message": {"lang": "en", "value": ...}}`
    pub fn envelope(&self) -> serde_json::Value {
        error_envelope(self.code, &self.message)
    }
}

/// JSON error body shared by per-part and top-level errors.
pub fn error_envelope(code: &str, message: &str) -> serde_json::Value {
    json!({
        "code": code,
        "message": { "lang": "en", "value": message },
    })
}

impl From<DomainError> for PartError {
    fn from(err: DomainError) -> Self {
        PartError::new(PartErrorKind::BadRequest, err.code(), err.to_string())
    }
}

impl From<StorageError> for PartError {
    fn from(err: StorageError) -> Self {
        use error_codes::*;
        let message = err.to_string();
        let (kind, code) = match &err {
            StorageError::CollectionNotFound { .. } => {
                (PartErrorKind::NotFound, NO_SUCH_COLLECTION)
            }
            StorageError::EntitySetNotFound { .. } => (PartErrorKind::NotFound, NO_SUCH_ENTITY_SET),
            StorageError::EntityNotFound { .. } => (PartErrorKind::NotFound, NO_SUCH_ENTITY),
            StorageError::AssociationNotFound { .. } => {
                (PartErrorKind::BadRequest, NO_SUCH_ASSOCIATION)
            }
            StorageError::EntityAlreadyExists { .. } => {
                (PartErrorKind::Conflict, ENTITY_ALREADY_EXISTS)
            }
            StorageError::LinkConflict { .. } => (PartErrorKind::Conflict, CONFLICT_LINKS),
            StorageError::PreconditionFailed { .. } => {
                (PartErrorKind::PreconditionFailed, PRECONDITION_FAILED)
            }
            StorageError::UnsupportedOperation { .. } => {
                (PartErrorKind::MethodNotImplemented, METHOD_NOT_IMPLEMENTED)
            }
            StorageError::Domain(domain) => return PartError::from(domain.clone()),
            StorageError::TooManyConcurrentRequests { .. } => (
                PartErrorKind::TooManyConcurrentRequests,
                TOO_MANY_CONCURRENT_REQUESTS,
            ),
            StorageError::SchemaError { .. }
            | StorageError::ConnectionError { .. }
            | StorageError::InternalError { .. } => (PartErrorKind::Internal, SERVER_ERROR),
        };
        PartError::new(kind, code, message)
    }
}

/// Outcome of one part, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartResult {
    pub index: usize,
    pub method: HttpMethod,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// Set when the part failed.
    pub error: Option<PartErrorKind>,
    /// Client changeset boundary the part was declared in.
    pub changeset: Option<String>,
}

impl PartResult {
    pub fn success(part: &RequestPart, response: StoreResponse) -> Self {
        Self {
            index: part.index,
            method: part.method,
            status: response.status,
            headers: response.headers,
            body: response.body,
            error: None,
            changeset: part.changeset.clone(),
        }
    }

    pub fn failure(part: &RequestPart, error: &PartError) -> Self {
        Self {
            index: part.index,
            method: part.method,
            status: error.status(),
            headers: vec![(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )],
            body: Some(error.envelope().to_string()),
            error: Some(error.kind),
            changeset: part.changeset.clone(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// `"2xx"`, `"4xx"` or `"5xx"`.
    pub fn status_class(&self) -> &'static str {
        match self.status {
            200..=299 => "2xx",
            400..=499 => "4xx",
            500..=599 => "5xx",
            _ => "other",
        }
    }
}

/// Whole-batch rejections. Nothing is executed when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    /// The envelope is not well-formed.
    #[error(transparent)]
    Structural(#[from] DomainError),

    /// More parts than allowed.
    #[error("batch has {count} parts, maximum is {max}")]
    TooManyParts { count: usize, max: usize },

    /// The `$top` values of the GET parts add up to more than allowed.
    #[error("total $top of the batch is {sum}, maximum is {max}")]
    AggregateTopExceeded { sum: u64, max: u64 },
}

impl BatchError {
    pub fn code(&self) -> &'static str {
        match self {
            BatchError::Structural(err) => err.code(),
            BatchError::TooManyParts { .. } => error_codes::TOO_MANY_REQUESTS,
            BatchError::AggregateTopExceeded { .. } => {
                error_codes::BATCH_TOTAL_TOP_COUNT_LIMITATION_EXCEEDED
            }
        }
    }

    pub fn envelope(&self) -> serde_json::Value {
        error_envelope(self.code(), &self.to_string())
    }
}

/// Result type for batch operations.
pub type BatchResult<T> = Result<T, BatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn response(boundary: &str) -> BatchResponse {
        BatchResponse {
            boundary: boundary.to_string(),
            parts: Vec::new(),
            body: String::new(),
        }
    }

    /// Test: a token boundary is written bare
    #[test]
    fn test_token_boundary_is_not_quoted() {
        assert_eq!(
            response("batch_36522ad7-fc75-4b56-8c71-56071383e77b").content_type(),
            "multipart/mixed; boundary=batch_36522ad7-fc75-4b56-8c71-56071383e77b"
        );
    }

    /// Test: a boundary with a space is quoted
    #[test]
    fn test_boundary_with_space_is_quoted() {
        assert_eq!(
            response("batch 1").content_type(),
            "multipart/mixed; boundary=\"batch 1\""
        );
    }

    /// Test: tspecials force quoting
    #[test]
    fn test_boundary_with_tspecials_is_quoted() {
        assert_eq!(
            response("a:b=c").content_type(),
            "multipart/mixed; boundary=\"a:b=c\""
        );
    }
}
