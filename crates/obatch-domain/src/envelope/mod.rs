//! Batch envelope: the multipart body of a `$batch` request.
//!
//! The parser turns a raw body into an ordered list of [`RequestPart`]s or a
//! single structural [`DomainError`](crate::DomainError) that rejects the
//! whole envelope.

mod parser;
#[cfg(test)]
mod parser_proptest;

pub use parser::{boundary_from_content_type, parse_envelope};

use crate::model::{HttpMethod, QueryOptions, ResourcePath};

/// One parsed batch request.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Boundary token taken from the ingress `Content-Type`.
    pub boundary: String,
    /// Sub-requests in source order, changeset members flattened in place.
    pub parts: Vec<RequestPart>,
}

impl Envelope {
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// One logical sub-request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPart {
    /// Zero-based position in the envelope.
    pub index: usize,
    pub method: HttpMethod,
    /// Request target exactly as written, query string included.
    pub uri: String,
    pub path: ResourcePath,
    pub query: QueryOptions,
    /// Request headers in source order.
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// One-based line of the request line within the envelope body.
    pub line: usize,
    /// Boundary of the client changeset this part was declared in, if any.
    pub changeset: Option<String>,
}

impl RequestPart {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The request line as it would appear on the wire.
    pub fn request_line(&self) -> String {
        format!("{} {} HTTP/1.1", self.method, self.uri)
    }

    pub fn is_read_only(&self) -> bool {
        self.method.is_read_only()
    }
}
