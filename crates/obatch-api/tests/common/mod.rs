//! Shared helpers for the obatch API integration tests.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use obatch_domain::model::Multiplicity;
use obatch_storage::{CollectionSchema, MemoryEntityStore};
use tower::ServiceExt;

/// Collection addressed by [`BATCH_URI`].
pub const COLLECTION: &str = "cell/box/col";
pub const BATCH_URI: &str = "/cell/box/col/$batch";
pub const BOUNDARY: &str = "batch_36522ad7-fc75-4b56-8c71-56071383e77b";

/// Memory store with the sales schema used across the suites.
///
/// Sales 1 -> * SalesDetail, Customer 1 -> * SalesDetail,
/// Sales 0..1 -> 1 Product.
pub fn sales_store() -> Arc<MemoryEntityStore> {
    let store = MemoryEntityStore::new_shared();
    store
        .create_collection(
            COLLECTION,
            CollectionSchema::new()
                .with_entity_type("Sales")
                .with_entity_type("SalesDetail")
                .with_entity_type("Product")
                .with_entity_type("Customer")
                .with_association("Sales", Multiplicity::One, "SalesDetail", Multiplicity::Many)
                .with_association("Customer", Multiplicity::One, "SalesDetail", Multiplicity::Many)
                .with_association("Sales", Multiplicity::ZeroOrOne, "Product", Multiplicity::One),
        )
        .expect("sales collection");
    store
}

/// One sub-request wrapped as an `application/http` part.
pub fn part(request: &str) -> String {
    format!(
        "--{BOUNDARY}\r\nContent-Type: application/http\r\nContent-Transfer-Encoding: binary\r\n\r\n{request}\r\n\r\n"
    )
}

/// Sub-requests wrapped in one changeset part.
pub fn changeset(name: &str, requests: &[String]) -> String {
    let mut out =
        format!("--{BOUNDARY}\r\nContent-Type: multipart/mixed; boundary={name}\r\n\r\n");
    for request in requests {
        out.push_str(&format!(
            "--{name}\r\nContent-Type: application/http\r\nContent-Transfer-Encoding: binary\r\n\r\n{request}\r\n\r\n"
        ));
    }
    out.push_str(&format!("--{name}--\r\n"));
    out
}

pub fn envelope(segments: &[String]) -> String {
    let mut body = segments.concat();
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

pub fn envelope_of(requests: &[String]) -> String {
    let segments: Vec<String> = requests.iter().map(|r| part(r)).collect();
    envelope(&segments)
}

pub fn get(uri: &str) -> String {
    format!("GET {uri} HTTP/1.1\r\nAccept: application/json")
}

pub fn post(uri: &str, body: &str) -> String {
    format!("POST {uri} HTTP/1.1\r\nContent-Type: application/json\r\n\r\n{body}")
}

pub fn delete(uri: &str) -> String {
    format!("DELETE {uri} HTTP/1.1")
}

/// Batch response split into its parts.
pub struct BatchReply {
    pub status: StatusCode,
    pub content_type: String,
    pub body: String,
}

impl BatchReply {
    /// Status codes of the inner responses, in order.
    pub fn statuses(&self) -> Vec<u16> {
        self.body
            .lines()
            .filter_map(|line| line.strip_prefix("HTTP/1.1 "))
            .filter_map(|rest| rest.split(' ').next())
            .filter_map(|code| code.parse().ok())
            .collect()
    }

    /// JSON bodies of the inner responses that carry one.
    pub fn json_bodies(&self) -> Vec<serde_json::Value> {
        self.body
            .lines()
            .filter(|line| line.starts_with('{'))
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

pub async fn send_batch(app: &Router, body: String) -> BatchReply {
    let request = Request::builder()
        .method("POST")
        .uri(BATCH_URI)
        .header("Content-Type", format!("multipart/mixed; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");

    let status = response.status();
    let content_type = response
        .headers()
        .get("Content-Type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");

    BatchReply {
        status,
        content_type,
        body: String::from_utf8(bytes.to_vec()).expect("utf-8 body"),
    }
}
