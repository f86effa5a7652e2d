//! EntityStore trait definition.

use std::time::Duration;

use async_trait::async_trait;
use obatch_domain::model::{
    EntityRef, HttpMethod, Multiplicity, QueryFacet, QueryOptions, ResourcePath,
};
use obatch_domain::RequestPart;

use crate::error::StorageResult;

/// Protocol version advertised on every response.
pub const DATA_SERVICE_VERSION: &str = "2.0";

/// One sub-request as handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRequest {
    pub method: HttpMethod,
    pub path: ResourcePath,
    pub uri: String,
    pub query: QueryOptions,
    /// Validated query options; set for reads.
    pub facet: Option<QueryFacet>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StoreRequest {
    /// Attaches validated query options.
    pub fn with_facet(mut self, facet: QueryFacet) -> Self {
        self.facet = Some(facet);
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl From<&RequestPart> for StoreRequest {
    fn from(part: &RequestPart) -> Self {
        Self {
            method: part.method,
            path: part.path.clone(),
            uri: part.uri.clone(),
            query: part.query.clone(),
            facet: None,
            headers: part.headers.clone(),
            body: part.body.clone(),
        }
    }
}

/// Successful outcome of a store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl StoreResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: vec![(
                "DataServiceVersion".to_string(),
                DATA_SERVICE_VERSION.to_string(),
            )],
            body: None,
        }
    }

    /// 204 with no body.
    pub fn no_content() -> Self {
        Self::new(204)
    }

    /// JSON response with the given status.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status)
            .with_header("Content-Type", "application/json")
            .with_body(body.to_string())
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Health check status.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub latency: Duration,
    pub message: Option<String>,
}

/// Abstract entity store consumed by the batch engine.
///
/// Implementations must be thread-safe (Send + Sync). Each call is an
/// independent unit of commit; the engine never asks for rollback.
#[async_trait]
pub trait EntityStore: Send + Sync + 'static {
    /// Executes one sub-request against `collection`.
    async fn execute(&self, collection: &str, request: &StoreRequest)
        -> StorageResult<StoreResponse>;

    /// Number of links from `source` to entities of `target_type`.
    async fn current_link_count(
        &self,
        collection: &str,
        source: &EntityRef,
        target_type: &str,
    ) -> StorageResult<u64>;

    /// Multiplicity of the `target_type` end of the association seen from
    /// `source_type`, i.e. how many targets one source may link to.
    async fn association_multiplicity(
        &self,
        collection: &str,
        source_type: &str,
        target_type: &str,
    ) -> StorageResult<Multiplicity>;

    /// Checks whether the backend can serve requests.
    async fn health_check(&self) -> StorageResult<HealthStatus>;
}
