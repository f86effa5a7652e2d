//! End-to-end `$batch` behaviour through the HTTP router.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use common::*;
use obatch_api::http::{create_router, error_codes, AppState};
use obatch_domain::codes;
use obatch_domain::model::{EntityRef, HttpMethod, Multiplicity};
use obatch_server::BatchLimits;
use obatch_storage::{
    EntityStore, HealthStatus, MemoryEntityStore, StorageError, StorageResult, StoreRequest,
    StoreResponse,
};

fn app_with(store: Arc<MemoryEntityStore>, limits: BatchLimits) -> axum::Router {
    create_router(AppState::with_limits(store, limits))
}

fn error_code(value: &serde_json::Value) -> &str {
    value["code"].as_str().unwrap_or_default()
}

/// Memory store that reports saturation for every write to `Customer`.
struct SaturatedCustomers {
    inner: Arc<MemoryEntityStore>,
}

#[async_trait]
impl EntityStore for SaturatedCustomers {
    async fn execute(&self, collection: &str, request: &StoreRequest) -> StorageResult<StoreResponse> {
        if request.method != HttpMethod::Get && request.path.entity_set() == "Customer" {
            return Err(StorageError::TooManyConcurrentRequests {
                message: "customer writer pool exhausted".to_string(),
            });
        }
        self.inner.execute(collection, request).await
    }

    async fn current_link_count(
        &self,
        collection: &str,
        source: &EntityRef,
        target_type: &str,
    ) -> StorageResult<u64> {
        self.inner
            .current_link_count(collection, source, target_type)
            .await
    }

    async fn association_multiplicity(
        &self,
        collection: &str,
        source_type: &str,
        target_type: &str,
    ) -> StorageResult<Multiplicity> {
        self.inner
            .association_multiplicity(collection, source_type, target_type)
            .await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.inner.health_check().await
    }
}

// ============================================================
// Ordering and isolation
// ============================================================

/// Test: Results come back in source order
#[tokio::test]
async fn test_results_follow_source_order() {
    let app = create_router(AppState::new(sales_store()));

    let mut requests: Vec<String> = (0..5)
        .map(|i| post("Sales", &format!(r#"{{"__id":"s{i}"}}"#)))
        .collect();
    requests.extend((0..5).rev().map(|i| get(&format!("Sales('s{i}')"))));

    let reply = send_batch(&app, envelope_of(&requests)).await;

    assert_eq!(reply.status, StatusCode::ACCEPTED);
    assert_eq!(
        reply.statuses(),
        vec![201, 201, 201, 201, 201, 200, 200, 200, 200, 200]
    );
    let ids: Vec<String> = reply
        .json_bodies()
        .iter()
        .map(|b| b["d"]["results"]["__id"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        ids,
        vec!["s0", "s1", "s2", "s3", "s4", "s4", "s3", "s2", "s1", "s0"]
    );
}

/// Test: A failing write keeps earlier writes committed
#[tokio::test]
async fn test_failure_does_not_undo_earlier_writes() {
    let store = sales_store();
    let app = create_router(AppState::new(Arc::clone(&store)));

    let reply = send_batch(
        &app,
        envelope(&[changeset(
            "changeset_1",
            &[
                post("Sales", r#"{"__id":"s1"}"#),
                post("Sales", r#"{"__id":"s1"}"#),
                delete("Sales('missing')"),
            ],
        )]),
    )
    .await;

    assert_eq!(reply.status, StatusCode::ACCEPTED);
    assert_eq!(reply.statuses(), vec![201, 409, 404]);
    assert!(store.contains_entity(COLLECTION, "Sales", "s1"));
}

/// Test: Client changeset boundary is reused for every mutating part
#[tokio::test]
async fn test_changeset_boundary_reused() {
    let app = create_router(AppState::new(sales_store()));

    let reply = send_batch(
        &app,
        envelope(&[changeset(
            "changeset_abc",
            &[post("Sales", r#"{"__id":"a"}"#), post("Sales", r#"{"__id":"b"}"#)],
        )]),
    )
    .await;

    assert_eq!(reply.statuses(), vec![201, 201]);
    assert_eq!(reply.body.matches("--changeset_abc--").count(), 2);
    assert_eq!(
        reply.content_type,
        format!("multipart/mixed; boundary={BOUNDARY}")
    );
}

// ============================================================
// Whole-batch rejection
// ============================================================

/// Test: One malformed request line rejects every part
#[tokio::test]
async fn test_malformed_request_line_runs_nothing() {
    let store = sales_store();
    let app = create_router(AppState::new(Arc::clone(&store)));

    let reply = send_batch(
        &app,
        envelope_of(&[
            post("Sales", r#"{"__id":"s1"}"#),
            get("Sales('s1')/"),
            post("Sales", r#"{"__id":"s2"}"#),
        ]),
    )
    .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(error_code(&json), error_codes::BATCH_BODY_FORMAT_PATH_ERROR);
    assert!(json["message"]["value"]
        .as_str()
        .unwrap_or_default()
        .contains("GET Sales('s1')/ HTTP/1.1"));
    assert!(!store.contains_entity(COLLECTION, "Sales", "s1"));
    assert!(!store.contains_entity(COLLECTION, "Sales", "s2"));
}

/// Test: Aggregate $top at the ceiling passes, one over rejects everything
#[tokio::test]
async fn test_aggregate_top_ceiling() {
    let limits = BatchLimits {
        top_sum_max: 100,
        ..Default::default()
    };
    let app = app_with(sales_store(), limits);

    let reply = send_batch(
        &app,
        envelope_of(&[get("Sales?$top=50"), get("Product?$top=50")]),
    )
    .await;
    assert_eq!(reply.status, StatusCode::ACCEPTED);
    assert_eq!(reply.statuses(), vec![200, 200]);

    let reply = send_batch(
        &app,
        envelope_of(&[get("Sales?$top=51"), get("Product?$top=50")]),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(
        error_code(&json),
        error_codes::BATCH_TOTAL_TOP_COUNT_LIMITATION_EXCEEDED
    );
}

/// Test: A bad $top inside one part is a per-part error
#[tokio::test]
async fn test_negative_top_is_a_part_error() {
    let app = create_router(AppState::new(sales_store()));

    let reply = send_batch(&app, envelope_of(&[get("Sales?$top=-1"), get("Sales")])).await;

    assert_eq!(reply.status, StatusCode::ACCEPTED);
    assert_eq!(reply.statuses(), vec![400, 200]);
    assert_eq!(
        error_code(&reply.json_bodies()[0]),
        codes::QUERY_INVALID_ERROR
    );
}

// ============================================================
// Admission shutter
// ============================================================

/// Test: Saturation blocks later writes, in this batch and the next
#[tokio::test]
async fn test_saturation_blocks_later_writes() {
    let inner = sales_store();
    let store = Arc::new(SaturatedCustomers {
        inner: Arc::clone(&inner),
    });
    let app = create_router(AppState::new(store));

    let reply = send_batch(
        &app,
        envelope_of(&[
            post("Sales", r#"{"__id":"before"}"#),
            post("Customer", r#"{"__id":"c1"}"#),
            post("Sales", r#"{"__id":"after"}"#),
            get("Sales"),
        ]),
    )
    .await;
    assert_eq!(reply.statuses(), vec![201, 503, 503, 200]);
    assert!(inner.contains_entity(COLLECTION, "Sales", "before"));
    assert!(!inner.contains_entity(COLLECTION, "Sales", "after"));

    let reply = send_batch(
        &app,
        envelope_of(&[delete("Sales('before')"), get("Sales('before')")]),
    )
    .await;
    assert_eq!(reply.statuses(), vec![503, 200]);
    assert_eq!(
        error_code(&reply.json_bodies()[0]),
        obatch_server::handlers::batch::error_codes::TOO_MANY_CONCURRENT_REQUESTS
    );
}

// ============================================================
// Navigation properties and links
// ============================================================

/// Test: Entity created through a navigation property is linked to its source
#[tokio::test]
async fn test_create_through_navigation_property() {
    let store = sales_store();
    let app = create_router(AppState::new(Arc::clone(&store)));

    let reply = send_batch(
        &app,
        envelope_of(&[
            post("Sales", r#"{"__id":"srcKey"}"#),
            post("Sales('srcKey')/_SalesDetail", r#"{"__id":"npTest1"}"#),
        ]),
    )
    .await;

    assert_eq!(reply.status, StatusCode::ACCEPTED);
    assert_eq!(reply.statuses(), vec![201, 201]);
    let linked = store
        .linked_keys(COLLECTION, &EntityRef::new("Sales", "srcKey"), "SalesDetail")
        .unwrap();
    assert_eq!(linked, vec!["npTest1".to_string()]);
}

/// Test: Second target on a single-valued end conflicts, first stays
#[tokio::test]
async fn test_single_valued_end_conflicts() {
    let store = sales_store();
    let app = create_router(AppState::new(Arc::clone(&store)));

    let reply = send_batch(
        &app,
        envelope_of(&[
            post("Sales", r#"{"__id":"srcKey"}"#),
            post("Sales('srcKey')/_Product", r#"{"__id":"id0001"}"#),
            post("Sales('srcKey')/_Product", r#"{"__id":"id0002"}"#),
        ]),
    )
    .await;

    assert_eq!(reply.statuses(), vec![201, 201, 409]);
    assert!(store.contains_entity(COLLECTION, "Product", "id0001"));
    let linked = store
        .linked_keys(COLLECTION, &EntityRef::new("Sales", "srcKey"), "Product")
        .unwrap();
    assert_eq!(linked, vec!["id0001".to_string()]);
}

/// Test: Exhausting one link ceiling leaves other triples open
#[tokio::test]
async fn test_link_ceiling_per_triple() {
    let limits = BatchLimits {
        link_max_per_triple: 1,
        ..Default::default()
    };
    let app = app_with(sales_store(), limits);

    let reply = send_batch(
        &app,
        envelope_of(&[
            post("Sales", r#"{"__id":"k1"}"#),
            post("Sales", r#"{"__id":"k2"}"#),
            post("Customer", r#"{"__id":"k1"}"#),
            post("Sales('k1')/_SalesDetail", "{}"),
            post("Sales('k1')/_SalesDetail", "{}"),
            post("Sales('k2')/_SalesDetail", "{}"),
            post("Customer('k1')/_SalesDetail", "{}"),
        ]),
    )
    .await;

    assert_eq!(reply.statuses(), vec![201, 201, 201, 201, 400, 201, 201]);
}

/// Test: Reads and deletes on navigation and links paths are not served
#[tokio::test]
async fn test_unserved_navigation_methods() {
    let app = create_router(AppState::new(sales_store()));

    let reply = send_batch(
        &app,
        envelope_of(&[
            get("Sales('k')/_SalesDetail"),
            get("Sales('k')/$links/_SalesDetail"),
            post("Sales('k')/_SalesDetail('d')", "{}"),
        ]),
    )
    .await;

    assert_eq!(reply.statuses(), vec![501, 501, 400]);
}
