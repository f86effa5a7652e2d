//! Batch handler implementation.

use std::sync::Arc;
use std::time::Instant;

use obatch_domain::model::{HttpMethod, LinkBody, QueryFacet, ResourcePath};
use obatch_domain::{parse_envelope, Envelope, RequestPart};
use obatch_storage::{EntityStore, StoreRequest, StoreResponse};
use tracing::{debug, info, instrument, warn};

use super::assembler::assemble;
use super::link_guard::LinkGuard;
use super::quota::pre_validate;
use super::shutter::AdmissionShutter;
use super::types::{
    error_codes, BatchLimits, BatchRequest, BatchResponse, BatchResult, PartError, PartErrorKind,
    PartResult,
};

/// Handler for `$batch` requests.
///
/// Parses and pre-validates the envelope, then runs every part in source
/// order against the store. Parts never run concurrently within one
/// envelope: later parts observe what earlier parts committed.
pub struct BatchHandler<S: EntityStore + ?Sized> {
    store: Arc<S>,
    shutter: Arc<AdmissionShutter>,
    guard: LinkGuard,
    limits: BatchLimits,
}

impl<S: EntityStore + ?Sized> BatchHandler<S> {
    /// Creates a new batch handler.
    ///
    /// The shutter is shared so that a trip caused by one batch is seen by
    /// every other batch in the process.
    pub fn new(store: Arc<S>, shutter: Arc<AdmissionShutter>, limits: BatchLimits) -> Self {
        Self {
            store,
            shutter,
            guard: LinkGuard::new(limits.link_max_per_triple),
            limits,
        }
    }

    pub fn limits(&self) -> &BatchLimits {
        &self.limits
    }

    pub fn shutter(&self) -> &Arc<AdmissionShutter> {
        &self.shutter
    }

    /// Parses the envelope and applies the whole-batch ceilings.
    ///
    /// Nothing is executed; an error here rejects the batch as a whole.
    pub fn validate(&self, request: &BatchRequest) -> BatchResult<Envelope> {
        let envelope = parse_envelope(&request.boundary, &request.body)?;
        pre_validate(&envelope, &self.limits)?;
        Ok(envelope)
    }

    /// Processes a batch request end to end.
    #[instrument(skip(self, request), fields(collection = %request.collection))]
    pub async fn process(&self, request: BatchRequest) -> BatchResult<BatchResponse> {
        let started = Instant::now();

        let envelope = match self.validate(&request) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(code = err.code(), error = %err, "batch rejected");
                metrics::counter!("obatch_batch_requests_total", "outcome" => "rejected")
                    .increment(1);
                return Err(err);
            }
        };

        let parts = self.execute(&request.collection, &envelope).await;
        let body = assemble(&request.boundary, &parts);

        let failed = parts.iter().filter(|p| !p.is_success()).count();
        for part in &parts {
            metrics::counter!("obatch_batch_parts_total", "status_class" => part.status_class())
                .increment(1);
        }
        metrics::counter!("obatch_batch_requests_total", "outcome" => "accepted").increment(1);
        metrics::histogram!("obatch_batch_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        info!(
            parts = parts.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch processed"
        );

        Ok(BatchResponse {
            boundary: request.boundary,
            parts,
            body,
        })
    }

    /// Runs every part of `envelope` in order.
    ///
    /// The result has exactly one entry per part, in the same order.
    pub async fn execute(&self, collection: &str, envelope: &Envelope) -> Vec<PartResult> {
        let mut results = Vec::with_capacity(envelope.len());
        for part in &envelope.parts {
            let result = match self.execute_part(collection, part).await {
                Ok(response) => PartResult::success(part, response),
                Err(err) => {
                    self.shutter.observe(err.kind);
                    PartResult::failure(part, &err)
                }
            };
            debug!(
                index = part.index,
                method = %part.method,
                path = %part.path,
                status = result.status,
                "part executed"
            );
            results.push(result);
        }
        results
    }

    async fn execute_part(
        &self,
        collection: &str,
        part: &RequestPart,
    ) -> Result<StoreResponse, PartError> {
        if self.limits.read_delete_only && !part.method.is_read_or_delete() {
            return Err(PartError::new(
                PartErrorKind::ReadDeleteOnly,
                error_codes::READ_DELETE_ONLY,
                format!("{} is not accepted in read/delete only mode", part.method),
            ));
        }

        if !self.shutter.accept(part.method) {
            return Err(PartError::new(
                PartErrorKind::ShutterRejected,
                error_codes::TOO_MANY_CONCURRENT_REQUESTS,
                "too many concurrent requests, only GET is accepted",
            ));
        }

        route(part)?;

        let mut request = StoreRequest::from(part);
        if part.method == HttpMethod::Get {
            request = request.with_facet(QueryFacet::parse(&part.query, &self.limits.query)?);
        }
        if part.path.is_links() {
            LinkBody::parse(&part.body)?;
        }

        self.guard
            .check(self.store.as_ref(), collection, &part.path)
            .await?;

        Ok(self.store.execute(collection, &request).await?)
    }
}

/// Rejects method and path combinations the engine does not serve.
fn route(part: &RequestPart) -> Result<(), PartError> {
    match &part.path {
        ResourcePath::NavigationProperty { key: Some(key), property, .. } => Err(PartError::new(
            PartErrorKind::BadRequest,
            error_codes::KEY_FOR_NAVPROP_SHOULD_NOT_BE_SPECIFIED,
            format!("key ['{key}'] must not be specified for navigation property [_{property}]"),
        )),
        ResourcePath::NavigationProperty { .. } | ResourcePath::Links { .. }
            if part.method != HttpMethod::Post =>
        {
            Err(PartError::new(
                PartErrorKind::MethodNotImplemented,
                error_codes::METHOD_NOT_IMPLEMENTED,
                format!("{} is not implemented for [{}]", part.method, part.path),
            ))
        }
        _ => Ok(()),
    }
}
