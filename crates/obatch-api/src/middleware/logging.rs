//! Access logging.
//!
//! One event per request, emitted when the response is ready. Server errors
//! log at `error`, client errors at `warn`, everything else at `info`. A
//! `202` on `$batch` says nothing about the parts inside; those are logged by
//! the batch handler.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Instant,
};

use axum::http::{header::CONTENT_LENGTH, Request, Response};
use tower::{Layer, Service};
use tracing::{error, info, warn};

use super::request_id::RequestId;

#[derive(Clone, Default)]
pub struct RequestLoggingLayer;

impl RequestLoggingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequestLoggingLayer {
    type Service = RequestLoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLoggingService { inner }
    }
}

#[derive(Clone)]
pub struct RequestLoggingService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestLoggingService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_default();
        let request_bytes = request
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);

        let start = Instant::now();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = inner.call(request).await?;
            let status = response.status().as_u16();
            let duration_ms = start.elapsed().as_millis() as u64;

            match status {
                500..=599 => error!(
                    target: "obatch::http",
                    request_id = %request_id, method = %method, path = %path,
                    status, request_bytes, duration_ms, "request failed"
                ),
                400..=499 => warn!(
                    target: "obatch::http",
                    request_id = %request_id, method = %method, path = %path,
                    status, request_bytes, duration_ms, "request rejected"
                ),
                _ => info!(
                    target: "obatch::http",
                    request_id = %request_id, method = %method, path = %path,
                    status, request_bytes, duration_ms, "request completed"
                ),
            }

            Ok(response)
        })
    }
}
