//! Per-request tracing span.
//!
//! The span is named after the matched route so that every `$batch` call
//! shares one span name regardless of cell, box or collection. Spans opened
//! by the batch handler nest under it.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use axum::{
    extract::MatchedPath,
    http::{Request, Response},
};
use tracing::{field::Empty, info_span, Instrument, Span};
use tower::{Layer, Service};

use super::request_id::RequestId;

#[derive(Clone, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService { inner }
    }
}

#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for TracingService<S>
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
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| "unmatched".to_string());
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_default();

        let span = info_span!(
            "http_request",
            method = %request.method(),
            route = %route,
            uri = %request.uri(),
            request_id = %request_id,
            http.status_code = Empty,
        );

        let mut inner = self.inner.clone();
        Box::pin(
            async move {
                let response = inner.call(request).await?;
                Span::current().record("http.status_code", response.status().as_u16());
                Ok(response)
            }
            .instrument(span),
        )
    }
}
