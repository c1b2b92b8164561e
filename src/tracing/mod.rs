//! Request correlation and HTTP telemetry.
//!
//! Every request carries a [`RequestId`] that is visible to handlers through a
//! tokio task-local, so error logs emitted deep inside the order service can be
//! tied back to the request that produced them.

use axum::http::Request;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use tower_http::classify::{SharedClassifier, StatusInRangeAsFailures};
use tower_http::trace::{
    DefaultOnBodyChunk, DefaultOnEos, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse,
    MakeSpan, TraceLayer,
};
use uuid::Uuid;

/// Request ID tracking information
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl Default for RequestId {
    fn default() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }
}

impl RequestId {
    pub fn new(value: impl Into<String>) -> Self {
        RequestId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

tokio::task_local! {
    static CURRENT_REQUEST_ID: RefCell<Option<RequestId>>;
}

pub async fn scope_request_id<Fut, R>(request_id: RequestId, future: Fut) -> R
where
    Fut: Future<Output = R>,
{
    CURRENT_REQUEST_ID
        .scope(RefCell::new(Some(request_id)), future)
        .await
}

pub fn current_request_id() -> Option<RequestId> {
    CURRENT_REQUEST_ID
        .try_with(|cell| cell.borrow().clone())
        .ok()
        .flatten()
}

#[derive(Clone, Default)]
pub struct RequestSpanMaker;

impl<B> MakeSpan<B> for RequestSpanMaker {
    fn make_span(&mut self, request: &Request<B>) -> tracing::Span {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .cloned()
            .or_else(|| {
                request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .map(RequestId::new)
            })
            .unwrap_or_default();

        tracing::info_span!(
            "http.request",
            request_id = %request_id.as_str(),
            method = %request.method(),
            uri = %request.uri(),
        )
    }
}

/// Trace layer that treats 5xx responses as failures.
pub fn configure_http_tracing() -> TraceLayer<
    SharedClassifier<StatusInRangeAsFailures>,
    RequestSpanMaker,
    DefaultOnRequest,
    DefaultOnResponse,
    DefaultOnBodyChunk,
    DefaultOnEos,
    DefaultOnFailure,
> {
    let classifier = SharedClassifier::new(StatusInRangeAsFailures::new(500..=599));
    TraceLayer::new(classifier)
        .make_span_with(RequestSpanMaker)
        .on_request(DefaultOnRequest::default())
        .on_response(DefaultOnResponse::default())
        .on_body_chunk(DefaultOnBodyChunk::default())
        .on_eos(DefaultOnEos::default())
        .on_failure(DefaultOnFailure::default())
}
