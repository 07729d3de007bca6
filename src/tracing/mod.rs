//! Request-scoped tracing.
//!
//! The request-id middleware mints an id (or accepts the caller's
//! `x-request-id`) and runs the rest of the request inside
//! [`scope_request_id`]. Error bodies and response envelopes read it back
//! through [`current_request_id`].

use axum::http::Request;
use std::{fmt, future::Future};
use tower_http::trace::{DefaultOnResponse, HttpMakeClassifier, MakeSpan, TraceLayer};
use tracing::Level;
use uuid::Uuid;

use crate::middleware_helpers::REQUEST_ID_HEADER;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(String);

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
        f.write_str(&self.0)
    }
}

tokio::task_local! {
    static CURRENT_REQUEST_ID: RequestId;
}

/// Runs `future` with `request_id` as the current request id
pub async fn scope_request_id<Fut, R>(request_id: RequestId, future: Fut) -> R
where
    Fut: Future<Output = R>,
{
    CURRENT_REQUEST_ID.scope(request_id, future).await
}

pub fn current_request_id() -> Option<RequestId> {
    CURRENT_REQUEST_ID.try_with(RequestId::clone).ok()
}

/// Names the HTTP span after the request id assigned by the middleware
#[derive(Clone, Copy, Default)]
pub struct StoreSpan;

impl<B> MakeSpan<B> for StoreSpan {
    fn make_span(&mut self, request: &Request<B>) -> tracing::Span {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(|rid| rid.as_str().to_string())
            .or_else(|| {
                request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_default();

        tracing::info_span!(
            "http",
            %request_id,
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}

/// HTTP trace layer; 5xx responses are logged as failures
pub fn configure_http_tracing() -> TraceLayer<HttpMakeClassifier, StoreSpan> {
    TraceLayer::new_for_http()
        .make_span_with(StoreSpan)
        .on_response(DefaultOnResponse::new().level(Level::INFO))
}
