//! Request metrics keyed by route template.
//!
//! Runs behind the router, so the matched route is known: `/chat` rather
//! than whatever path the client sent. Requests that match no route
//! (404s, scans for random paths) share the `/other` label.
//!
//! For `/chat` the recorded duration ends when the SSE headers go out. The
//! stream itself is measured by the chat handler.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Label for requests that matched no route.
const UNMATCHED_ENDPOINT: &str = "/other";

/// Record method, route template, status and latency for every response,
/// including 401s from the auth middleware and framework rejections.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let endpoint = endpoint_label(&request);

    let response = next.run(request).await;

    record_http_request(
        method.as_str(),
        &endpoint,
        response.status().as_u16(),
        start.elapsed(),
    );

    response
}

fn endpoint_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNMATCHED_ENDPOINT.to_string(), |p| p.as_str().to_string())
}
