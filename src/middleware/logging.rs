//! HTTP request logging
//!
//! Span and response hooks plugged into `tower_http::trace::TraceLayer`.

use std::time::Duration;
use axum::body::Body;
use axum::http::{Request, Response};
use tracing::{info, warn, Span};
use uuid::Uuid;

/// One span per request, tagged with a fresh request id
pub fn make_request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "http_request",
        request_id = %Uuid::new_v4(),
        method = %request.method(),
        path = %request.uri().path(),
    )
}

/// Log status and latency once the response head is ready
pub fn log_response(response: &Response<Body>, latency: Duration, _span: &Span) {
    let status = response.status();
    let latency_ms = latency.as_millis() as u64;

    if status.is_server_error() {
        warn!(status = status.as_u16(), latency_ms = latency_ms, "Request failed");
    } else {
        info!(status = status.as_u16(), latency_ms = latency_ms, "Request completed");
    }
}
