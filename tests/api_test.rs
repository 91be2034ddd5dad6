//! Router tests that need no database
//!
//! The pool points at a closed port, so anything reaching the database
//! fails fast while routing, authentication and error mapping stay testable.

mod helpers;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use coopfarma::database::create_lazy_pool;
use helpers::test_settings;
use serde_json::Value;
use tower::ServiceExt;

fn app() -> Router {
    let settings = test_settings();
    let pool = create_lazy_pool(&settings.database).expect("Failed to build lazy pool");
    coopfarma::build_app(settings, pool).expect("Failed to build app")
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(request).await.expect("Router failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("Failed to read body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_reports_unreachable_database() {
    let (status, body) = send(get("/api/health")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], false);
    assert_eq!(body["version"], coopfarma::VERSION);
    assert_eq!(body["services"]["sseConnections"], 0);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    for uri in ["/api/auth/me", "/api/marketplace/offers", "/api/financial/balance", "/api/notifications"] {
        let (status, body) = send(get(uri)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["error"], "UNAUTHORIZED");
    }
}

#[tokio::test]
async fn test_invalid_bearer_token_is_rejected() {
    let request = Request::builder()
        .uri("/api/auth/me")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized: Invalid or expired token");
}

#[tokio::test]
async fn test_event_stream_rejects_bad_query_token() {
    let (status, _) = send(get("/api/notifications/events?token=garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = app().oneshot(get("/api/does-not-exist")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_preflight_allows_configured_origin() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/marketplace/offers")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:5173"
    );
}
