//! HTTP handlers module
//!
//! This module contains all REST handlers organized by area, plus the
//! router that mounts them under `/api`:
//! - Account, user, role and access request handlers
//! - Supplier qualification and catalog handlers
//! - Marketplace, quotation and financial handlers
//! - Notification (including the SSE stream), community and system handlers

pub mod auth;
pub mod community;
pub mod financial;
pub mod health;
pub mod marketplace;
pub mod notifications;
pub mod quotations;
pub mod substances;
pub mod suppliers;
pub mod system;
pub mod users;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use crate::config::ServerConfig;
use crate::middleware::logging::{log_response, make_request_span};
use crate::state::AppState;

/// Multipart framing allowance on top of the raw upload limit
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// CORS from configured origins; `*` allows any origin
pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if config.cors_origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(origins))
}

fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/change-password", post(auth::change_password))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/me", put(auth::update_profile))
        .route("/users/{id}", get(users::get_user).put(users::update_user))
        .route("/users/{id}/deactivate", post(users::deactivate_user))
        .route("/users/{id}/roles", get(users::user_roles))
        .route("/roles", get(users::list_roles).post(users::create_role))
        .route("/roles/me/permissions", get(users::my_permissions))
        .route("/roles/{id}", put(users::update_role).delete(users::delete_role))
        .route("/roles/{id}/users/{user_id}", post(users::assign_role).delete(users::unassign_role))
        .route("/requests", get(users::list_access_requests).post(users::submit_access_request))
        .route("/requests/{id}/approve", post(users::approve_access_request))
        .route("/requests/{id}/reject", post(users::reject_access_request))
}

fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/suppliers", get(suppliers::list).post(suppliers::register))
        .route(
            "/suppliers/qualification-requests",
            get(suppliers::list_qualifications).post(suppliers::submit_qualification),
        )
        .route("/suppliers/qualification-requests/{id}/review", post(suppliers::review_qualification))
        .route("/suppliers/{id}", get(suppliers::get))
        .route("/suppliers/{id}/eligibility", get(suppliers::eligibility))
        .route("/substances", get(substances::search).post(substances::create))
        .route("/substances/requests", get(substances::list_requests).post(substances::request_substance))
        .route("/substances/requests/{id}/review", post(substances::review_request))
        .route("/substances/{id}", get(substances::get).put(substances::update))
        .route("/raw-materials", get(substances::list_raw_materials).post(substances::create_raw_material))
        .route(
            "/raw-materials/{id}",
            get(substances::get_raw_material)
                .put(substances::update_raw_material)
                .delete(substances::delete_raw_material),
        )
}

fn marketplace_routes() -> Router<AppState> {
    use crate::handlers::marketplace as m;

    Router::new()
        .route("/marketplace/offers", get(m::list_offers).post(m::create_offer))
        .route("/marketplace/offers/{id}", get(m::get_offer))
        .route("/marketplace/offers/{id}/cancel", post(m::cancel_offer))
        .route("/marketplace/offers/{id}/buy", post(m::buy_offer))
        .route("/marketplace/offers/{id}/bids", get(m::list_bids).post(m::place_bid))
        .route("/marketplace/offers/{id}/close", post(m::close_auction))
        .route("/marketplace/offers/{id}/proposals", get(m::list_proposals).post(m::create_proposal))
        .route("/marketplace/proposals/{id}/accept", post(m::accept_proposal))
        .route("/marketplace/proposals/{id}/reject", post(m::reject_proposal))
        .route("/marketplace/proposals/{id}/withdraw", post(m::withdraw_proposal))
        .route("/marketplace/transactions", get(m::list_transactions))
        .route("/marketplace/transactions/{id}", get(m::get_transaction))
        .route("/marketplace/transactions/{id}/status", post(m::update_transaction_status))
        .route("/marketplace/flash-deals", get(m::list_flash_deals).post(m::create_flash_deal))
        .route("/marketplace/flash-deals/claims/me", get(m::my_flash_deal_claims))
        .route("/marketplace/flash-deals/{id}", get(m::get_flash_deal))
        .route("/marketplace/flash-deals/{id}/claim", post(m::claim_flash_deal))
        .route("/marketplace/flash-deals/{id}/deactivate", post(m::deactivate_flash_deal))
        .route("/marketplace/reserves", get(m::list_reserves).post(m::create_reserve))
        .route("/marketplace/reserves/claims/me", get(m::my_reserve_claims))
        .route("/marketplace/reserves/{id}", get(m::get_reserve))
        .route("/marketplace/reserves/{id}/status", get(m::reserve_status))
        .route("/marketplace/reserves/{id}/claim", post(m::claim_reserve))
        .route("/marketplace/reserves/{id}/deactivate", post(m::deactivate_reserve))
        .route("/marketplace/reserves/{id}/recalculate", post(m::recalculate_reserve))
        .route("/quotations", get(quotations::list).post(quotations::create))
        .route("/quotations/{id}", get(quotations::get))
        .route("/quotations/{id}/responses", post(quotations::respond))
        .route("/quotations/{id}/comparison", get(quotations::comparison))
        .route("/quotations/{id}/select", post(quotations::select))
        .route("/quotations/{id}/cancel", post(quotations::cancel))
        .route("/financial/movements", get(financial::list_movements).post(financial::record_movement))
        .route("/financial/balance", get(financial::balance))
        .route("/financial/summary", get(financial::summary))
}

fn community_routes(upload_limit: usize) -> Router<AppState> {
    use crate::handlers::community as c;

    Router::new()
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/events", get(notifications::events))
        .route(
            "/notifications/preferences",
            get(notifications::preferences).put(notifications::update_preferences),
        )
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/transparency/news", get(c::list_news).post(c::create_news))
        .route("/transparency/news/{id}", put(c::update_news))
        .route("/transparency/news/{id}/publish", post(c::publish_news))
        .route("/transparency/news/{id}/unpublish", post(c::unpublish_news))
        .route("/voting", get(c::list_votings).post(c::create_voting))
        .route("/voting/{id}", get(c::get_voting))
        .route("/voting/{id}/open", post(c::open_voting))
        .route("/voting/{id}/close", post(c::close_voting))
        .route("/voting/{id}/vote", post(c::vote))
        .route("/voting/{id}/results", get(c::voting_results))
        .route("/follow/following", get(c::following))
        .route("/follow/followers", get(c::followers))
        .route("/follow/{kind}/{id}", post(c::follow).delete(c::unfollow))
        .route("/settings", get(system::list_settings))
        .route("/settings/{key}", get(system::get_setting).put(system::put_setting))
        .route(
            "/files",
            post(system::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files/{id}", get(system::download))
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let server = &state.settings.server;
    let upload_limit = state.settings.storage.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;
    let hard_limit = server.body_limit_bytes.max(upload_limit);

    let api = Router::new()
        .route("/health", get(health::health))
        .merge(account_routes())
        .merge(catalog_routes())
        .merge(marketplace_routes())
        .merge(community_routes(upload_limit));

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(server.body_limit_bytes))
        .layer(RequestBodyLimitLayer::new(hard_limit))
        .layer(cors_layer(server))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(make_request_span)
                .on_response(log_response),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    async fn allowed_origin(config: &ServerConfig, origin: &str) -> Option<String> {
        let app: Router = Router::new().route("/ping", get(|| async { "pong" })).layer(cors_layer(config));
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/ping")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_wildcard_origin_allows_any() {
        let config = ServerConfig { cors_origins: vec!["*".to_string()], ..Default::default() };
        assert_eq!(allowed_origin(&config, "https://qualquer.test").await.as_deref(), Some("*"));
    }

    #[tokio::test]
    async fn test_origin_list_skips_invalid_entries() {
        let config = ServerConfig {
            cors_origins: vec!["http://localhost:5173".to_string(), "bad\norigin".to_string()],
            ..Default::default()
        };
        assert_eq!(
            allowed_origin(&config, "http://localhost:5173").await.as_deref(),
            Some("http://localhost:5173")
        );
        assert_eq!(allowed_origin(&config, "https://evil.test").await, None);
    }
}
