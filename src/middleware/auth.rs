//! Authentication extractor
//!
//! Handlers take an [`AuthContext`] argument to require a signed-in caller.
//! The token comes from `Authorization: Bearer …`, or from a `token` query
//! parameter for clients such as `EventSource` that cannot set headers.

use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde::Deserialize;
use tracing::debug;
use crate::services::auth::AuthContext;
use crate::state::AppState;
use crate::utils::errors::CoopError;

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Pull the raw token out of the request
pub fn extract_token(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    from_header.or_else(|| {
        Query::<TokenQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.token)
            .filter(|token| !token.is_empty())
    })
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = CoopError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts).ok_or_else(|| {
            debug!(path = %parts.uri.path(), "Request without credentials");
            CoopError::Unauthorized("Missing authentication token".to_string())
        })?;

        state.services.auth.authenticate(&token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn test_bearer_header() {
        let p = parts(Request::builder().uri("/api/auth/me").header("Authorization", "Bearer abc.def").body(()).unwrap());
        assert_eq!(extract_token(&p).as_deref(), Some("abc.def"));
    }

    #[test]
    fn test_query_token() {
        let p = parts(Request::builder().uri("/api/notifications/events?token=xyz").body(()).unwrap());
        assert_eq!(extract_token(&p).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_missing_or_malformed() {
        let p = parts(Request::builder().uri("/api/auth/me").header("Authorization", "Basic abc").body(()).unwrap());
        assert_eq!(extract_token(&p), None);

        let p = parts(Request::builder().uri("/api/auth/me?token=").body(()).unwrap());
        assert_eq!(extract_token(&p), None);
    }
}
