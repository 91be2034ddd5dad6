//! Error handling for CoopFarma
//!
//! This module defines the main error type used throughout the application
//! and maps every variant onto an HTTP status and a JSON error body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Main error type for the CoopFarma application
#[derive(Error, Debug)]
pub enum CoopError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Business rule violated: {0}")]
    BusinessRule(String),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for CoopFarma operations
pub type Result<T> = std::result::Result<T, CoopError>;

impl CoopError {
    /// Shorthand for a missing row
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoopError::NotFound { entity, id: id.to_string() }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            CoopError::Database(_) => false,
            CoopError::Migration(_) => false,
            CoopError::Config(_) => false,
            CoopError::Unauthorized(_) => false,
            CoopError::PermissionDenied(_) => false,
            CoopError::NotFound { .. } => false,
            CoopError::Conflict(_) => false,
            CoopError::InvalidInput(_) => false,
            CoopError::BusinessRule(_) => false,
            CoopError::Token(_) => false,
            CoopError::Http(_) => true,
            CoopError::Serialization(_) => false,
            CoopError::Io(_) => true,
            CoopError::RateLimitExceeded => true,
            CoopError::ServiceUnavailable(_) => true,
            CoopError::Internal(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CoopError::Database(_) => ErrorSeverity::Critical,
            CoopError::Migration(_) => ErrorSeverity::Critical,
            CoopError::Config(_) => ErrorSeverity::Critical,
            CoopError::Internal(_) => ErrorSeverity::Critical,
            CoopError::PermissionDenied(_) => ErrorSeverity::Warning,
            CoopError::Unauthorized(_) => ErrorSeverity::Warning,
            CoopError::Token(_) => ErrorSeverity::Warning,
            CoopError::RateLimitExceeded => ErrorSeverity::Warning,
            CoopError::InvalidInput(_) => ErrorSeverity::Info,
            CoopError::BusinessRule(_) => ErrorSeverity::Info,
            CoopError::NotFound { .. } => ErrorSeverity::Info,
            CoopError::Conflict(_) => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            CoopError::Unauthorized(_) | CoopError::Token(_) => StatusCode::UNAUTHORIZED,
            CoopError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            CoopError::NotFound { .. } => StatusCode::NOT_FOUND,
            CoopError::Conflict(_) => StatusCode::CONFLICT,
            CoopError::InvalidInput(_) | CoopError::BusinessRule(_) => StatusCode::BAD_REQUEST,
            CoopError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            CoopError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoopError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            CoopError::Database(e) if is_unique_violation(e) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self.status_code() {
            StatusCode::UNAUTHORIZED => "UNAUTHORIZED",
            StatusCode::FORBIDDEN => "FORBIDDEN",
            StatusCode::NOT_FOUND => "NOT_FOUND",
            StatusCode::CONFLICT => "CONFLICT",
            StatusCode::BAD_REQUEST => "BAD_REQUEST",
            StatusCode::TOO_MANY_REQUESTS => "RATE_LIMIT_EXCEEDED",
            StatusCode::SERVICE_UNAVAILABLE => "SERVICE_UNAVAILABLE",
            _ => "INTERNAL_ERROR",
        }
    }
}

/// Postgres unique_violation
fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}

impl IntoResponse for CoopError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, severity = %self.severity(), "Request failed with internal error");
            "Internal server error".to_string()
        } else if status == StatusCode::CONFLICT && matches!(self, CoopError::Database(_)) {
            "Resource already exists".to_string()
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
            self.to_string()
        };

        let body = Json(json!({
            "error": self.code(),
            "message": message
        }));

        (status, body).into_response()
    }
}

impl From<axum::extract::multipart::MultipartError> for CoopError {
    fn from(error: axum::extract::multipart::MultipartError) -> Self {
        CoopError::InvalidInput(format!("Malformed multipart body: {}", error))
    }
}

impl From<argon2::password_hash::Error> for CoopError {
    fn from(error: argon2::password_hash::Error) -> Self {
        CoopError::Internal(format!("Password hashing failed: {}", error))
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(CoopError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(CoopError::PermissionDenied("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(CoopError::not_found("User", 1).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(CoopError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(CoopError::BusinessRule("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(CoopError::RateLimitExceeded.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(CoopError::Database(sqlx::Error::RowNotFound).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(CoopError::Internal("boom".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_found_message() {
        let err = CoopError::not_found("Substance", "abc");
        assert_eq!(err.to_string(), "Substance not found: abc");
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_severity() {
        assert_eq!(CoopError::Config("x".into()).severity(), ErrorSeverity::Critical);
        assert_eq!(CoopError::InvalidInput("x".into()).severity(), ErrorSeverity::Info);
        assert_eq!(CoopError::PermissionDenied("x".into()).severity(), ErrorSeverity::Warning);
        assert!(CoopError::RateLimitExceeded.is_recoverable());
        assert!(!CoopError::Conflict("x".into()).is_recoverable());
    }

    #[tokio::test]
    async fn test_internal_error_body_hides_details() {
        let response = CoopError::Internal("secret detail".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "INTERNAL_ERROR");
        assert_eq!(body["message"], "Internal server error");
    }
}
