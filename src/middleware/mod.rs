//! Middleware module
//!
//! This module contains request extractors, tracing hooks and rate limiting

pub mod auth;
pub mod logging;
pub mod rate_limit;

// Re-export commonly used middleware
pub use auth::extract_token;
pub use rate_limit::LoginRateLimiter;
