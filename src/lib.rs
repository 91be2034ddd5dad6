//! CoopFarma backend
//!
//! REST and SSE backend for a cooperative of compounding pharmacies:
//! supplier qualification, a substance catalog, a member marketplace with
//! auctions, proposals, flash deals and strategic reserves, quotations,
//! a financial ledger, notifications, transparency news and voting.

pub mod config;
pub mod database;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{CoopError, Result};

// Re-export main components for easy access
pub use database::DatabaseService;
pub use services::ServiceFactory;
pub use state::AppState;

use axum::Router;
use database::DatabasePool;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}

/// Wire services on top of `pool` and return the application router
pub fn build_app(settings: Settings, pool: DatabasePool) -> Result<Router> {
    let state = AppState::new(settings, DatabaseService::new(pool))?;
    Ok(handlers::router(state))
}
