//! Shared application state
//!
//! One `AppState` is cloned into every request handler.

use std::sync::Arc;
use crate::config::Settings;
use crate::database::DatabaseService;
use crate::services::ServiceFactory;
use crate::utils::errors::Result;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db: DatabaseService,
    pub services: ServiceFactory,
}

impl AppState {
    /// Build every service on top of an existing database handle
    pub fn new(settings: Settings, db: DatabaseService) -> Result<Self> {
        let settings = Arc::new(settings);
        let services = ServiceFactory::new(db.clone(), settings.clone())?;
        Ok(Self { settings, db, services })
    }
}
