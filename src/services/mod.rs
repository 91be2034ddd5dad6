//! Services module
//!
//! This module contains business logic services

pub mod auth;
pub mod event_hub;
pub mod financial;
pub mod flash_deal;
pub mod follow;
pub mod inventory;
pub mod mailer;
pub mod marketplace;
pub mod notification;
pub mod qualification;
pub mod quotation;
pub mod reserve;
pub mod storage;
pub mod substance;
pub mod transparency;
pub mod user;
pub mod voting;

// Re-export commonly used services
pub use auth::{AuthContext, AuthService, Claims};
pub use event_hub::{EventHub, SseMessage, Subscription};
pub use financial::FinancialService;
pub use flash_deal::FlashDealService;
pub use follow::FollowService;
pub use inventory::InventoryService;
pub use mailer::{Mailer, OutgoingEmail};
pub use marketplace::MarketplaceService;
pub use notification::NotificationService;
pub use qualification::QualificationService;
pub use quotation::QuotationService;
pub use reserve::ReserveService;
pub use storage::StorageService;
pub use substance::SubstanceService;
pub use transparency::TransparencyService;
pub use user::UserService;
pub use voting::VotingService;

use std::sync::Arc;
use serde::Serialize;
use crate::config::Settings;
use crate::database::DatabaseService;
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub auth: AuthService,
    pub users: UserService,
    pub notifications: NotificationService,
    pub qualification: QualificationService,
    pub substances: SubstanceService,
    pub inventory: InventoryService,
    pub marketplace: MarketplaceService,
    pub flash_deals: FlashDealService,
    pub reserves: ReserveService,
    pub quotations: QuotationService,
    pub financial: FinancialService,
    pub transparency: TransparencyService,
    pub voting: VotingService,
    pub follows: FollowService,
    pub storage: StorageService,
    mailer: Mailer,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services initialized
    pub fn new(db: DatabaseService, settings: Arc<Settings>) -> Result<Self> {
        let mailer = Mailer::new(settings.mail.clone())?;
        let hub = EventHub::new();
        let notifications = NotificationService::new(db.clone(), hub, mailer.clone());
        let auth = AuthService::new(db.clone(), settings.clone());
        let qualification = QualificationService::new(db.clone(), settings.clone(), notifications.clone());

        Ok(Self {
            users: UserService::new(db.clone(), mailer.clone(), notifications.clone()),
            substances: SubstanceService::new(db.clone(), notifications.clone()),
            inventory: InventoryService::new(db.clone()),
            marketplace: MarketplaceService::new(db.clone(), auth.clone(), notifications.clone()),
            flash_deals: FlashDealService::new(db.clone(), notifications.clone()),
            reserves: ReserveService::new(db.clone(), notifications.clone()),
            quotations: QuotationService::new(db.clone(), qualification.clone(), notifications.clone()),
            financial: FinancialService::new(db.clone(), auth.clone()),
            transparency: TransparencyService::new(db.clone(), auth.clone(), notifications.clone()),
            voting: VotingService::new(db.clone(), auth.clone(), notifications.clone()),
            follows: FollowService::new(db.clone()),
            storage: StorageService::new(db, settings.storage.clone()),
            qualification,
            notifications,
            auth,
            mailer,
        })
    }

    /// Health of the in-process services
    pub fn health(&self) -> ServiceHealthStatus {
        ServiceHealthStatus {
            mail_enabled: self.mailer.is_enabled(),
            sse_connections: self.notifications.hub().connection_count(),
        }
    }
}

/// Health status for the services layer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealthStatus {
    pub mail_enabled: bool,
    pub sse_connections: usize,
}
