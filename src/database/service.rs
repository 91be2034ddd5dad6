//! Database service layer
//!
//! Bundles every repository behind one cloneable handle and owns the pool
//! used to open transactions.

use sqlx::{Postgres, Transaction};
use crate::database::{DatabasePool, repositories::*};
use crate::utils::errors::CoopError;

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pool: DatabasePool,
    pub users: UserRepository,
    pub access_requests: AccessRequestRepository,
    pub roles: RoleRepository,
    pub suppliers: SupplierRepository,
    pub substances: SubstanceRepository,
    pub raw_materials: RawMaterialRepository,
    pub marketplace: MarketplaceRepository,
    pub flash_deals: FlashDealRepository,
    pub reserves: ReserveRepository,
    pub financial: FinancialRepository,
    pub quotations: QuotationRepository,
    pub notifications: NotificationRepository,
    pub news: NewsRepository,
    pub votings: VotingRepository,
    pub follows: FollowRepository,
    pub files: FileRepository,
    pub settings: SettingRepository,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            access_requests: AccessRequestRepository::new(pool.clone()),
            roles: RoleRepository::new(pool.clone()),
            suppliers: SupplierRepository::new(pool.clone()),
            substances: SubstanceRepository::new(pool.clone()),
            raw_materials: RawMaterialRepository::new(pool.clone()),
            marketplace: MarketplaceRepository::new(pool.clone()),
            flash_deals: FlashDealRepository::new(pool.clone()),
            reserves: ReserveRepository::new(pool.clone()),
            financial: FinancialRepository::new(pool.clone()),
            quotations: QuotationRepository::new(pool.clone()),
            notifications: NotificationRepository::new(pool.clone()),
            news: NewsRepository::new(pool.clone()),
            votings: VotingRepository::new(pool.clone()),
            follows: FollowRepository::new(pool.clone()),
            files: FileRepository::new(pool.clone()),
            settings: SettingRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Start a transaction for multi-row operations
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, CoopError> {
        Ok(self.pool.begin().await?)
    }

    pub async fn health_check(&self) -> Result<(), CoopError> {
        super::connection::health_check(&self.pool).await
    }
}
