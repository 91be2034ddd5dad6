//! Flash deal repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;
use crate::models::flash_deal::{CreateFlashDealRequest, FlashDeal, FlashDealClaim};
use crate::utils::errors::CoopError;

#[derive(Clone, Debug)]
pub struct FlashDealRepository {
    pool: PgPool,
}

impl FlashDealRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, created_by: Uuid, request: CreateFlashDealRequest) -> Result<FlashDeal, CoopError> {
        let now = Utc::now();
        let deal = sqlx::query_as::<_, FlashDeal>(
            r#"
            INSERT INTO flash_deals
                (id, created_by, substance_id, title, description, unit, unit_price, original_price,
                 stock_limit, per_user_limit, starts_at, ends_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(created_by)
        .bind(request.substance_id)
        .bind(request.title)
        .bind(request.description)
        .bind(request.unit)
        .bind(request.unit_price)
        .bind(request.original_price)
        .bind(request.stock_limit)
        .bind(request.per_user_limit)
        .bind(request.starts_at.unwrap_or(now))
        .bind(request.ends_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(deal)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<FlashDeal>, CoopError> {
        let deal = sqlx::query_as::<_, FlashDeal>("SELECT * FROM flash_deals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(deal)
    }

    /// Active deals that have not ended yet, soonest ending first
    pub async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<FlashDeal>, CoopError> {
        let deals = sqlx::query_as::<_, FlashDeal>(
            "SELECT * FROM flash_deals WHERE is_active AND ends_at > $1 ORDER BY ends_at ASC"
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(deals)
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<FlashDeal, CoopError> {
        let deal = sqlx::query_as::<_, FlashDeal>(
            "UPDATE flash_deals SET is_active = FALSE, updated_at = $2 WHERE id = $1 RETURNING *"
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        deal.ok_or_else(|| CoopError::not_found("flash deal", id))
    }

    pub async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<Option<FlashDeal>, CoopError> {
        let deal = sqlx::query_as::<_, FlashDeal>("SELECT * FROM flash_deals WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(deal)
    }

    /// Total the user already claimed from a deal
    pub async fn user_claimed(conn: &mut PgConnection, deal_id: Uuid, user_id: Uuid) -> Result<Decimal, CoopError> {
        let claimed: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM flash_deal_claims WHERE deal_id = $1 AND user_id = $2"
        )
        .bind(deal_id)
        .bind(user_id)
        .fetch_one(conn)
        .await?;

        Ok(claimed)
    }

    pub async fn add_claimed(conn: &mut PgConnection, deal_id: Uuid, quantity: Decimal) -> Result<FlashDeal, CoopError> {
        let deal = sqlx::query_as::<_, FlashDeal>(
            r#"
            UPDATE flash_deals
            SET claimed_quantity = claimed_quantity + $2, updated_at = $3
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(deal_id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(deal)
    }

    pub async fn insert_claim(conn: &mut PgConnection, deal_id: Uuid, user_id: Uuid, quantity: Decimal) -> Result<FlashDealClaim, CoopError> {
        let claim = sqlx::query_as::<_, FlashDealClaim>(
            r#"
            INSERT INTO flash_deal_claims (id, deal_id, user_id, quantity, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(deal_id)
        .bind(user_id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(claim)
    }

    /// Delete a claim, returning it so its quantity can be released
    pub async fn remove_claim(conn: &mut PgConnection, claim_id: Uuid) -> Result<Option<FlashDealClaim>, CoopError> {
        let claim = sqlx::query_as::<_, FlashDealClaim>("DELETE FROM flash_deal_claims WHERE id = $1 RETURNING *")
            .bind(claim_id)
            .fetch_optional(conn)
            .await?;

        Ok(claim)
    }

    pub async fn release_claimed(conn: &mut PgConnection, deal_id: Uuid, quantity: Decimal) -> Result<FlashDeal, CoopError> {
        let deal = sqlx::query_as::<_, FlashDeal>(
            r#"
            UPDATE flash_deals
            SET claimed_quantity = GREATEST(claimed_quantity - $2, 0), updated_at = $3
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(deal_id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(deal)
    }

    pub async fn claims_for_user(&self, user_id: Uuid) -> Result<Vec<FlashDealClaim>, CoopError> {
        let claims = sqlx::query_as::<_, FlashDealClaim>(
            "SELECT * FROM flash_deal_claims WHERE user_id = $1 ORDER BY created_at DESC"
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(claims)
    }
}
