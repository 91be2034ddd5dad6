//! Strategic reserve repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use crate::models::reserve::{CreateReserveQuotaRequest, StrategicReserveClaim, StrategicReserveQuota};
use crate::utils::errors::CoopError;

#[derive(Clone, Debug)]
pub struct ReserveRepository {
    pool: PgPool,
}

impl ReserveRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        created_by: Uuid,
        request: CreateReserveQuotaRequest,
        participant_count: i32,
        share_per_cnpj: Decimal,
    ) -> Result<StrategicReserveQuota, CoopError> {
        let quota = sqlx::query_as::<_, StrategicReserveQuota>(
            r#"
            INSERT INTO strategic_reserve_quotas
                (id, created_by, substance_id, total_quantity, unit, unit_price, period_start, period_end,
                 participant_count, share_per_cnpj, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(created_by)
        .bind(request.substance_id)
        .bind(request.total_quantity)
        .bind(request.unit)
        .bind(request.unit_price)
        .bind(request.period_start)
        .bind(request.period_end)
        .bind(participant_count)
        .bind(share_per_cnpj)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(quota)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<StrategicReserveQuota>, CoopError> {
        let quota = sqlx::query_as::<_, StrategicReserveQuota>("SELECT * FROM strategic_reserve_quotas WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(quota)
    }

    pub async fn list(&self, active_only: bool) -> Result<Vec<StrategicReserveQuota>, CoopError> {
        let quotas = sqlx::query_as::<_, StrategicReserveQuota>(
            "SELECT * FROM strategic_reserve_quotas WHERE (NOT $1 OR is_active) ORDER BY period_end DESC"
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(quotas)
    }

    pub async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<Option<StrategicReserveQuota>, CoopError> {
        let quota = sqlx::query_as::<_, StrategicReserveQuota>(
            "SELECT * FROM strategic_reserve_quotas WHERE id = $1 FOR UPDATE"
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(quota)
    }

    /// Claimed so far by every user sharing `cnpj`
    pub async fn cnpj_claimed(conn: &mut PgConnection, quota_id: Uuid, cnpj: &str) -> Result<Decimal, CoopError> {
        let claimed: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM strategic_reserve_claims WHERE quota_id = $1 AND cnpj = $2"
        )
        .bind(quota_id)
        .bind(cnpj)
        .fetch_one(conn)
        .await?;

        Ok(claimed)
    }

    pub async fn total_claimed(conn: &mut PgConnection, quota_id: Uuid) -> Result<Decimal, CoopError> {
        let claimed: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM strategic_reserve_claims WHERE quota_id = $1"
        )
        .bind(quota_id)
        .fetch_one(conn)
        .await?;

        Ok(claimed)
    }

    /// Largest amount any single CNPJ has claimed
    pub async fn max_cnpj_claimed(conn: &mut PgConnection, quota_id: Uuid) -> Result<Decimal, CoopError> {
        let claimed: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(claimed), 0) FROM (
                SELECT SUM(quantity) AS claimed FROM strategic_reserve_claims
                WHERE quota_id = $1
                GROUP BY cnpj
            ) per_cnpj
            "#
        )
        .bind(quota_id)
        .fetch_one(conn)
        .await?;

        Ok(claimed)
    }

    pub async fn insert_claim(conn: &mut PgConnection, quota_id: Uuid, user_id: Uuid, cnpj: &str, quantity: Decimal) -> Result<StrategicReserveClaim, CoopError> {
        let claim = sqlx::query_as::<_, StrategicReserveClaim>(
            r#"
            INSERT INTO strategic_reserve_claims (id, quota_id, user_id, cnpj, quantity, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(quota_id)
        .bind(user_id)
        .bind(cnpj)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(claim)
    }

    pub async fn remove_claim(conn: &mut PgConnection, claim_id: Uuid) -> Result<Option<StrategicReserveClaim>, CoopError> {
        let claim = sqlx::query_as::<_, StrategicReserveClaim>(
            "DELETE FROM strategic_reserve_claims WHERE id = $1 RETURNING *"
        )
        .bind(claim_id)
        .fetch_optional(conn)
        .await?;

        Ok(claim)
    }

    pub async fn update_share(conn: &mut PgConnection, id: Uuid, participant_count: i32, share_per_cnpj: Decimal) -> Result<StrategicReserveQuota, CoopError> {
        let quota = sqlx::query_as::<_, StrategicReserveQuota>(
            r#"
            UPDATE strategic_reserve_quotas
            SET participant_count = $2, share_per_cnpj = $3, updated_at = $4
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(participant_count)
        .bind(share_per_cnpj)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(quota)
    }

    pub async fn set_active(&self, id: Uuid, is_active: bool) -> Result<StrategicReserveQuota, CoopError> {
        let quota = sqlx::query_as::<_, StrategicReserveQuota>(
            "UPDATE strategic_reserve_quotas SET is_active = $2, updated_at = $3 WHERE id = $1 RETURNING *"
        )
        .bind(id)
        .bind(is_active)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        quota.ok_or_else(|| CoopError::not_found("reserve quota", id))
    }

    pub async fn claims_for_cnpj(&self, cnpj: &str) -> Result<Vec<StrategicReserveClaim>, CoopError> {
        let claims = sqlx::query_as::<_, StrategicReserveClaim>(
            "SELECT * FROM strategic_reserve_claims WHERE cnpj = $1 ORDER BY created_at DESC"
        )
        .bind(cnpj)
        .fetch_all(&self.pool)
        .await?;

        Ok(claims)
    }
}
