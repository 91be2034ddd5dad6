//! Financial ledger repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use crate::models::financial::{CategoryTotal, CreateMovementRequest, FinancialMovement, MovementFilter, MovementKind};
use crate::utils::errors::CoopError;

#[derive(Clone, Debug)]
pub struct FinancialRepository {
    pool: PgPool,
}

impl FinancialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a movement; the ledger is never updated in place
    pub async fn insert(conn: &mut PgConnection, movement: CreateMovementRequest, created_by: Option<Uuid>) -> Result<FinancialMovement, CoopError> {
        let movement = sqlx::query_as::<_, FinancialMovement>(
            r#"
            INSERT INTO financial_movements
                (id, user_id, kind, category, amount, description, reference_type, reference_id, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(movement.user_id)
        .bind(movement.kind)
        .bind(movement.category)
        .bind(movement.amount)
        .bind(movement.description)
        .bind(movement.reference_type)
        .bind(movement.reference_id)
        .bind(created_by)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(movement)
    }

    pub async fn create(&self, movement: CreateMovementRequest, created_by: Uuid) -> Result<FinancialMovement, CoopError> {
        let mut conn = self.pool.acquire().await?;
        Self::insert(&mut conn, movement, Some(created_by)).await
    }

    pub async fn list(&self, filter: &MovementFilter, limit: i64, offset: i64) -> Result<Vec<FinancialMovement>, CoopError> {
        let movements = sqlx::query_as::<_, FinancialMovement>(
            r#"
            SELECT * FROM financial_movements
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at < $3)
              AND ($4::text IS NULL OR category = $4)
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#
        )
        .bind(filter.user_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.category.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Sum of credits and debits for a user
    pub async fn totals(&self, user_id: Uuid) -> Result<(Decimal, Decimal), CoopError> {
        let totals: (Decimal, Decimal) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(amount) FILTER (WHERE kind = 'credit'), 0),
                COALESCE(SUM(amount) FILTER (WHERE kind = 'debit'), 0)
            FROM financial_movements
            WHERE user_id = $1
            "#
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(totals)
    }

    pub async fn category_totals(&self, filter: &MovementFilter) -> Result<Vec<CategoryTotal>, CoopError> {
        let totals = sqlx::query_as::<_, CategoryTotal>(
            r#"
            SELECT kind, category, SUM(amount) AS total, COUNT(*) AS count
            FROM financial_movements
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at < $3)
            GROUP BY kind, category
            ORDER BY kind, category
            "#
        )
        .bind(filter.user_id)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&self.pool)
        .await?;

        Ok(totals)
    }
}

/// Credit line returning what a cancelled transaction had charged
pub fn refund_credit(user_id: Uuid, amount: Decimal, category: &str, transaction_id: Uuid) -> CreateMovementRequest {
    CreateMovementRequest {
        user_id,
        kind: MovementKind::Credit,
        category: category.to_string(),
        amount,
        description: Some("Refund for cancelled transaction".to_string()),
        reference_type: Some("transaction".to_string()),
        reference_id: Some(transaction_id),
    }
}

/// Debit line for a purchase made through the marketplace
pub fn purchase_debit(user_id: Uuid, amount: Decimal, category: &str, reference_type: &str, reference_id: Uuid) -> CreateMovementRequest {
    CreateMovementRequest {
        user_id,
        kind: MovementKind::Debit,
        category: category.to_string(),
        amount,
        description: None,
        reference_type: Some(reference_type.to_string()),
        reference_id: Some(reference_id),
    }
}
