//! Quotation repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use uuid::Uuid;
use crate::models::quotation::{
    CreateQuotationRequest, CreateQuotationResponseRequest, Quotation, QuotationResponse, QuotationStatus,
};
use crate::utils::errors::CoopError;

#[derive(Clone, Debug)]
pub struct QuotationRepository {
    pool: PgPool,
}

impl QuotationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, requested_by: Uuid, request: CreateQuotationRequest) -> Result<Quotation, CoopError> {
        let quotation = sqlx::query_as::<_, Quotation>(
            r#"
            INSERT INTO quotations (id, requested_by, substance_id, quantity, unit, notes, closes_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(requested_by)
        .bind(request.substance_id)
        .bind(request.quantity)
        .bind(request.unit)
        .bind(request.notes)
        .bind(request.closes_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(quotation)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Quotation>, CoopError> {
        let quotation = sqlx::query_as::<_, Quotation>("SELECT * FROM quotations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(quotation)
    }

    pub async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<Option<Quotation>, CoopError> {
        let quotation = sqlx::query_as::<_, Quotation>("SELECT * FROM quotations WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(quotation)
    }

    /// Quotations of one requester, or all when `requested_by` is `None`
    pub async fn list(&self, requested_by: Option<Uuid>, status: Option<QuotationStatus>, limit: i64, offset: i64) -> Result<Vec<Quotation>, CoopError> {
        let quotations = sqlx::query_as::<_, Quotation>(
            r#"
            SELECT * FROM quotations
            WHERE ($1::uuid IS NULL OR requested_by = $1)
              AND ($2::quotation_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        )
        .bind(requested_by)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(quotations)
    }

    /// One response per supplier; a second one hits the unique key
    pub async fn create_response(&self, quotation_id: Uuid, supplier_id: Uuid, request: CreateQuotationResponseRequest) -> Result<QuotationResponse, CoopError> {
        let response = sqlx::query_as::<_, QuotationResponse>(
            r#"
            INSERT INTO quotation_responses
                (id, quotation_id, supplier_id, package_quantity, package_unit, package_price, delivery_days, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(quotation_id)
        .bind(supplier_id)
        .bind(request.package_quantity)
        .bind(request.package_unit)
        .bind(request.package_price)
        .bind(request.delivery_days)
        .bind(request.notes)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(response)
    }

    pub async fn responses_for(&self, quotation_id: Uuid) -> Result<Vec<QuotationResponse>, CoopError> {
        let responses = sqlx::query_as::<_, QuotationResponse>(
            "SELECT * FROM quotation_responses WHERE quotation_id = $1 ORDER BY created_at"
        )
        .bind(quotation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(responses)
    }

    pub async fn find_response(conn: &mut PgConnection, id: Uuid) -> Result<Option<QuotationResponse>, CoopError> {
        let response = sqlx::query_as::<_, QuotationResponse>("SELECT * FROM quotation_responses WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(response)
    }

    /// Close the quotation on the chosen response
    pub async fn select_response(conn: &mut PgConnection, id: Uuid, response_id: Uuid) -> Result<Quotation, CoopError> {
        let quotation = sqlx::query_as::<_, Quotation>(
            r#"
            UPDATE quotations
            SET status = 'closed', selected_response_id = $2, updated_at = $3
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(response_id)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(quotation)
    }

    pub async fn set_status(&self, id: Uuid, status: QuotationStatus) -> Result<Quotation, CoopError> {
        let quotation = sqlx::query_as::<_, Quotation>(
            "UPDATE quotations SET status = $2, updated_at = $3 WHERE id = $1 RETURNING *"
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        quotation.ok_or_else(|| CoopError::not_found("quotation", id))
    }
}
