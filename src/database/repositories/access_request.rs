//! Access request repository implementation

use sqlx::PgPool;
use chrono::Utc;
use uuid::Uuid;
use crate::models::access_request::{AccessRequest, CreateAccessRequest, RequestStatus};
use crate::utils::errors::CoopError;

#[derive(Clone, Debug)]
pub struct AccessRequestRepository {
    pool: PgPool,
}

impl AccessRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a new pending request; email and CNPJ must already be normalized
    pub async fn create(&self, request: CreateAccessRequest) -> Result<AccessRequest, CoopError> {
        let row = sqlx::query_as::<_, AccessRequest>(
            r#"
            INSERT INTO access_requests (id, name, email, cnpj, company_name, requested_role, message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(request.name)
        .bind(request.email)
        .bind(request.cnpj)
        .bind(request.company_name)
        .bind(request.requested_role)
        .bind(request.message)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<AccessRequest>, CoopError> {
        let row = sqlx::query_as::<_, AccessRequest>("SELECT * FROM access_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    pub async fn list(&self, status: Option<RequestStatus>, limit: i64, offset: i64) -> Result<Vec<AccessRequest>, CoopError> {
        let rows = sqlx::query_as::<_, AccessRequest>(
            "SELECT * FROM access_requests WHERE ($1::request_status IS NULL OR status = $1) ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        )
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn has_pending_for_email(&self, email: &str) -> Result<bool, CoopError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM access_requests WHERE email = $1 AND status = 'pending')"
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Close a pending request. Returns `None` when it was not pending anymore.
    pub async fn review(&self, id: Uuid, status: RequestStatus, reviewer: Uuid, notes: Option<String>) -> Result<Option<AccessRequest>, CoopError> {
        let row = sqlx::query_as::<_, AccessRequest>(
            r#"
            UPDATE access_requests
            SET status = $2, reviewed_by = $3, review_notes = $4, reviewed_at = $5
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#
        )
        .bind(id)
        .bind(status)
        .bind(reviewer)
        .bind(notes)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
