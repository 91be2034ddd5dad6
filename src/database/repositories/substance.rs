//! Substance catalog repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use uuid::Uuid;
use crate::models::access_request::RequestStatus;
use crate::models::substance::{
    CreateSubstanceRequest, CreateSubstanceRequestInput, Substance, SubstanceRequest,
    SubstanceSearch, UpdateSubstanceRequest,
};
use crate::utils::errors::CoopError;

#[derive(Clone, Debug)]
pub struct SubstanceRepository {
    pool: PgPool,
}

impl SubstanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Search by name substring (case-insensitive)
    pub async fn search(&self, search: &SubstanceSearch, limit: i64, offset: i64) -> Result<Vec<Substance>, CoopError> {
        let pattern = search.q.as_deref().map(|q| format!("%{}%", q.trim()));
        let substances = sqlx::query_as::<_, Substance>(
            r#"
            SELECT * FROM substances
            WHERE ($1::text IS NULL OR name ILIKE $1)
              AND ($2 OR is_active)
            ORDER BY name
            LIMIT $3 OFFSET $4
            "#
        )
        .bind(pattern)
        .bind(search.include_inactive.unwrap_or(false))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(substances)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Substance>, CoopError> {
        let substance = sqlx::query_as::<_, Substance>("SELECT * FROM substances WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(substance)
    }

    pub async fn name_exists(&self, name: &str) -> Result<bool, CoopError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM substances WHERE LOWER(name) = LOWER($1))")
            .bind(name.trim())
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    pub async fn insert(conn: &mut PgConnection, request: CreateSubstanceRequest) -> Result<Substance, CoopError> {
        let substance = sqlx::query_as::<_, Substance>(
            r#"
            INSERT INTO substances (id, name, cas_number, dcb_code, category, default_unit, is_controlled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(request.name.trim())
        .bind(request.cas_number)
        .bind(request.dcb_code)
        .bind(request.category)
        .bind(request.default_unit.unwrap_or_else(|| "g".to_string()))
        .bind(request.is_controlled)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(substance)
    }

    pub async fn create(&self, request: CreateSubstanceRequest) -> Result<Substance, CoopError> {
        let mut conn = self.pool.acquire().await?;
        Self::insert(&mut conn, request).await
    }

    pub async fn update(&self, id: Uuid, request: UpdateSubstanceRequest) -> Result<Substance, CoopError> {
        let substance = sqlx::query_as::<_, Substance>(
            r#"
            UPDATE substances
            SET name = COALESCE($2, name),
                cas_number = COALESCE($3, cas_number),
                dcb_code = COALESCE($4, dcb_code),
                category = COALESCE($5, category),
                default_unit = COALESCE($6, default_unit),
                is_controlled = COALESCE($7, is_controlled),
                is_active = COALESCE($8, is_active),
                updated_at = $9
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(request.name)
        .bind(request.cas_number)
        .bind(request.dcb_code)
        .bind(request.category)
        .bind(request.default_unit)
        .bind(request.is_controlled)
        .bind(request.is_active)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        substance.ok_or_else(|| CoopError::not_found("substance", id))
    }

    pub async fn create_request(&self, requested_by: Uuid, input: CreateSubstanceRequestInput) -> Result<SubstanceRequest, CoopError> {
        let request = sqlx::query_as::<_, SubstanceRequest>(
            r#"
            INSERT INTO substance_requests (id, requested_by, name, cas_number, justification, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(requested_by)
        .bind(input.name.trim())
        .bind(input.cas_number)
        .bind(input.justification)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(request)
    }

    pub async fn list_requests(&self, requested_by: Option<Uuid>, status: Option<RequestStatus>, limit: i64, offset: i64) -> Result<Vec<SubstanceRequest>, CoopError> {
        let requests = sqlx::query_as::<_, SubstanceRequest>(
            r#"
            SELECT * FROM substance_requests
            WHERE ($1::uuid IS NULL OR requested_by = $1)
              AND ($2::request_status IS NULL OR status = $2)
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

        Ok(requests)
    }

    pub async fn lock_request(conn: &mut PgConnection, id: Uuid) -> Result<Option<SubstanceRequest>, CoopError> {
        let request = sqlx::query_as::<_, SubstanceRequest>("SELECT * FROM substance_requests WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(request)
    }

    pub async fn set_request_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: RequestStatus,
        reviewer: Uuid,
        notes: Option<String>,
        substance_id: Option<Uuid>,
    ) -> Result<SubstanceRequest, CoopError> {
        let request = sqlx::query_as::<_, SubstanceRequest>(
            r#"
            UPDATE substance_requests
            SET status = $2, reviewed_by = $3, review_notes = $4, substance_id = $5, reviewed_at = $6
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(status)
        .bind(reviewer)
        .bind(notes)
        .bind(substance_id)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(request)
    }
}
