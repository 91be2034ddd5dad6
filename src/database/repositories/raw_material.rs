//! Raw material inventory repository implementation

use sqlx::PgPool;
use chrono::Utc;
use uuid::Uuid;
use crate::models::raw_material::{CreateRawMaterialRequest, RawMaterial, UpdateRawMaterialRequest};
use crate::utils::errors::CoopError;

#[derive(Clone, Debug)]
pub struct RawMaterialRepository {
    pool: PgPool,
}

impl RawMaterialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, owner_id: Uuid, request: CreateRawMaterialRequest) -> Result<RawMaterial, CoopError> {
        let material = sqlx::query_as::<_, RawMaterial>(
            r#"
            INSERT INTO raw_materials (id, owner_id, substance_id, lot_number, quantity, unit, unit_cost, expires_at, supplier_name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(request.substance_id)
        .bind(request.lot_number)
        .bind(request.quantity)
        .bind(request.unit)
        .bind(request.unit_cost)
        .bind(request.expires_at)
        .bind(request.supplier_name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(material)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<RawMaterial>, CoopError> {
        let material = sqlx::query_as::<_, RawMaterial>("SELECT * FROM raw_materials WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(material)
    }

    /// Inventory of one owner, or everyone's when `owner_id` is `None`
    pub async fn list(&self, owner_id: Option<Uuid>, limit: i64, offset: i64) -> Result<Vec<RawMaterial>, CoopError> {
        let materials = sqlx::query_as::<_, RawMaterial>(
            r#"
            SELECT * FROM raw_materials
            WHERE ($1::uuid IS NULL OR owner_id = $1)
            ORDER BY expires_at NULLS LAST, created_at DESC
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(materials)
    }

    pub async fn update(&self, id: Uuid, request: UpdateRawMaterialRequest) -> Result<RawMaterial, CoopError> {
        let material = sqlx::query_as::<_, RawMaterial>(
            r#"
            UPDATE raw_materials
            SET lot_number = COALESCE($2, lot_number),
                quantity = COALESCE($3, quantity),
                unit_cost = COALESCE($4, unit_cost),
                expires_at = COALESCE($5, expires_at),
                supplier_name = COALESCE($6, supplier_name),
                updated_at = $7
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(request.lot_number)
        .bind(request.quantity)
        .bind(request.unit_cost)
        .bind(request.expires_at)
        .bind(request.supplier_name)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        material.ok_or_else(|| CoopError::not_found("raw material", id))
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, CoopError> {
        let result = sqlx::query("DELETE FROM raw_materials WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
