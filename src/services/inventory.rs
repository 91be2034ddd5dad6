//! Raw material inventory service

use rust_decimal::Decimal;
use uuid::Uuid;
use crate::database::DatabaseService;
use crate::models::amount::ensure_storable;
use crate::models::quotation::parse_unit;
use crate::models::raw_material::{CreateRawMaterialRequest, RawMaterial, UpdateRawMaterialRequest};
use crate::services::auth::AuthContext;
use crate::utils::errors::{CoopError, Result};
use crate::utils::logging::log_user_action;

fn check_quantity(quantity: Decimal) -> Result<()> {
    if quantity < Decimal::ZERO {
        return Err(CoopError::InvalidInput("Quantity cannot be negative".to_string()));
    }
    ensure_storable(quantity, "Quantity")?;
    Ok(())
}

#[derive(Clone)]
pub struct InventoryService {
    db: DatabaseService,
}

impl InventoryService {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// Staff see every inventory; everyone else their own
    pub async fn list(&self, ctx: &AuthContext, limit: i64, offset: i64) -> Result<Vec<RawMaterial>> {
        let owner = if ctx.is_staff() { None } else { Some(ctx.user_id) };
        self.db.raw_materials.list(owner, limit, offset).await
    }

    pub async fn get(&self, ctx: &AuthContext, id: Uuid) -> Result<RawMaterial> {
        let material = self
            .db
            .raw_materials
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoopError::not_found("raw material", id))?;
        if material.owner_id != ctx.user_id && !ctx.is_staff() {
            return Err(CoopError::not_found("raw material", id));
        }
        Ok(material)
    }

    pub async fn create(&self, ctx: &AuthContext, request: CreateRawMaterialRequest) -> Result<RawMaterial> {
        check_quantity(request.quantity)?;
        if parse_unit(&request.unit).is_none() {
            return Err(CoopError::InvalidInput(format!("Unknown unit: {}", request.unit)));
        }
        if self.db.substances.find_by_id(request.substance_id).await?.is_none() {
            return Err(CoopError::not_found("substance", request.substance_id));
        }

        let material = self.db.raw_materials.create(ctx.user_id, request).await?;
        log_user_action(ctx.user_id, "create_raw_material", Some(&material.id.to_string()));
        Ok(material)
    }

    pub async fn update(&self, ctx: &AuthContext, id: Uuid, request: UpdateRawMaterialRequest) -> Result<RawMaterial> {
        let current = self.get(ctx, id).await?;
        if current.owner_id != ctx.user_id {
            return Err(CoopError::PermissionDenied("Only the owner can edit a raw material".to_string()));
        }
        if let Some(quantity) = request.quantity {
            check_quantity(quantity)?;
        }

        let material = self.db.raw_materials.update(id, request).await?;
        log_user_action(ctx.user_id, "update_raw_material", Some(&id.to_string()));
        Ok(material)
    }

    pub async fn delete(&self, ctx: &AuthContext, id: Uuid) -> Result<()> {
        let current = self.get(ctx, id).await?;
        if current.owner_id != ctx.user_id && !ctx.is_master() {
            return Err(CoopError::PermissionDenied("Only the owner can delete a raw material".to_string()));
        }
        if !self.db.raw_materials.delete(id).await? {
            return Err(CoopError::not_found("raw material", id));
        }
        log_user_action(ctx.user_id, "delete_raw_material", Some(&id.to_string()));
        Ok(())
    }
}
