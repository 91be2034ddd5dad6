//! Raw material inventory model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RawMaterial {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub substance_id: Uuid,
    pub lot_number: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_cost: Option<Decimal>,
    pub expires_at: Option<DateTime<Utc>>,
    pub supplier_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRawMaterialRequest {
    pub substance_id: Uuid,
    pub lot_number: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_cost: Option<Decimal>,
    pub expires_at: Option<DateTime<Utc>>,
    pub supplier_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRawMaterialRequest {
    pub lot_number: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_cost: Option<Decimal>,
    pub expires_at: Option<DateTime<Utc>>,
    pub supplier_name: Option<String>,
}
