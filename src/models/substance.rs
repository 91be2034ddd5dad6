//! Substance catalog model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;
use super::access_request::RequestStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Substance {
    pub id: Uuid,
    pub name: String,
    pub cas_number: Option<String>,
    pub dcb_code: Option<String>,
    pub category: Option<String>,
    pub default_unit: String,
    pub is_controlled: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubstanceRequest {
    pub name: String,
    pub cas_number: Option<String>,
    pub dcb_code: Option<String>,
    pub category: Option<String>,
    pub default_unit: Option<String>,
    #[serde(default)]
    pub is_controlled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubstanceRequest {
    pub name: Option<String>,
    pub cas_number: Option<String>,
    pub dcb_code: Option<String>,
    pub category: Option<String>,
    pub default_unit: Option<String>,
    pub is_controlled: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SubstanceRequest {
    pub id: Uuid,
    pub requested_by: Uuid,
    pub name: String,
    pub cas_number: Option<String>,
    pub justification: Option<String>,
    pub status: RequestStatus,
    pub reviewed_by: Option<Uuid>,
    pub review_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub substance_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubstanceRequestInput {
    pub name: String,
    pub cas_number: Option<String>,
    pub justification: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstanceSearch {
    pub q: Option<String>,
    pub include_inactive: Option<bool>,
}
