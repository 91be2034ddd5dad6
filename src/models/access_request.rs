//! Access request model
//!
//! Prospective members and suppliers ask to join; a master reviews.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;
use super::user::UserRole;

/// Review state shared by every request workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub cnpj: Option<String>,
    pub company_name: Option<String>,
    pub requested_role: UserRole,
    pub message: Option<String>,
    pub status: RequestStatus,
    pub reviewed_by: Option<Uuid>,
    pub review_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccessRequest {
    pub name: String,
    pub email: String,
    pub cnpj: Option<String>,
    pub company_name: Option<String>,
    pub requested_role: UserRole,
    pub message: Option<String>,
}

/// Approve/reject decision used by every review endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDecision {
    pub approve: bool,
    pub notes: Option<String>,
    /// Only meaningful for supplier qualifications
    pub valid_until: Option<DateTime<Utc>>,
}
