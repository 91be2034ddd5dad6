//! Cooperative role model
//!
//! Positions inside the cooperative (president, treasurer, council member...)
//! carrying string permissions on top of the fixed system role.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

pub const PERM_TRANSPARENCY_PUBLISH: &str = "transparency.publish";
pub const PERM_VOTING_MANAGE: &str = "voting.manage";
pub const PERM_FINANCIAL_VIEW: &str = "financial.view";
pub const PERM_MARKETPLACE_MODERATE: &str = "marketplace.moderate";

/// Every permission string the API understands
pub const KNOWN_PERMISSIONS: [&str; 4] = [
    PERM_TRANSPARENCY_PUBLISH,
    PERM_VOTING_MANAGE,
    PERM_FINANCIAL_VIEW,
    PERM_MARKETPLACE_MODERATE,
];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CooperativeRole {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<String>>,
}

/// Reject permission strings the API does not know about
pub fn unknown_permissions(permissions: &[String]) -> Vec<String> {
    permissions
        .iter()
        .filter(|p| !KNOWN_PERMISSIONS.contains(&p.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_permissions() {
        let perms = vec![PERM_VOTING_MANAGE.to_string(), "root.everything".to_string()];
        assert_eq!(unknown_permissions(&perms), vec!["root.everything".to_string()]);
        assert!(unknown_permissions(&[PERM_FINANCIAL_VIEW.to_string()]).is_empty());
    }
}
