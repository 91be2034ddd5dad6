//! Follow model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "follow_target", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FollowTarget {
    User,
    Substance,
}

impl std::str::FromStr for FollowTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" | "users" => Ok(FollowTarget::User),
            "substance" | "substances" => Ok(FollowTarget::Substance),
            other => Err(format!("unknown follow target: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Follow {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub target_kind: FollowTarget,
    pub target_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowFilter {
    pub kind: Option<FollowTarget>,
}
