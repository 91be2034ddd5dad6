//! Notification models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;
use super::user::UserRole;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub data: Option<serde_json::Value>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreference {
    pub user_id: Uuid,
    pub in_app_enabled: bool,
    pub email_enabled: bool,
    pub muted_kinds: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationPreference {
    /// Defaults for users who never saved preferences
    pub fn default_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            in_app_enabled: true,
            email_enabled: false,
            muted_kinds: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn is_muted(&self, kind: &str) -> bool {
        self.muted_kinds.iter().any(|k| k == kind)
    }

    pub fn wants_in_app(&self, kind: &str) -> bool {
        self.in_app_enabled && !self.is_muted(kind)
    }

    pub fn wants_email(&self, kind: &str) -> bool {
        self.email_enabled && !self.is_muted(kind)
    }

    /// Apply a partial update; each channel changes only when given
    pub fn apply(&mut self, update: &UpdatePreferencesRequest) {
        if let Some(in_app) = update.in_app_enabled {
            self.in_app_enabled = in_app;
        }
        if let Some(email) = update.email_enabled {
            self.email_enabled = email;
        }
        if let Some(muted) = &update.muted_kinds {
            let mut muted = muted.clone();
            muted.sort();
            muted.dedup();
            self.muted_kinds = muted;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePreferencesRequest {
    pub in_app_enabled: Option<bool>,
    pub email_enabled: Option<bool>,
    pub muted_kinds: Option<Vec<String>>,
}

/// Who a domain event is addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    User(Uuid),
    Users(Vec<Uuid>),
    Role(UserRole),
    Roles(Vec<UserRole>),
    All,
}

/// A domain event to fan out to in-app, SSE and email channels
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub data: Option<serde_json::Value>,
    pub audience: Audience,
}

impl NotificationEvent {
    pub fn new(kind: impl Into<String>, title: impl Into<String>, message: impl Into<String>, audience: Audience) -> Self {
        Self {
            kind: kind.into(),
            title: title.into(),
            message: message.into(),
            link: None,
            data: None,
            audience,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFilter {
    pub unread_only: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_toggle_independently() {
        let mut prefs = NotificationPreference::default_for(Uuid::new_v4());
        assert!(prefs.wants_in_app("flash_deal.created"));
        assert!(!prefs.wants_email("flash_deal.created"));

        prefs.apply(&UpdatePreferencesRequest { email_enabled: Some(true), ..Default::default() });
        assert!(prefs.in_app_enabled);
        assert!(prefs.email_enabled);

        prefs.apply(&UpdatePreferencesRequest { in_app_enabled: Some(false), ..Default::default() });
        assert!(!prefs.in_app_enabled);
        assert!(prefs.email_enabled);
    }

    #[test]
    fn test_muted_kinds_apply_to_both_channels() {
        let mut prefs = NotificationPreference::default_for(Uuid::new_v4());
        prefs.apply(&UpdatePreferencesRequest {
            email_enabled: Some(true),
            muted_kinds: Some(vec!["voting.opened".into(), "voting.opened".into()]),
            ..Default::default()
        });
        assert_eq!(prefs.muted_kinds.len(), 1);
        assert!(!prefs.wants_in_app("voting.opened"));
        assert!(!prefs.wants_email("voting.opened"));
        assert!(prefs.wants_email("marketplace.offer_created"));
    }
}
