//! Notification and preference repository implementation

use sqlx::PgPool;
use chrono::Utc;
use uuid::Uuid;
use crate::models::notification::{Notification, NotificationEvent, NotificationPreference};
use crate::utils::errors::CoopError;

#[derive(Clone, Debug)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store the in-app copy of an event for one recipient
    pub async fn insert(&self, user_id: Uuid, event: &NotificationEvent) -> Result<Notification, CoopError> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, user_id, kind, title, message, link, data, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&event.kind)
        .bind(&event.title)
        .bind(&event.message)
        .bind(&event.link)
        .bind(&event.data)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    pub async fn list_for_user(&self, user_id: Uuid, unread_only: bool, limit: i64, offset: i64) -> Result<Vec<Notification>, CoopError> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64, CoopError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL"
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Mark one notification read; `false` if it does not belong to the user
    pub async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, CoopError> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = COALESCE(read_at, $3) WHERE id = $1 AND user_id = $2"
        )
        .bind(id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, CoopError> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = $2 WHERE user_id = $1 AND read_at IS NULL"
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Stored preferences, or the defaults when the user never saved any
    pub async fn preferences(&self, user_id: Uuid) -> Result<NotificationPreference, CoopError> {
        let prefs = sqlx::query_as::<_, NotificationPreference>(
            "SELECT * FROM notification_preferences WHERE user_id = $1"
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(prefs.unwrap_or_else(|| NotificationPreference::default_for(user_id)))
    }

    /// Stored preferences for many users; missing users are absent from the result
    pub async fn preferences_for(&self, user_ids: &[Uuid]) -> Result<Vec<NotificationPreference>, CoopError> {
        let prefs = sqlx::query_as::<_, NotificationPreference>(
            "SELECT * FROM notification_preferences WHERE user_id = ANY($1)"
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(prefs)
    }

    pub async fn save_preferences(&self, prefs: &NotificationPreference) -> Result<NotificationPreference, CoopError> {
        let saved = sqlx::query_as::<_, NotificationPreference>(
            r#"
            INSERT INTO notification_preferences (user_id, in_app_enabled, email_enabled, muted_kinds, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE
            SET in_app_enabled = EXCLUDED.in_app_enabled,
                email_enabled = EXCLUDED.email_enabled,
                muted_kinds = EXCLUDED.muted_kinds,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#
        )
        .bind(prefs.user_id)
        .bind(prefs.in_app_enabled)
        .bind(prefs.email_enabled)
        .bind(&prefs.muted_kinds)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }
}
