//! Follow repository implementation

use sqlx::PgPool;
use chrono::Utc;
use uuid::Uuid;
use crate::models::follow::{Follow, FollowTarget};
use crate::utils::errors::CoopError;

#[derive(Clone, Debug)]
pub struct FollowRepository {
    pool: PgPool,
}

impl FollowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Follow a target; following twice returns the existing row
    pub async fn follow(&self, follower_id: Uuid, kind: FollowTarget, target_id: Uuid) -> Result<Follow, CoopError> {
        let follow = sqlx::query_as::<_, Follow>(
            r#"
            INSERT INTO follows (id, follower_id, target_kind, target_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (follower_id, target_kind, target_id) DO UPDATE SET follower_id = EXCLUDED.follower_id
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(follower_id)
        .bind(kind)
        .bind(target_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(follow)
    }

    pub async fn unfollow(&self, follower_id: Uuid, kind: FollowTarget, target_id: Uuid) -> Result<bool, CoopError> {
        let result = sqlx::query(
            "DELETE FROM follows WHERE follower_id = $1 AND target_kind = $2 AND target_id = $3"
        )
        .bind(follower_id)
        .bind(kind)
        .bind(target_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn following(&self, follower_id: Uuid, kind: Option<FollowTarget>) -> Result<Vec<Follow>, CoopError> {
        let follows = sqlx::query_as::<_, Follow>(
            r#"
            SELECT * FROM follows
            WHERE follower_id = $1 AND ($2::follow_target IS NULL OR target_kind = $2)
            ORDER BY created_at DESC
            "#
        )
        .bind(follower_id)
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        Ok(follows)
    }

    /// Who follows the given user
    pub async fn followers(&self, user_id: Uuid) -> Result<Vec<Follow>, CoopError> {
        let follows = sqlx::query_as::<_, Follow>(
            "SELECT * FROM follows WHERE target_kind = 'user' AND target_id = $1 ORDER BY created_at DESC"
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(follows)
    }

    /// Distinct followers of either the user or the substance
    pub async fn follower_ids(&self, user_id: Uuid, substance_id: Uuid) -> Result<Vec<Uuid>, CoopError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT follower_id FROM follows
            WHERE (target_kind = 'user' AND target_id = $1)
               OR (target_kind = 'substance' AND target_id = $2)
            "#
        )
        .bind(user_id)
        .bind(substance_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
