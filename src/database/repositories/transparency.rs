//! Transparency news repository implementation

use sqlx::PgPool;
use chrono::Utc;
use uuid::Uuid;
use crate::models::transparency::{CreateNewsRequest, TransparencyNews, UpdateNewsRequest};
use crate::utils::errors::CoopError;

#[derive(Clone, Debug)]
pub struct NewsRepository {
    pool: PgPool,
}

impl NewsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, author_id: Uuid, request: CreateNewsRequest) -> Result<TransparencyNews, CoopError> {
        let now = Utc::now();
        let news = sqlx::query_as::<_, TransparencyNews>(
            r#"
            INSERT INTO transparency_news (id, author_id, title, body, category, is_published, published_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(author_id)
        .bind(request.title)
        .bind(request.body)
        .bind(request.category)
        .bind(request.publish)
        .bind(request.publish.then_some(now))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(news)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<TransparencyNews>, CoopError> {
        let news = sqlx::query_as::<_, TransparencyNews>("SELECT * FROM transparency_news WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(news)
    }

    /// Published news only unless `include_drafts`
    pub async fn list(&self, include_drafts: bool, limit: i64, offset: i64) -> Result<Vec<TransparencyNews>, CoopError> {
        let news = sqlx::query_as::<_, TransparencyNews>(
            r#"
            SELECT * FROM transparency_news
            WHERE ($1 OR is_published)
            ORDER BY COALESCE(published_at, created_at) DESC
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(include_drafts)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(news)
    }

    pub async fn update(&self, id: Uuid, request: UpdateNewsRequest) -> Result<TransparencyNews, CoopError> {
        let news = sqlx::query_as::<_, TransparencyNews>(
            r#"
            UPDATE transparency_news
            SET title = COALESCE($2, title),
                body = COALESCE($3, body),
                category = COALESCE($4, category),
                updated_at = $5
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(request.title)
        .bind(request.body)
        .bind(request.category)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        news.ok_or_else(|| CoopError::not_found("news", id))
    }

    pub async fn set_published(&self, id: Uuid, published: bool) -> Result<TransparencyNews, CoopError> {
        let now = Utc::now();
        let news = sqlx::query_as::<_, TransparencyNews>(
            r#"
            UPDATE transparency_news
            SET is_published = $2,
                published_at = CASE WHEN $2 THEN COALESCE(published_at, $3) ELSE NULL END,
                updated_at = $3
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(published)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        news.ok_or_else(|| CoopError::not_found("news", id))
    }
}
