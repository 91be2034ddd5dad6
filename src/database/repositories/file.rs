//! Stored file metadata repository implementation

use sqlx::PgPool;
use chrono::Utc;
use uuid::Uuid;
use crate::models::file::StoredFile;
use crate::utils::errors::CoopError;

#[derive(Clone, Debug)]
pub struct FileRepository {
    pool: PgPool,
}

impl FileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        id: Uuid,
        owner_id: Uuid,
        original_name: &str,
        content_type: &str,
        size_bytes: i64,
        storage_path: &str,
    ) -> Result<StoredFile, CoopError> {
        let file = sqlx::query_as::<_, StoredFile>(
            r#"
            INSERT INTO stored_files (id, owner_id, original_name, content_type, size_bytes, storage_path, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#
        )
        .bind(id)
        .bind(owner_id)
        .bind(original_name)
        .bind(content_type)
        .bind(size_bytes)
        .bind(storage_path)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(file)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<StoredFile>, CoopError> {
        let file = sqlx::query_as::<_, StoredFile>("SELECT * FROM stored_files WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(file)
    }

    /// Files attached to a qualification request may be read by the reviewing staff
    pub async fn is_qualification_document(&self, id: Uuid) -> Result<bool, CoopError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM qualification_documents WHERE file_id = $1)"
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
