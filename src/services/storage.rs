//! Uploaded file storage
//!
//! Bytes live on local disk under the configured upload directory; metadata
//! lives in `stored_files`.

use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;
use crate::config::StorageConfig;
use crate::database::DatabaseService;
use crate::models::file::StoredFile;
use crate::models::user::UserRole;
use crate::services::auth::AuthContext;
use crate::utils::errors::{CoopError, Result};
use crate::utils::helpers::sanitize_filename;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// On-disk name for an upload
pub fn storage_file_name(id: Uuid, original_name: &str) -> String {
    format!("{}_{}", id, sanitize_filename(original_name))
}

fn check_size(size: usize, max: usize) -> Result<()> {
    if size == 0 {
        return Err(CoopError::InvalidInput("Uploaded file is empty".to_string()));
    }
    if size > max {
        return Err(CoopError::InvalidInput(format!("File exceeds the {} byte limit", max)));
    }
    Ok(())
}

#[derive(Clone)]
pub struct StorageService {
    db: DatabaseService,
    config: StorageConfig,
}

impl StorageService {
    pub fn new(db: DatabaseService, config: StorageConfig) -> Self {
        Self { db, config }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.config.max_upload_bytes
    }

    pub async fn store(&self, ctx: &AuthContext, original_name: &str, content_type: Option<&str>, bytes: &[u8]) -> Result<StoredFile> {
        check_size(bytes.len(), self.config.max_upload_bytes)?;

        let id = Uuid::new_v4();
        let dir = PathBuf::from(&self.config.upload_dir);
        fs::create_dir_all(&dir).await?;
        let path = dir.join(storage_file_name(id, original_name));
        fs::write(&path, bytes).await?;
        debug!(path = %path.display(), "Upload written to disk");

        let size = i64::try_from(bytes.len()).map_err(|_| CoopError::InvalidInput("File too large".to_string()))?;
        let stored = self
            .db
            .files
            .create(
                id,
                ctx.user_id,
                original_name,
                content_type.filter(|c| !c.is_empty()).unwrap_or(DEFAULT_CONTENT_TYPE),
                size,
                &path.to_string_lossy(),
            )
            .await;

        match stored {
            Ok(file) => {
                info!(file_id = %file.id, owner = %ctx.user_id, size = file.size_bytes, "File stored");
                Ok(file)
            }
            Err(e) => {
                // metadata insert failed; drop the orphan bytes
                let _ = fs::remove_file(&path).await;
                Err(e)
            }
        }
    }

    /// Owner and master may read any file; cooperativa may read qualification documents
    async fn can_read(&self, ctx: &AuthContext, file: &StoredFile) -> Result<bool> {
        if file.owner_id == ctx.user_id || ctx.is_master() {
            return Ok(true);
        }
        if ctx.role == UserRole::Cooperativa {
            return self.db.files.is_qualification_document(file.id).await;
        }
        Ok(false)
    }

    pub async fn open(&self, ctx: &AuthContext, id: Uuid) -> Result<(StoredFile, Vec<u8>)> {
        let file = self
            .db
            .files
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoopError::not_found("file", id))?;

        if !self.can_read(ctx, &file).await? {
            return Err(CoopError::PermissionDenied("You cannot access this file".to_string()));
        }

        let bytes = match fs::read(&file.storage_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(CoopError::not_found("file", id)),
            Err(e) => return Err(e.into()),
        };
        Ok((file, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_file_name() {
        let id = Uuid::nil();
        assert_eq!(
            storage_file_name(id, "../alvará sanitário.pdf"),
            "00000000-0000-0000-0000-000000000000__alvará_sanitário.pdf"
        );
    }

    #[test]
    fn test_size_limits() {
        assert!(check_size(0, 10).is_err());
        assert!(check_size(10, 10).is_ok());
        assert!(check_size(11, 10).is_err());
    }
}
