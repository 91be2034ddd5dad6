//! System settings and file handlers

use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;
use crate::models::file::StoredFile;
use crate::models::setting::{SystemSetting, UpdateSettingRequest};
use crate::services::AuthContext;
use crate::state::AppState;
use crate::utils::errors::{CoopError, Result};
use crate::utils::helpers::sanitize_filename;
use crate::utils::logging::log_admin_action;

/// Multipart field carrying the upload
pub const FILE_FIELD: &str = "file";

const MAX_KEY_LENGTH: usize = 100;

/// Setting keys are dotted lowercase identifiers such as `marketplace.fee_percent`
pub fn is_valid_setting_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_LENGTH
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
}

pub async fn list_settings(State(state): State<AppState>, _ctx: AuthContext) -> Result<Json<Vec<SystemSetting>>> {
    Ok(Json(state.db.settings.list().await?))
}

pub async fn get_setting(State(state): State<AppState>, _ctx: AuthContext, Path(key): Path<String>) -> Result<Json<SystemSetting>> {
    let setting = state
        .db
        .settings
        .get(&key)
        .await?
        .ok_or_else(|| CoopError::not_found("setting", &key))?;
    Ok(Json(setting))
}

pub async fn put_setting(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(key): Path<String>,
    Json(request): Json<UpdateSettingRequest>,
) -> Result<Json<SystemSetting>> {
    ctx.require_master()?;
    if !is_valid_setting_key(&key) {
        return Err(CoopError::InvalidInput(format!("Invalid setting key: {}", key)));
    }

    let setting = state.db.settings.upsert(&key, request.value, ctx.user_id).await?;
    log_admin_action(ctx.user_id, "update_setting", Some(&key), None);
    Ok(Json(setting))
}

/// `POST /api/files`: multipart with a single `file` field
pub async fn upload(
    State(state): State<AppState>,
    ctx: AuthContext,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoredFile>)> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;

        let stored = state
            .services
            .storage
            .store(&ctx, &original_name, content_type.as_deref(), &bytes)
            .await?;
        return Ok((StatusCode::CREATED, Json(stored)));
    }

    Err(CoopError::InvalidInput(format!("Missing multipart field '{}'", FILE_FIELD)))
}

pub async fn download(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<impl IntoResponse> {
    let (file, bytes) = state.services.storage.open(&ctx, id).await?;
    let disposition = format!("attachment; filename=\"{}\"", sanitize_filename(&file.original_name));

    Ok((
        [(CONTENT_TYPE, file.content_type), (CONTENT_DISPOSITION, disposition)],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_keys() {
        assert!(is_valid_setting_key("marketplace.fee_percent"));
        assert!(is_valid_setting_key("reserve.default_days"));
        assert!(!is_valid_setting_key(""));
        assert!(!is_valid_setting_key("Marketplace Fee"));
        assert!(!is_valid_setting_key(&"a".repeat(MAX_KEY_LENGTH + 1)));
    }
}
