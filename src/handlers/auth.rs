//! Authentication and account handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use crate::models::user::{ChangePasswordRequest, LoginRequest, LoginResponse, UpdateProfileRequest, User};
use crate::services::AuthContext;
use crate::state::AppState;
use crate::utils::errors::Result;

pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<LoginResponse>> {
    Ok(Json(state.services.auth.login(request).await?))
}

pub async fn me(State(state): State<AppState>, ctx: AuthContext) -> Result<Json<User>> {
    Ok(Json(state.services.auth.me(&ctx).await?))
}

pub async fn change_password(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode> {
    state.services.auth.change_password(&ctx, request).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_profile(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    Ok(Json(state.services.users.update_profile(&ctx, request).await?))
}
