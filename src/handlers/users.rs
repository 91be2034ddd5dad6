//! User, role and access request handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::models::access_request::{AccessRequest, CreateAccessRequest, RequestStatus};
use crate::models::role::{CooperativeRole, CreateRoleRequest, UpdateRoleRequest};
use crate::models::user::{CreateUserRequest, UpdateUserRequest, User, UserRole};
use crate::services::AuthContext;
use crate::state::AppState;
use crate::utils::errors::Result;
use crate::utils::helpers::Pagination;

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub role: Option<UserRole>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReviewNotes {
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedAccess {
    pub request: AccessRequest,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct PermissionList {
    pub permissions: Vec<String>,
}

pub async fn list_users(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(page): Query<Pagination>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<User>>> {
    let users = state.services.users.list_users(&ctx, query.role, page.limit(), page.offset()).await?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = state.services.users.create_user(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<User>> {
    Ok(Json(state.services.users.get_user(&ctx, id).await?))
}

pub async fn user_roles(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<Vec<CooperativeRole>>> {
    Ok(Json(state.services.users.roles_for(&ctx, id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<User>> {
    Ok(Json(state.services.users.update_user(&ctx, id, request).await?))
}

pub async fn deactivate_user(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<User>> {
    Ok(Json(state.services.users.deactivate_user(&ctx, id).await?))
}

// Access requests

pub async fn submit_access_request(
    State(state): State<AppState>,
    Json(request): Json<CreateAccessRequest>,
) -> Result<(StatusCode, Json<AccessRequest>)> {
    let request = state.services.users.submit_access_request(request).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_access_requests(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(page): Query<Pagination>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<AccessRequest>>> {
    let requests = state
        .services
        .users
        .list_access_requests(&ctx, query.status, page.limit(), page.offset())
        .await?;
    Ok(Json(requests))
}

pub async fn approve_access_request(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(body): Json<ReviewNotes>,
) -> Result<Json<ApprovedAccess>> {
    let (request, user) = state.services.users.approve_access_request(&ctx, id, body.notes).await?;
    Ok(Json(ApprovedAccess { request, user }))
}

pub async fn reject_access_request(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(body): Json<ReviewNotes>,
) -> Result<Json<AccessRequest>> {
    Ok(Json(state.services.users.reject_access_request(&ctx, id, body.notes).await?))
}

// Cooperative roles

pub async fn list_roles(State(state): State<AppState>, _ctx: AuthContext) -> Result<Json<Vec<CooperativeRole>>> {
    Ok(Json(state.services.users.list_roles().await?))
}

pub async fn create_role(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<CooperativeRole>)> {
    let role = state.services.users.create_role(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn update_role(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<CooperativeRole>> {
    Ok(Json(state.services.users.update_role(&ctx, id, request).await?))
}

pub async fn delete_role(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<StatusCode> {
    state.services.users.delete_role(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_role(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((role_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    state.services.users.assign_role(&ctx, role_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unassign_role(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((role_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    state.services.users.unassign_role(&ctx, role_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn my_permissions(State(state): State<AppState>, ctx: AuthContext) -> Result<Json<PermissionList>> {
    let permissions = state.services.auth.permissions(&ctx).await?;
    Ok(Json(PermissionList { permissions }))
}
