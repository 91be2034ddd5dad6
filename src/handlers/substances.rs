//! Substance catalog and raw material handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use crate::handlers::users::StatusQuery;
use crate::models::access_request::ReviewDecision;
use crate::models::raw_material::{CreateRawMaterialRequest, RawMaterial, UpdateRawMaterialRequest};
use crate::models::substance::{
    CreateSubstanceRequest, CreateSubstanceRequestInput, Substance, SubstanceRequest, SubstanceSearch, UpdateSubstanceRequest,
};
use crate::services::AuthContext;
use crate::state::AppState;
use crate::utils::errors::Result;
use crate::utils::helpers::Pagination;

pub async fn search(
    State(state): State<AppState>,
    _ctx: AuthContext,
    Query(page): Query<Pagination>,
    Query(search): Query<SubstanceSearch>,
) -> Result<Json<Vec<Substance>>> {
    Ok(Json(state.services.substances.search(&search, page.limit(), page.offset()).await?))
}

pub async fn get(State(state): State<AppState>, _ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<Substance>> {
    Ok(Json(state.services.substances.get(id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateSubstanceRequest>,
) -> Result<(StatusCode, Json<Substance>)> {
    let substance = state.services.substances.create(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(substance)))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateSubstanceRequest>,
) -> Result<Json<Substance>> {
    Ok(Json(state.services.substances.update(&ctx, id, request).await?))
}

pub async fn request_substance(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(input): Json<CreateSubstanceRequestInput>,
) -> Result<(StatusCode, Json<SubstanceRequest>)> {
    let request = state.services.substances.request_substance(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_requests(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(page): Query<Pagination>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<SubstanceRequest>>> {
    let requests = state
        .services
        .substances
        .list_requests(&ctx, query.status, page.limit(), page.offset())
        .await?;
    Ok(Json(requests))
}

pub async fn review_request(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(decision): Json<ReviewDecision>,
) -> Result<Json<SubstanceRequest>> {
    Ok(Json(state.services.substances.review_request(&ctx, id, decision).await?))
}

// Raw materials

pub async fn list_raw_materials(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<RawMaterial>>> {
    Ok(Json(state.services.inventory.list(&ctx, page.limit(), page.offset()).await?))
}

pub async fn get_raw_material(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<RawMaterial>> {
    Ok(Json(state.services.inventory.get(&ctx, id).await?))
}

pub async fn create_raw_material(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateRawMaterialRequest>,
) -> Result<(StatusCode, Json<RawMaterial>)> {
    let material = state.services.inventory.create(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(material)))
}

pub async fn update_raw_material(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRawMaterialRequest>,
) -> Result<Json<RawMaterial>> {
    Ok(Json(state.services.inventory.update(&ctx, id, request).await?))
}

pub async fn delete_raw_material(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<StatusCode> {
    state.services.inventory.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
