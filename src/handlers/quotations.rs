//! Quotation handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use crate::models::quotation::{
    CreateQuotationRequest, CreateQuotationResponseRequest, Quotation, QuotationResponse, QuotationStatus, SelectResponseRequest,
};
use crate::services::quotation::QuotationComparison;
use crate::services::AuthContext;
use crate::state::AppState;
use crate::utils::errors::Result;
use crate::utils::helpers::Pagination;

#[derive(Debug, Default, Deserialize)]
pub struct QuotationQuery {
    pub status: Option<QuotationStatus>,
}

pub async fn list(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(page): Query<Pagination>,
    Query(query): Query<QuotationQuery>,
) -> Result<Json<Vec<Quotation>>> {
    Ok(Json(state.services.quotations.list(&ctx, query.status, page.limit(), page.offset()).await?))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateQuotationRequest>,
) -> Result<(StatusCode, Json<Quotation>)> {
    let quotation = state.services.quotations.create(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(quotation)))
}

pub async fn get(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<Quotation>> {
    Ok(Json(state.services.quotations.get(&ctx, id).await?))
}

pub async fn respond(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateQuotationResponseRequest>,
) -> Result<(StatusCode, Json<QuotationResponse>)> {
    let response = state.services.quotations.respond(&ctx, id, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn comparison(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<QuotationComparison>> {
    Ok(Json(state.services.quotations.comparison(&ctx, id).await?))
}

pub async fn select(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectResponseRequest>,
) -> Result<Json<Quotation>> {
    Ok(Json(state.services.quotations.select(&ctx, id, request.response_id).await?))
}

pub async fn cancel(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<Quotation>> {
    Ok(Json(state.services.quotations.cancel(&ctx, id).await?))
}
