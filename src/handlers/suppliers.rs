//! Supplier and qualification handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use crate::handlers::users::StatusQuery;
use crate::models::access_request::ReviewDecision;
use crate::models::supplier::{
    CreateSupplierRequest, EligibilityReport, QualificationRequestDetail, SubmitQualificationRequest, Supplier,
};
use crate::services::AuthContext;
use crate::state::AppState;
use crate::utils::errors::Result;
use crate::utils::helpers::Pagination;

pub async fn register(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateSupplierRequest>,
) -> Result<(StatusCode, Json<Supplier>)> {
    let supplier = state.services.qualification.register_supplier(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn list(State(state): State<AppState>, _ctx: AuthContext, Query(page): Query<Pagination>) -> Result<Json<Vec<Supplier>>> {
    Ok(Json(state.services.qualification.list_suppliers(page.limit(), page.offset()).await?))
}

pub async fn get(State(state): State<AppState>, _ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<Supplier>> {
    Ok(Json(state.services.qualification.get_supplier(id).await?))
}

pub async fn eligibility(State(state): State<AppState>, _ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<EligibilityReport>> {
    Ok(Json(state.services.qualification.eligibility(id).await?))
}

pub async fn submit_qualification(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<SubmitQualificationRequest>,
) -> Result<(StatusCode, Json<QualificationRequestDetail>)> {
    let detail = state.services.qualification.submit_request(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn list_qualifications(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(page): Query<Pagination>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<QualificationRequestDetail>>> {
    let requests = state
        .services
        .qualification
        .list_requests(&ctx, query.status, page.limit(), page.offset())
        .await?;
    Ok(Json(requests))
}

pub async fn review_qualification(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(decision): Json<ReviewDecision>,
) -> Result<Json<QualificationRequestDetail>> {
    Ok(Json(state.services.qualification.review_request(&ctx, id, decision).await?))
}
