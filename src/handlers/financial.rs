//! Financial ledger handlers

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use crate::models::financial::{Balance, CreateMovementRequest, FinancialMovement, FinancialSummary, MovementFilter};
use crate::services::AuthContext;
use crate::state::AppState;
use crate::utils::errors::Result;
use crate::utils::helpers::Pagination;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerQuery {
    pub user_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub async fn list_movements(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(page): Query<Pagination>,
    Query(filter): Query<MovementFilter>,
) -> Result<Json<Vec<FinancialMovement>>> {
    Ok(Json(state.services.financial.list(&ctx, filter, page.limit(), page.offset()).await?))
}

pub async fn record_movement(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateMovementRequest>,
) -> Result<(StatusCode, Json<FinancialMovement>)> {
    let movement = state.services.financial.record(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

pub async fn balance(State(state): State<AppState>, ctx: AuthContext, Query(query): Query<LedgerQuery>) -> Result<Json<Balance>> {
    Ok(Json(state.services.financial.balance(&ctx, query.user_id).await?))
}

pub async fn summary(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<FinancialSummary>> {
    Ok(Json(state.services.financial.summary(&ctx, query.user_id, query.from, query.to).await?))
}
