//! Marketplace handlers: offers, auctions, proposals, transactions,
//! flash deals and strategic reserves

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::models::flash_deal::{ClaimRequest, CreateFlashDealRequest, FlashDeal, FlashDealClaim, FlashDealView};
use crate::models::marketplace::{
    AuctionBid, CreateOfferRequest, CreateProposalRequest, MarketplaceOffer, OfferFilter, PlaceBidRequest, Proposal,
    PurchaseRequest, Transaction, UpdateTransactionStatusRequest,
};
use crate::models::reserve::{CreateReserveQuotaRequest, QuotaStatus, StrategicReserveClaim, StrategicReserveQuota};
use crate::services::flash_deal::FlashDealReceipt;
use crate::services::reserve::ReserveReceipt;
use crate::services::AuthContext;
use crate::state::AppState;
use crate::utils::errors::Result;
use crate::utils::helpers::Pagination;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionOutcome {
    pub offer: MarketplaceOffer,
    pub transaction: Option<Transaction>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveQuery {
    pub active_only: Option<bool>,
}

// Offers

pub async fn list_offers(
    State(state): State<AppState>,
    _ctx: AuthContext,
    Query(page): Query<Pagination>,
    Query(filter): Query<OfferFilter>,
) -> Result<Json<Vec<MarketplaceOffer>>> {
    Ok(Json(state.services.marketplace.list_offers(&filter, page.limit(), page.offset()).await?))
}

pub async fn create_offer(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateOfferRequest>,
) -> Result<(StatusCode, Json<MarketplaceOffer>)> {
    let offer = state.services.marketplace.create_offer(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(offer)))
}

pub async fn get_offer(State(state): State<AppState>, _ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<MarketplaceOffer>> {
    Ok(Json(state.services.marketplace.get_offer(id).await?))
}

pub async fn cancel_offer(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<MarketplaceOffer>> {
    Ok(Json(state.services.marketplace.cancel_offer(&ctx, id).await?))
}

pub async fn buy_offer(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<Transaction>)> {
    let transaction = state.services.marketplace.buy_offer(&ctx, id, request.quantity).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn place_bid(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<PlaceBidRequest>,
) -> Result<(StatusCode, Json<AuctionBid>)> {
    let bid = state.services.marketplace.place_bid(&ctx, id, request.unit_price).await?;
    Ok((StatusCode::CREATED, Json(bid)))
}

pub async fn list_bids(State(state): State<AppState>, _ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<Vec<AuctionBid>>> {
    Ok(Json(state.services.marketplace.list_bids(id).await?))
}

pub async fn close_auction(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<AuctionOutcome>> {
    let (offer, transaction) = state.services.marketplace.close_auction(&ctx, id).await?;
    Ok(Json(AuctionOutcome { offer, transaction }))
}

// Proposals

pub async fn create_proposal(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateProposalRequest>,
) -> Result<(StatusCode, Json<Proposal>)> {
    let proposal = state.services.marketplace.create_proposal(&ctx, id, request).await?;
    Ok((StatusCode::CREATED, Json(proposal)))
}

pub async fn list_proposals(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<Vec<Proposal>>> {
    Ok(Json(state.services.marketplace.list_proposals(&ctx, id).await?))
}

pub async fn accept_proposal(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<Transaction>> {
    Ok(Json(state.services.marketplace.accept_proposal(&ctx, id).await?))
}

pub async fn reject_proposal(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<Proposal>> {
    Ok(Json(state.services.marketplace.reject_proposal(&ctx, id).await?))
}

pub async fn withdraw_proposal(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<Proposal>> {
    Ok(Json(state.services.marketplace.withdraw_proposal(&ctx, id).await?))
}

// Transactions

pub async fn list_transactions(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<Transaction>>> {
    Ok(Json(state.services.marketplace.list_transactions(&ctx, page.limit(), page.offset()).await?))
}

pub async fn get_transaction(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<Transaction>> {
    Ok(Json(state.services.marketplace.get_transaction(&ctx, id).await?))
}

pub async fn update_transaction_status(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTransactionStatusRequest>,
) -> Result<Json<Transaction>> {
    Ok(Json(state.services.marketplace.update_transaction_status(&ctx, id, request.status).await?))
}

// Flash deals

pub async fn list_flash_deals(State(state): State<AppState>, _ctx: AuthContext) -> Result<Json<Vec<FlashDealView>>> {
    Ok(Json(state.services.flash_deals.list_active().await?))
}

pub async fn create_flash_deal(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateFlashDealRequest>,
) -> Result<(StatusCode, Json<FlashDeal>)> {
    let deal = state.services.flash_deals.create(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(deal)))
}

pub async fn get_flash_deal(State(state): State<AppState>, _ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<FlashDealView>> {
    Ok(Json(state.services.flash_deals.get(id).await?))
}

pub async fn deactivate_flash_deal(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<FlashDeal>> {
    Ok(Json(state.services.flash_deals.deactivate(&ctx, id).await?))
}

pub async fn claim_flash_deal(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<ClaimRequest>,
) -> Result<(StatusCode, Json<FlashDealReceipt>)> {
    let receipt = state.services.flash_deals.claim(&ctx, id, request.quantity).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn my_flash_deal_claims(State(state): State<AppState>, ctx: AuthContext) -> Result<Json<Vec<FlashDealClaim>>> {
    Ok(Json(state.services.flash_deals.my_claims(&ctx).await?))
}

// Strategic reserves

pub async fn list_reserves(
    State(state): State<AppState>,
    _ctx: AuthContext,
    Query(query): Query<ReserveQuery>,
) -> Result<Json<Vec<StrategicReserveQuota>>> {
    Ok(Json(state.services.reserves.list(query.active_only.unwrap_or(true)).await?))
}

pub async fn create_reserve(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateReserveQuotaRequest>,
) -> Result<(StatusCode, Json<StrategicReserveQuota>)> {
    let quota = state.services.reserves.create(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(quota)))
}

pub async fn get_reserve(State(state): State<AppState>, _ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<StrategicReserveQuota>> {
    Ok(Json(state.services.reserves.get(id).await?))
}

pub async fn reserve_status(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<QuotaStatus>> {
    Ok(Json(state.services.reserves.status(&ctx, id).await?))
}

pub async fn deactivate_reserve(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<StrategicReserveQuota>> {
    Ok(Json(state.services.reserves.deactivate(&ctx, id).await?))
}

pub async fn recalculate_reserve(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<StrategicReserveQuota>> {
    Ok(Json(state.services.reserves.recalculate_share(&ctx, id).await?))
}

pub async fn claim_reserve(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<ClaimRequest>,
) -> Result<(StatusCode, Json<ReserveReceipt>)> {
    let receipt = state.services.reserves.claim(&ctx, id, request.quantity).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn my_reserve_claims(State(state): State<AppState>, ctx: AuthContext) -> Result<Json<Vec<StrategicReserveClaim>>> {
    Ok(Json(state.services.reserves.my_claims(&ctx).await?))
}
