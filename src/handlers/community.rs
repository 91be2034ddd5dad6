//! Transparency, voting and follow handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;
use crate::models::follow::{Follow, FollowFilter, FollowTarget};
use crate::models::transparency::{CreateNewsRequest, TransparencyNews, UpdateNewsRequest};
use crate::models::voting::{CastVoteRequest, CloseVotingRequest, CreateVotingRequest, Voting, VotingBallot, VotingDecision, VotingResults};
use crate::services::AuthContext;
use crate::state::AppState;
use crate::utils::errors::{CoopError, Result};
use crate::utils::helpers::Pagination;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedVoting {
    pub decision: VotingDecision,
    pub results: VotingResults,
}

// Transparency news

pub async fn list_news(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<TransparencyNews>>> {
    Ok(Json(state.services.transparency.list(&ctx, page.limit(), page.offset()).await?))
}

pub async fn create_news(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateNewsRequest>,
) -> Result<(StatusCode, Json<TransparencyNews>)> {
    let news = state.services.transparency.create(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(news)))
}

pub async fn update_news(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateNewsRequest>,
) -> Result<Json<TransparencyNews>> {
    Ok(Json(state.services.transparency.update(&ctx, id, request).await?))
}

pub async fn publish_news(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<TransparencyNews>> {
    Ok(Json(state.services.transparency.set_published(&ctx, id, true).await?))
}

pub async fn unpublish_news(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<TransparencyNews>> {
    Ok(Json(state.services.transparency.set_published(&ctx, id, false).await?))
}

// Voting

pub async fn list_votings(State(state): State<AppState>, ctx: AuthContext, Query(page): Query<Pagination>) -> Result<Json<Vec<Voting>>> {
    Ok(Json(state.services.voting.list(&ctx, page.limit(), page.offset()).await?))
}

pub async fn create_voting(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateVotingRequest>,
) -> Result<(StatusCode, Json<Voting>)> {
    let voting = state.services.voting.create(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(voting)))
}

pub async fn get_voting(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<Voting>> {
    Ok(Json(state.services.voting.get(&ctx, id).await?))
}

pub async fn open_voting(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<Voting>> {
    Ok(Json(state.services.voting.open(&ctx, id).await?))
}

pub async fn close_voting(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    body: Option<Json<CloseVotingRequest>>,
) -> Result<Json<ClosedVoting>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let (decision, results) = state.services.voting.close(&ctx, id, request).await?;
    Ok(Json(ClosedVoting { decision, results }))
}

pub async fn vote(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<CastVoteRequest>,
) -> Result<(StatusCode, Json<VotingBallot>)> {
    let ballot = state.services.voting.vote(&ctx, id, request.option_index).await?;
    Ok((StatusCode::CREATED, Json(ballot)))
}

pub async fn voting_results(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<Json<VotingResults>> {
    Ok(Json(state.services.voting.results(&ctx, id).await?))
}

// Follow

fn parse_target(kind: &str) -> Result<FollowTarget> {
    kind.parse().map_err(CoopError::InvalidInput)
}

pub async fn follow(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<(StatusCode, Json<Follow>)> {
    let follow = state.services.follows.follow(&ctx, parse_target(&kind)?, id).await?;
    Ok((StatusCode::CREATED, Json(follow)))
}

pub async fn unfollow(State(state): State<AppState>, ctx: AuthContext, Path((kind, id)): Path<(String, Uuid)>) -> Result<StatusCode> {
    state.services.follows.unfollow(&ctx, parse_target(&kind)?, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn following(State(state): State<AppState>, ctx: AuthContext, Query(filter): Query<FollowFilter>) -> Result<Json<Vec<Follow>>> {
    Ok(Json(state.services.follows.following(&ctx, filter.kind).await?))
}

pub async fn followers(State(state): State<AppState>, ctx: AuthContext) -> Result<Json<Vec<Follow>>> {
    Ok(Json(state.services.follows.followers(&ctx).await?))
}
