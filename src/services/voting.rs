//! Cooperative voting service

use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use crate::database::DatabaseService;
use crate::database::repositories::VotingRepository;
use crate::models::notification::{Audience, NotificationEvent};
use crate::models::role::PERM_VOTING_MANAGE;
use crate::models::user::UserRole;
use crate::models::voting::{
    tally_votes, CloseVotingRequest, CreateVotingRequest, Voting, VotingBallot, VotingDecision, VotingResults, VotingStatus,
};
use crate::services::auth::{AuthContext, AuthService};
use crate::services::notification::NotificationService;
use crate::utils::errors::{CoopError, Result};
use crate::utils::logging::{log_admin_action, log_user_action};

#[derive(Clone)]
pub struct VotingService {
    db: DatabaseService,
    auth: AuthService,
    notifications: NotificationService,
}

impl VotingService {
    pub fn new(db: DatabaseService, auth: AuthService, notifications: NotificationService) -> Self {
        Self { db, auth, notifications }
    }

    async fn is_manager(&self, ctx: &AuthContext) -> Result<bool> {
        self.auth.has_permission(ctx, PERM_VOTING_MANAGE).await
    }

    pub async fn create(&self, ctx: &AuthContext, mut request: CreateVotingRequest) -> Result<Voting> {
        self.auth.require_permission(ctx, PERM_VOTING_MANAGE).await?;
        request.validate(Utc::now())?;
        request.title = request.title.trim().to_string();
        request.options = request.options.iter().map(|o| o.trim().to_string()).collect();

        let voting = self.db.votings.create(ctx.user_id, request).await?;
        log_admin_action(ctx.user_id, "create_voting", Some(&voting.id.to_string()), Some(&voting.title));
        Ok(voting)
    }

    /// Drafts are hidden from everyone but managers
    pub async fn list(&self, ctx: &AuthContext, limit: i64, offset: i64) -> Result<Vec<Voting>> {
        let include_drafts = self.is_manager(ctx).await?;
        self.db.votings.list(include_drafts, limit, offset).await
    }

    pub async fn get(&self, ctx: &AuthContext, id: Uuid) -> Result<Voting> {
        let voting = self
            .db
            .votings
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoopError::not_found("voting", id))?;
        if voting.status == VotingStatus::Draft && !self.is_manager(ctx).await? {
            return Err(CoopError::not_found("voting", id));
        }
        Ok(voting)
    }

    pub async fn open(&self, ctx: &AuthContext, id: Uuid) -> Result<Voting> {
        self.auth.require_permission(ctx, PERM_VOTING_MANAGE).await?;

        let mut tx = self.db.begin().await?;
        let voting = VotingRepository::lock(&mut tx, id)
            .await?
            .ok_or_else(|| CoopError::not_found("voting", id))?;
        if voting.status != VotingStatus::Draft {
            return Err(CoopError::BusinessRule("Only draft votings can be opened".to_string()));
        }
        if voting.closes_at.map(|c| c <= Utc::now()).unwrap_or(false) {
            return Err(CoopError::BusinessRule("Voting closing date has already passed".to_string()));
        }
        let opened = VotingRepository::set_status(&mut tx, id, VotingStatus::Open).await?;
        tx.commit().await?;

        log_admin_action(ctx.user_id, "open_voting", Some(&id.to_string()), None);

        self.notifications.dispatch(
            NotificationEvent::new(
                "voting.opened",
                format!("Voting open: {}", opened.title),
                "A new cooperative voting is open",
                Audience::Role(UserRole::Cooperado),
            )
            .with_link(format!("/voting/{}", id)),
        );

        Ok(opened)
    }

    /// Close the voting and record the decision with its tally
    pub async fn close(&self, ctx: &AuthContext, id: Uuid, request: CloseVotingRequest) -> Result<(VotingDecision, VotingResults)> {
        self.auth.require_permission(ctx, PERM_VOTING_MANAGE).await?;

        let mut tx = self.db.begin().await?;
        let voting = VotingRepository::lock(&mut tx, id)
            .await?
            .ok_or_else(|| CoopError::not_found("voting", id))?;
        if voting.status != VotingStatus::Open {
            return Err(CoopError::BusinessRule("Only open votings can be closed".to_string()));
        }

        let closed = VotingRepository::set_status(&mut tx, id, VotingStatus::Closed).await?;
        let counts = VotingRepository::counts(&mut tx, id).await?;
        let results = tally_votes(&closed, &counts);
        let decision = VotingRepository::insert_decision(
            &mut tx,
            id,
            results.winning_option,
            serde_json::to_value(&results.tally)?,
            ctx.user_id,
            request.notes,
        )
        .await?;
        tx.commit().await?;

        info!(voting_id = %id, total_votes = results.total_votes, winner = ?results.winning_option, "Voting closed");
        log_admin_action(ctx.user_id, "close_voting", Some(&id.to_string()), None);

        Ok((decision, results))
    }

    /// Cast a ballot; one per user, or one per CNPJ when the voting says so
    pub async fn vote(&self, ctx: &AuthContext, id: Uuid, option_index: i32) -> Result<VotingBallot> {
        ctx.require_role(&[UserRole::Cooperado])?;
        let cnpj = ctx.cnpj.as_deref().filter(|c| !c.is_empty());

        let mut tx = self.db.begin().await?;
        let voting = VotingRepository::lock(&mut tx, id)
            .await?
            .ok_or_else(|| CoopError::not_found("voting", id))?;
        if !voting.accepts_ballots(Utc::now()) {
            return Err(CoopError::BusinessRule("Voting is not open".to_string()));
        }
        voting.validate_option(option_index)?;

        if VotingRepository::user_has_voted(&mut tx, id, ctx.user_id).await? {
            return Err(CoopError::Conflict("You already voted".to_string()));
        }
        if voting.one_vote_per_cnpj {
            let cnpj = cnpj.ok_or_else(|| CoopError::PermissionDenied("A CNPJ is required to vote".to_string()))?;
            if VotingRepository::cnpj_has_voted(&mut tx, id, cnpj).await? {
                return Err(CoopError::Conflict("Your CNPJ already voted".to_string()));
            }
        }

        let ballot = VotingRepository::insert_ballot(&mut tx, id, ctx.user_id, cnpj, option_index).await?;
        tx.commit().await?;

        log_user_action(ctx.user_id, "vote", Some(&id.to_string()));
        Ok(ballot)
    }

    /// Results once closed; managers may peek at any time
    pub async fn results(&self, ctx: &AuthContext, id: Uuid) -> Result<VotingResults> {
        let voting = self.get(ctx, id).await?;
        if voting.status != VotingStatus::Closed && !self.is_manager(ctx).await? {
            return Err(CoopError::PermissionDenied("Results are available after the voting closes".to_string()));
        }

        let mut conn = self.db.pool().acquire().await?;
        let counts = VotingRepository::counts(&mut conn, id).await?;
        Ok(tally_votes(&voting, &counts))
    }

    pub async fn decision(&self, ctx: &AuthContext, id: Uuid) -> Result<Option<VotingDecision>> {
        self.get(ctx, id).await?;
        self.db.votings.find_decision(id).await
    }
}
