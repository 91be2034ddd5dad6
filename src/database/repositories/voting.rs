//! Voting repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use uuid::Uuid;
use crate::models::voting::{CreateVotingRequest, Voting, VotingBallot, VotingDecision, VotingStatus};
use crate::utils::errors::CoopError;

#[derive(Clone, Debug)]
pub struct VotingRepository {
    pool: PgPool,
}

impl VotingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, created_by: Uuid, request: CreateVotingRequest) -> Result<Voting, CoopError> {
        let voting = sqlx::query_as::<_, Voting>(
            r#"
            INSERT INTO votings (id, created_by, title, description, options, closes_at, one_vote_per_cnpj, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(created_by)
        .bind(request.title)
        .bind(request.description)
        .bind(request.options)
        .bind(request.closes_at)
        .bind(request.one_vote_per_cnpj.unwrap_or(true))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(voting)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Voting>, CoopError> {
        let voting = sqlx::query_as::<_, Voting>("SELECT * FROM votings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(voting)
    }

    pub async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<Option<Voting>, CoopError> {
        let voting = sqlx::query_as::<_, Voting>("SELECT * FROM votings WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(voting)
    }

    /// Drafts are only listed for managers
    pub async fn list(&self, include_drafts: bool, limit: i64, offset: i64) -> Result<Vec<Voting>, CoopError> {
        let votings = sqlx::query_as::<_, Voting>(
            r#"
            SELECT * FROM votings
            WHERE ($1 OR status <> 'draft')
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(include_drafts)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(votings)
    }

    pub async fn set_status(conn: &mut PgConnection, id: Uuid, status: VotingStatus) -> Result<Voting, CoopError> {
        let now = Utc::now();
        let voting = sqlx::query_as::<_, Voting>(
            r#"
            UPDATE votings
            SET status = $2,
                opens_at = CASE WHEN $2 = 'open'::voting_status THEN $3 ELSE opens_at END,
                closes_at = CASE WHEN $2 = 'closed'::voting_status THEN LEAST(COALESCE(closes_at, $3), $3) ELSE closes_at END,
                updated_at = $3
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(status)
        .bind(now)
        .fetch_one(conn)
        .await?;

        Ok(voting)
    }

    pub async fn user_has_voted(conn: &mut PgConnection, voting_id: Uuid, user_id: Uuid) -> Result<bool, CoopError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM voting_ballots WHERE voting_id = $1 AND user_id = $2)"
        )
        .bind(voting_id)
        .bind(user_id)
        .fetch_one(conn)
        .await?;

        Ok(exists)
    }

    pub async fn cnpj_has_voted(conn: &mut PgConnection, voting_id: Uuid, cnpj: &str) -> Result<bool, CoopError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM voting_ballots WHERE voting_id = $1 AND cnpj = $2)"
        )
        .bind(voting_id)
        .bind(cnpj)
        .fetch_one(conn)
        .await?;

        Ok(exists)
    }

    pub async fn insert_ballot(conn: &mut PgConnection, voting_id: Uuid, user_id: Uuid, cnpj: Option<&str>, option_index: i32) -> Result<VotingBallot, CoopError> {
        let ballot = sqlx::query_as::<_, VotingBallot>(
            r#"
            INSERT INTO voting_ballots (id, voting_id, user_id, cnpj, option_index, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(voting_id)
        .bind(user_id)
        .bind(cnpj)
        .bind(option_index)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(ballot)
    }

    /// Ballot count per option index
    pub async fn counts(conn: &mut PgConnection, voting_id: Uuid) -> Result<Vec<(i32, i64)>, CoopError> {
        let counts: Vec<(i32, i64)> = sqlx::query_as(
            "SELECT option_index, COUNT(*) FROM voting_ballots WHERE voting_id = $1 GROUP BY option_index"
        )
        .bind(voting_id)
        .fetch_all(conn)
        .await?;

        Ok(counts)
    }

    pub async fn insert_decision(
        conn: &mut PgConnection,
        voting_id: Uuid,
        winning_option: Option<i32>,
        tally: serde_json::Value,
        decided_by: Uuid,
        notes: Option<String>,
    ) -> Result<VotingDecision, CoopError> {
        let decision = sqlx::query_as::<_, VotingDecision>(
            r#"
            INSERT INTO voting_decisions (id, voting_id, winning_option, tally, decided_by, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(voting_id)
        .bind(winning_option)
        .bind(tally)
        .bind(decided_by)
        .bind(notes)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(decision)
    }

    pub async fn find_decision(&self, voting_id: Uuid) -> Result<Option<VotingDecision>, CoopError> {
        let decision = sqlx::query_as::<_, VotingDecision>("SELECT * FROM voting_decisions WHERE voting_id = $1")
            .bind(voting_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(decision)
    }
}
