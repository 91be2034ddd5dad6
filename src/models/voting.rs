//! Voting models and tallying

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;
use crate::utils::errors::{CoopError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "voting_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VotingStatus {
    Draft,
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Voting {
    pub id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub options: Vec<String>,
    pub opens_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
    pub status: VotingStatus,
    pub one_vote_per_cnpj: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Voting {
    pub fn accepts_ballots(&self, now: DateTime<Utc>) -> bool {
        self.status == VotingStatus::Open && self.closes_at.map(|c| now < c).unwrap_or(true)
    }

    pub fn validate_option(&self, option_index: i32) -> Result<()> {
        if option_index < 0 || option_index as usize >= self.options.len() {
            return Err(CoopError::InvalidInput(format!(
                "Option index must be between 0 and {}",
                self.options.len().saturating_sub(1)
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVotingRequest {
    pub title: String,
    pub description: Option<String>,
    pub options: Vec<String>,
    pub closes_at: Option<DateTime<Utc>>,
    pub one_vote_per_cnpj: Option<bool>,
}

impl CreateVotingRequest {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(CoopError::InvalidInput("Title is required".to_string()));
        }
        let options: Vec<&String> = self.options.iter().filter(|o| !o.trim().is_empty()).collect();
        if options.len() < 2 {
            return Err(CoopError::InvalidInput("A voting needs at least two options".to_string()));
        }
        if options.len() != self.options.len() {
            return Err(CoopError::InvalidInput("Options cannot be blank".to_string()));
        }
        if let Some(closes_at) = self.closes_at {
            if closes_at <= now {
                return Err(CoopError::InvalidInput("Closing date must be in the future".to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VotingBallot {
    pub id: Uuid,
    pub voting_id: Uuid,
    pub user_id: Uuid,
    pub cnpj: Option<String>,
    pub option_index: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    pub option_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VotingDecision {
    pub id: Uuid,
    pub voting_id: Uuid,
    pub winning_option: Option<i32>,
    pub tally: serde_json::Value,
    pub decided_by: Uuid,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseVotingRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionTally {
    pub index: i32,
    pub option: String,
    pub votes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingResults {
    pub voting_id: Uuid,
    pub status: VotingStatus,
    pub total_votes: i64,
    pub tally: Vec<OptionTally>,
    pub winning_option: Option<i32>,
}

/// Count ballots per option. Ties go to the lowest index; no votes means no winner.
pub fn tally_votes(voting: &Voting, counts: &[(i32, i64)]) -> VotingResults {
    let tally: Vec<OptionTally> = voting
        .options
        .iter()
        .enumerate()
        .map(|(index, option)| {
            let index = index as i32;
            let votes = counts
                .iter()
                .filter(|(i, _)| *i == index)
                .map(|(_, c)| *c)
                .sum();
            OptionTally { index, option: option.clone(), votes }
        })
        .collect();

    let total_votes = tally.iter().map(|t| t.votes).sum();
    let winning_option = tally
        .iter()
        .filter(|t| t.votes > 0)
        .fold(None::<&OptionTally>, |best, t| match best {
            Some(b) if b.votes >= t.votes => Some(b),
            _ => Some(t),
        })
        .map(|t| t.index);

    VotingResults {
        voting_id: voting.id,
        status: voting.status,
        total_votes,
        tally,
        winning_option,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voting(options: &[&str]) -> Voting {
        Voting {
            id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            title: "Assembleia".to_string(),
            description: None,
            options: options.iter().map(|s| s.to_string()).collect(),
            opens_at: None,
            closes_at: None,
            status: VotingStatus::Open,
            one_vote_per_cnpj: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_tally_winner() {
        let v = voting(&["Sim", "Não", "Abstenção"]);
        let results = tally_votes(&v, &[(0, 3), (1, 5), (2, 1)]);
        assert_eq!(results.total_votes, 9);
        assert_eq!(results.winning_option, Some(1));
        assert_eq!(results.tally[2].votes, 1);
    }

    #[test]
    fn test_tie_goes_to_lowest_index() {
        let v = voting(&["A", "B"]);
        let results = tally_votes(&v, &[(1, 4), (0, 4)]);
        assert_eq!(results.winning_option, Some(0));
    }

    #[test]
    fn test_no_votes_no_winner() {
        let v = voting(&["A", "B"]);
        let results = tally_votes(&v, &[]);
        assert_eq!(results.total_votes, 0);
        assert_eq!(results.winning_option, None);
    }

    #[test]
    fn test_option_and_request_validation() {
        let v = voting(&["A", "B"]);
        assert!(v.validate_option(1).is_ok());
        assert!(v.validate_option(2).is_err());
        assert!(v.validate_option(-1).is_err());

        let now = Utc::now();
        let request = CreateVotingRequest {
            title: "Reforma".into(),
            description: None,
            options: vec!["Sim".into()],
            closes_at: None,
            one_vote_per_cnpj: None,
        };
        assert!(request.validate(now).is_err());
    }
}
