//! Strategic reserve service
//!
//! Quotas are split equally between the CNPJs of active cooperados. All
//! users sharing a CNPJ draw from the same share.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use crate::database::DatabaseService;
use crate::database::repositories::{purchase_debit, FinancialRepository, MarketplaceRepository, ReserveRepository};
use crate::models::marketplace::{NewTransaction, Transaction, TransactionSource, TransactionStatus};
use crate::models::notification::{Audience, NotificationEvent};
use crate::models::reserve::{equal_share, CreateReserveQuotaRequest, QuotaStatus, StrategicReserveClaim, StrategicReserveQuota};
use crate::models::user::UserRole;
use crate::services::auth::AuthContext;
use crate::services::notification::NotificationService;
use crate::utils::errors::{CoopError, Result};
use crate::utils::logging::{log_admin_action, log_claim};

pub const RESERVE_CATEGORY: &str = "strategic_reserve";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveReceipt {
    pub claim: StrategicReserveClaim,
    pub transaction: Transaction,
    pub status: QuotaStatus,
}

fn participant_count(count: i64) -> Result<i32> {
    i32::try_from(count).map_err(|_| CoopError::Internal("Participant count out of range".to_string()))
}

#[derive(Clone)]
pub struct ReserveService {
    db: DatabaseService,
    notifications: NotificationService,
}

impl ReserveService {
    pub fn new(db: DatabaseService, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    pub async fn create(&self, ctx: &AuthContext, request: CreateReserveQuotaRequest) -> Result<StrategicReserveQuota> {
        ctx.require_role(&[UserRole::Cooperativa])?;
        request.validate()?;

        let substance = self
            .db
            .substances
            .find_by_id(request.substance_id)
            .await?
            .ok_or_else(|| CoopError::not_found("substance", request.substance_id))?;

        let participants = self.db.users.count_participating_cnpjs().await?;
        let share = equal_share(request.total_quantity, participants)?;
        let quota = self
            .db
            .reserves
            .create(ctx.user_id, request, participant_count(participants)?, share)
            .await?;

        log_admin_action(ctx.user_id, "create_reserve_quota", Some(&quota.id.to_string()), Some(&substance.name));
        info!(quota_id = %quota.id, participants = participants, share = %share, "Reserve quota created");

        self.notifications.dispatch(
            NotificationEvent::new(
                "reserve.created",
                format!("Strategic reserve: {}", substance.name),
                format!("Each CNPJ may claim up to {} {}", share, quota.unit),
                Audience::Role(UserRole::Cooperado),
            )
            .with_link(format!("/marketplace/reserves/{}", quota.id)),
        );

        Ok(quota)
    }

    pub async fn get(&self, id: Uuid) -> Result<StrategicReserveQuota> {
        self.db
            .reserves
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoopError::not_found("reserve quota", id))
    }

    pub async fn list(&self, active_only: bool) -> Result<Vec<StrategicReserveQuota>> {
        self.db.reserves.list(active_only).await
    }

    pub async fn deactivate(&self, ctx: &AuthContext, id: Uuid) -> Result<StrategicReserveQuota> {
        ctx.require_role(&[UserRole::Master, UserRole::Cooperativa])?;
        let quota = self.db.reserves.set_active(id, false).await?;
        log_admin_action(ctx.user_id, "deactivate_reserve_quota", Some(&id.to_string()), None);
        Ok(quota)
    }

    /// Claim against the caller's CNPJ share
    pub async fn claim(&self, ctx: &AuthContext, id: Uuid, quantity: Decimal) -> Result<ReserveReceipt> {
        ctx.require_role(&[UserRole::Cooperado])?;
        let cnpj = ctx.require_cnpj()?.to_string();

        let mut tx = self.db.begin().await?;
        let quota = ReserveRepository::lock(&mut tx, id)
            .await?
            .ok_or_else(|| CoopError::not_found("reserve quota", id))?;
        let cnpj_claimed = ReserveRepository::cnpj_claimed(&mut tx, id, &cnpj).await?;
        let total_claimed = ReserveRepository::total_claimed(&mut tx, id).await?;

        if let Err(e) = quota.check_claim(quantity, cnpj_claimed, total_claimed, Utc::now()) {
            log_claim("strategic_reserve", id, ctx.user_id, &quantity.to_string(), false);
            return Err(e);
        }

        let claim = ReserveRepository::insert_claim(&mut tx, id, ctx.user_id, &cnpj, quantity).await?;
        let transaction = MarketplaceRepository::insert_transaction(
            &mut tx,
            NewTransaction {
                offer_id: None,
                buyer_id: ctx.user_id,
                seller_id: Some(quota.created_by),
                quantity,
                unit_price: quota.unit_price,
                status: TransactionStatus::Confirmed,
                source: TransactionSource::StrategicReserve,
                reference_id: Some(claim.id),
            },
        )
        .await?;
        FinancialRepository::insert(
            &mut tx,
            purchase_debit(ctx.user_id, transaction.total_amount, RESERVE_CATEGORY, "reserve_claim", claim.id),
            Some(ctx.user_id),
        )
        .await?;
        tx.commit().await?;

        log_claim("strategic_reserve", id, ctx.user_id, &quantity.to_string(), true);

        let status = QuotaStatus::new(&quota, total_claimed + quantity, Some((cnpj, cnpj_claimed + quantity)));
        Ok(ReserveReceipt { claim, transaction, status })
    }

    /// Claim figures; scoped to the caller's CNPJ when they have one
    pub async fn status(&self, ctx: &AuthContext, id: Uuid) -> Result<QuotaStatus> {
        let quota = self.get(id).await?;
        let mut conn = self.db.pool().acquire().await?;
        let total_claimed = ReserveRepository::total_claimed(&mut conn, id).await?;

        let cnpj = match ctx.cnpj.as_deref().filter(|c| !c.is_empty()) {
            Some(cnpj) => {
                let claimed = ReserveRepository::cnpj_claimed(&mut conn, id, cnpj).await?;
                Some((cnpj.to_string(), claimed))
            }
            None => None,
        };

        Ok(QuotaStatus::new(&quota, total_claimed, cnpj))
    }

    /// Recount participants and recompute the share.
    ///
    /// Fails when the new share would fall below what a CNPJ already claimed.
    pub async fn recalculate_share(&self, ctx: &AuthContext, id: Uuid) -> Result<StrategicReserveQuota> {
        ctx.require_role(&[UserRole::Master, UserRole::Cooperativa])?;

        let participants = self.db.users.count_participating_cnpjs().await?;

        let mut tx = self.db.begin().await?;
        let quota = ReserveRepository::lock(&mut tx, id)
            .await?
            .ok_or_else(|| CoopError::not_found("reserve quota", id))?;
        let share = equal_share(quota.total_quantity, participants)?;
        let max_claimed = ReserveRepository::max_cnpj_claimed(&mut tx, id).await?;
        if share < max_claimed {
            return Err(CoopError::BusinessRule(format!(
                "New share {} is below the {} already claimed by one CNPJ",
                share, max_claimed
            )));
        }

        let updated = ReserveRepository::update_share(&mut tx, id, participant_count(participants)?, share).await?;
        tx.commit().await?;

        log_admin_action(ctx.user_id, "recalculate_reserve_share", Some(&id.to_string()), Some(&share.to_string()));
        Ok(updated)
    }

    pub async fn my_claims(&self, ctx: &AuthContext) -> Result<Vec<StrategicReserveClaim>> {
        let cnpj = ctx.require_cnpj()?;
        self.db.reserves.claims_for_cnpj(cnpj).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_count_range() {
        assert_eq!(participant_count(12).unwrap(), 12);
        assert!(participant_count(i64::MAX).is_err());
    }
}
