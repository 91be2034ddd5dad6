//! Strategic reserve model
//!
//! A reserve quota splits a scarce raw material equally between the
//! cooperative's CNPJs for a period.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::FromRow;
use uuid::Uuid;
use crate::models::amount::{checked_add, ensure_storable};
use crate::utils::errors::{CoopError, Result};

/// Decimal places kept for a per-CNPJ share
pub const SHARE_SCALE: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StrategicReserveQuota {
    pub id: Uuid,
    pub created_by: Uuid,
    pub substance_id: Uuid,
    pub total_quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub participant_count: i32,
    pub share_per_cnpj: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Equal share for each participating CNPJ, truncated toward zero
pub fn equal_share(total_quantity: Decimal, participants: i64) -> Result<Decimal> {
    if participants <= 0 {
        return Err(CoopError::BusinessRule(
            "No participating CNPJs to divide the reserve between".to_string(),
        ));
    }
    let share = total_quantity / Decimal::from(participants);
    Ok(share.round_dp_with_strategy(SHARE_SCALE, RoundingStrategy::ToZero))
}

impl StrategicReserveQuota {
    pub fn in_period(&self, now: DateTime<Utc>) -> bool {
        self.period_start <= now && now < self.period_end
    }

    /// Validate a claim given what the CNPJ and the whole cooperative already claimed.
    ///
    /// Exceeding the CNPJ share is a 403; exceeding the total is a 400.
    pub fn check_claim(
        &self,
        quantity: Decimal,
        cnpj_claimed: Decimal,
        total_claimed: Decimal,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if quantity <= Decimal::ZERO {
            return Err(CoopError::InvalidInput("Quantity must be positive".to_string()));
        }
        ensure_storable(quantity, "Quantity")?;
        if !self.is_active {
            return Err(CoopError::BusinessRule("Reserve quota is not active".to_string()));
        }
        if !self.in_period(now) {
            return Err(CoopError::BusinessRule("Reserve quota is outside its period".to_string()));
        }
        if checked_add(cnpj_claimed, quantity, "Quantity")? > self.share_per_cnpj {
            return Err(CoopError::PermissionDenied(format!(
                "CNPJ share of {} {} exceeded ({} already claimed)",
                self.share_per_cnpj, self.unit, cnpj_claimed
            )));
        }
        if checked_add(total_claimed, quantity, "Quantity")? > self.total_quantity {
            return Err(CoopError::BusinessRule(format!(
                "Only {} {} left in the reserve",
                (self.total_quantity - total_claimed).max(Decimal::ZERO),
                self.unit
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StrategicReserveClaim {
    pub id: Uuid,
    pub quota_id: Uuid,
    pub user_id: Uuid,
    pub cnpj: String,
    pub quantity: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReserveQuotaRequest {
    pub substance_id: Uuid,
    pub total_quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

impl CreateReserveQuotaRequest {
    pub fn validate(&self) -> Result<()> {
        if self.total_quantity <= Decimal::ZERO {
            return Err(CoopError::InvalidInput("Total quantity must be positive".to_string()));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(CoopError::InvalidInput("Unit price cannot be negative".to_string()));
        }
        ensure_storable(self.total_quantity, "Total quantity")?;
        ensure_storable(self.unit_price, "Unit price")?;
        if self.period_end <= self.period_start {
            return Err(CoopError::InvalidInput("Period must end after it starts".to_string()));
        }
        Ok(())
    }
}

/// Claim figures for a quota, optionally scoped to one CNPJ
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub quota_id: Uuid,
    pub total_quantity: Decimal,
    pub total_claimed: Decimal,
    pub remaining: Decimal,
    pub share_per_cnpj: Decimal,
    pub participant_count: i32,
    pub cnpj: Option<String>,
    pub cnpj_claimed: Option<Decimal>,
    pub cnpj_remaining: Option<Decimal>,
}

impl QuotaStatus {
    pub fn new(quota: &StrategicReserveQuota, total_claimed: Decimal, cnpj: Option<(String, Decimal)>) -> Self {
        let (cnpj, cnpj_claimed) = match cnpj {
            Some((c, claimed)) => (Some(c), Some(claimed)),
            None => (None, None),
        };
        Self {
            quota_id: quota.id,
            total_quantity: quota.total_quantity,
            total_claimed,
            remaining: (quota.total_quantity - total_claimed).max(Decimal::ZERO),
            share_per_cnpj: quota.share_per_cnpj,
            participant_count: quota.participant_count,
            cnpj,
            cnpj_remaining: cnpj_claimed.map(|c| (quota.share_per_cnpj - c).max(Decimal::ZERO)),
            cnpj_claimed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use proptest::prelude::*;

    fn quota(total: i64, participants: i64) -> StrategicReserveQuota {
        let now = Utc::now();
        let total = Decimal::new(total, 0);
        StrategicReserveQuota {
            id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            substance_id: Uuid::new_v4(),
            total_quantity: total,
            unit: "g".to_string(),
            unit_price: Decimal::new(12, 0),
            period_start: now - Duration::days(1),
            period_end: now + Duration::days(29),
            participant_count: participants as i32,
            share_per_cnpj: equal_share(total, participants).unwrap(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_equal_share_truncates() {
        assert_eq!(equal_share(Decimal::new(1000, 0), 3).unwrap(), Decimal::new(333333, 3));
        assert_eq!(equal_share(Decimal::new(90, 0), 3).unwrap(), Decimal::new(30, 0));
        assert_matches!(equal_share(Decimal::new(90, 0), 0), Err(CoopError::BusinessRule(_)));
    }

    #[test]
    fn test_cnpj_share_enforced() {
        let q = quota(90, 3);
        let now = Utc::now();
        assert!(q.check_claim(Decimal::new(30, 0), Decimal::ZERO, Decimal::ZERO, now).is_ok());
        assert_matches!(
            q.check_claim(Decimal::new(5, 0), Decimal::new(26, 0), Decimal::new(26, 0), now),
            Err(CoopError::PermissionDenied(_))
        );
    }

    #[test]
    fn test_oversized_claim_is_invalid_input() {
        let q = quota(90, 3);
        let now = Utc::now();
        assert_matches!(
            q.check_claim(Decimal::MAX, Decimal::ZERO, Decimal::ZERO, now),
            Err(CoopError::InvalidInput(_))
        );
        assert_matches!(
            q.check_claim(Decimal::ONE, Decimal::MAX, Decimal::ZERO, now),
            Err(CoopError::InvalidInput(_))
        );
    }

    #[test]
    fn test_period_enforced() {
        let q = quota(90, 3);
        let late = Utc::now() + Duration::days(60);
        assert_matches!(
            q.check_claim(Decimal::ONE, Decimal::ZERO, Decimal::ZERO, late),
            Err(CoopError::BusinessRule(_))
        );
    }

    #[test]
    fn test_quota_status() {
        let q = quota(90, 3);
        let status = QuotaStatus::new(&q, Decimal::new(40, 0), Some(("11222333000181".to_string(), Decimal::new(10, 0))));
        assert_eq!(status.remaining, Decimal::new(50, 0));
        assert_eq!(status.cnpj_remaining, Some(Decimal::new(20, 0)));
    }

    proptest! {
        #[test]
        fn prop_shares_never_exceed_total(total in 1i64..1_000_000, participants in 1i64..500) {
            let total = Decimal::new(total, 0);
            let share = equal_share(total, participants).unwrap();
            prop_assert!(share * Decimal::from(participants) <= total);
        }

        #[test]
        fn prop_cnpj_never_exceeds_share(claims in proptest::collection::vec(1i64..20, 1..20)) {
            let q = quota(100, 4);
            let now = Utc::now();
            let mut cnpj_claimed = Decimal::ZERO;
            for c in claims {
                let quantity = Decimal::new(c, 0);
                if q.check_claim(quantity, cnpj_claimed, cnpj_claimed, now).is_ok() {
                    cnpj_claimed += quantity;
                }
                prop_assert!(cnpj_claimed <= q.share_per_cnpj);
            }
        }
    }
}
