//! Flash deal model
//!
//! A flash deal sells a bounded stock at a promotional price inside a time
//! window. Claims decrement the stock; the claim rules live here so they can
//! be checked against a row locked inside a database transaction.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;
use crate::models::amount::{checked_add, ensure_storable};
use crate::utils::errors::{CoopError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FlashDeal {
    pub id: Uuid,
    pub created_by: Uuid,
    pub substance_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub unit: String,
    pub unit_price: Decimal,
    pub original_price: Option<Decimal>,
    pub stock_limit: Decimal,
    pub claimed_quantity: Decimal,
    pub per_user_limit: Option<Decimal>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlashDeal {
    pub fn remaining_stock(&self) -> Decimal {
        (self.stock_limit - self.claimed_quantity).max(Decimal::ZERO)
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.starts_at <= now && now < self.ends_at
    }

    /// Validate a claim of `quantity` by a user who already claimed `user_claimed`.
    ///
    /// Stock violations are 400s; exceeding the per-user limit is a 403.
    pub fn check_claim(&self, quantity: Decimal, user_claimed: Decimal, now: DateTime<Utc>) -> Result<()> {
        if quantity <= Decimal::ZERO {
            return Err(CoopError::InvalidInput("Quantity must be positive".to_string()));
        }
        ensure_storable(quantity, "Quantity")?;
        if !self.is_active {
            return Err(CoopError::BusinessRule("Flash deal is no longer active".to_string()));
        }
        if now < self.starts_at {
            return Err(CoopError::BusinessRule("Flash deal has not started yet".to_string()));
        }
        if now >= self.ends_at {
            return Err(CoopError::BusinessRule("Flash deal has ended".to_string()));
        }
        if checked_add(self.claimed_quantity, quantity, "Quantity")? > self.stock_limit {
            return Err(CoopError::BusinessRule(format!(
                "Only {} {} left in this flash deal",
                self.remaining_stock(),
                self.unit
            )));
        }
        if let Some(limit) = self.per_user_limit {
            if checked_add(user_claimed, quantity, "Quantity")? > limit {
                return Err(CoopError::PermissionDenied(format!(
                    "Per-user limit of {} {} exceeded ({} already claimed)",
                    limit, self.unit, user_claimed
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FlashDealClaim {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub user_id: Uuid,
    pub quantity: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFlashDealRequest {
    pub substance_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub unit: String,
    pub unit_price: Decimal,
    pub original_price: Option<Decimal>,
    pub stock_limit: Decimal,
    pub per_user_limit: Option<Decimal>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: DateTime<Utc>,
}

impl CreateFlashDealRequest {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(CoopError::InvalidInput("Title is required".to_string()));
        }
        if self.stock_limit <= Decimal::ZERO {
            return Err(CoopError::InvalidInput("Stock limit must be positive".to_string()));
        }
        ensure_storable(self.stock_limit, "Stock limit")?;
        ensure_storable(self.unit_price, "Unit price")?;
        if let Some(original) = self.original_price {
            ensure_storable(original, "Original price")?;
        }
        if self.unit_price <= Decimal::ZERO {
            return Err(CoopError::InvalidInput("Unit price must be positive".to_string()));
        }
        if let Some(limit) = self.per_user_limit {
            if limit <= Decimal::ZERO || limit > self.stock_limit {
                return Err(CoopError::InvalidInput(
                    "Per-user limit must be positive and not above the stock limit".to_string(),
                ));
            }
        }
        if self.ends_at <= self.starts_at.unwrap_or(now) {
            return Err(CoopError::InvalidInput("Deal must end after it starts".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub quantity: Decimal,
}

/// Deal plus derived stock figures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashDealView {
    #[serde(flatten)]
    pub deal: FlashDeal,
    pub remaining_stock: Decimal,
    pub is_live: bool,
}

impl FlashDealView {
    pub fn new(deal: FlashDeal, now: DateTime<Utc>) -> Self {
        Self {
            remaining_stock: deal.remaining_stock(),
            is_live: deal.is_live(now),
            deal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use proptest::prelude::*;

    fn deal(stock: i64, claimed: i64, per_user: Option<i64>) -> FlashDeal {
        let now = Utc::now();
        FlashDeal {
            id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            substance_id: Uuid::new_v4(),
            title: "Ácido hialurônico".to_string(),
            description: None,
            unit: "g".to_string(),
            unit_price: Decimal::new(50, 0),
            original_price: Some(Decimal::new(80, 0)),
            stock_limit: Decimal::new(stock, 0),
            claimed_quantity: Decimal::new(claimed, 0),
            per_user_limit: per_user.map(|p| Decimal::new(p, 0)),
            starts_at: now - Duration::hours(1),
            ends_at: now + Duration::hours(1),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_claim_within_stock() {
        let d = deal(100, 90, None);
        assert!(d.check_claim(Decimal::new(10, 0), Decimal::ZERO, Utc::now()).is_ok());
        assert_matches!(
            d.check_claim(Decimal::new(11, 0), Decimal::ZERO, Utc::now()),
            Err(CoopError::BusinessRule(_))
        );
    }

    #[test]
    fn test_per_user_limit_is_forbidden() {
        let d = deal(100, 0, Some(5));
        assert_matches!(
            d.check_claim(Decimal::new(2, 0), Decimal::new(4, 0), Utc::now()),
            Err(CoopError::PermissionDenied(_))
        );
        assert!(d.check_claim(Decimal::ONE, Decimal::new(4, 0), Utc::now()).is_ok());
    }

    #[test]
    fn test_window_and_activity() {
        let mut d = deal(100, 0, None);
        let now = Utc::now();
        assert!(d.check_claim(Decimal::ONE, Decimal::ZERO, now + Duration::hours(2)).is_err());
        assert!(d.check_claim(Decimal::ONE, Decimal::ZERO, now - Duration::hours(2)).is_err());
        d.is_active = false;
        assert!(d.check_claim(Decimal::ONE, Decimal::ZERO, now).is_err());
        assert!(!d.is_live(now));
    }

    #[test]
    fn test_non_positive_quantity() {
        let d = deal(10, 0, None);
        assert_matches!(d.check_claim(Decimal::ZERO, Decimal::ZERO, Utc::now()), Err(CoopError::InvalidInput(_)));
        assert_matches!(d.check_claim(Decimal::NEGATIVE_ONE, Decimal::ZERO, Utc::now()), Err(CoopError::InvalidInput(_)));
    }

    #[test]
    fn test_oversized_claim_is_invalid_input() {
        let d = deal(100, 10, Some(5));
        assert_matches!(d.check_claim(Decimal::MAX, Decimal::ZERO, Utc::now()), Err(CoopError::InvalidInput(_)));

        let mut huge = deal(100, 0, None);
        huge.claimed_quantity = Decimal::MAX;
        assert_matches!(huge.check_claim(Decimal::ONE, Decimal::ZERO, Utc::now()), Err(CoopError::InvalidInput(_)));
    }

    proptest! {
        #[test]
        fn prop_accepted_claims_never_oversell(claims in proptest::collection::vec(1i64..40, 1..30)) {
            let mut d = deal(100, 0, None);
            let now = Utc::now();
            for q in claims {
                let quantity = Decimal::new(q, 0);
                if d.check_claim(quantity, Decimal::ZERO, now).is_ok() {
                    d.claimed_quantity += quantity;
                }
                prop_assert!(d.claimed_quantity <= d.stock_limit);
                prop_assert!(d.remaining_stock() >= Decimal::ZERO);
            }
        }
    }
}
