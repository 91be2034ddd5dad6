//! Marketplace models: offers, auction bids, proposals and transactions

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;
use crate::models::amount::{checked_add, checked_mul, ensure_storable};
use crate::utils::errors::{CoopError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "offer_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OfferKind {
    FixedPrice,
    Auction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "offer_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Active,
    Sold,
    Closed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceOffer {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub substance_id: Uuid,
    pub raw_material_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub kind: OfferKind,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub min_bid_increment: Option<Decimal>,
    pub auction_ends_at: Option<DateTime<Utc>>,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MarketplaceOffer {
    pub fn is_open(&self) -> bool {
        self.status == OfferStatus::Active
    }

    /// Check that a direct purchase of `quantity` is allowed
    pub fn validate_purchase(&self, buyer_id: Uuid, quantity: Decimal) -> Result<()> {
        if self.kind != OfferKind::FixedPrice {
            return Err(CoopError::BusinessRule("Auctions cannot be bought directly".to_string()));
        }
        if !self.is_open() {
            return Err(CoopError::BusinessRule("Offer is no longer active".to_string()));
        }
        if buyer_id == self.seller_id {
            return Err(CoopError::BusinessRule("Sellers cannot buy their own offer".to_string()));
        }
        if quantity <= Decimal::ZERO {
            return Err(CoopError::InvalidInput("Quantity must be positive".to_string()));
        }
        ensure_storable(quantity, "Quantity")?;
        if quantity > self.quantity {
            return Err(CoopError::BusinessRule(format!(
                "Only {} {} available",
                self.quantity, self.unit
            )));
        }
        Ok(())
    }

    /// Check a bid against the auction rules.
    ///
    /// The first bid must reach the starting price; later bids must beat the
    /// current highest by at least the increment.
    pub fn validate_bid(
        &self,
        bidder_id: Uuid,
        unit_price: Decimal,
        highest: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.kind != OfferKind::Auction {
            return Err(CoopError::BusinessRule("Offer is not an auction".to_string()));
        }
        if !self.is_open() {
            return Err(CoopError::BusinessRule("Auction is not active".to_string()));
        }
        if self.auction_ends_at.map(|end| now >= end).unwrap_or(true) {
            return Err(CoopError::BusinessRule("Auction has ended".to_string()));
        }
        if bidder_id == self.seller_id {
            return Err(CoopError::BusinessRule("Sellers cannot bid on their own auction".to_string()));
        }

        ensure_storable(unit_price, "Bid")?;

        let minimum = match highest {
            Some(current) => checked_add(current, self.min_bid_increment.unwrap_or(Decimal::ZERO), "Bid")?,
            None => self.unit_price,
        };
        let beats_highest = match highest {
            Some(current) => unit_price > current && unit_price >= minimum,
            None => unit_price >= minimum,
        };

        if !beats_highest {
            return Err(CoopError::BusinessRule(format!("Bid must be at least {}", minimum)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfferRequest {
    pub substance_id: Uuid,
    pub raw_material_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub kind: OfferKind,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub min_bid_increment: Option<Decimal>,
    pub auction_ends_at: Option<DateTime<Utc>>,
}

impl CreateOfferRequest {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(CoopError::InvalidInput("Title is required".to_string()));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(CoopError::InvalidInput("Quantity must be positive".to_string()));
        }
        if self.unit_price <= Decimal::ZERO {
            return Err(CoopError::InvalidInput("Unit price must be positive".to_string()));
        }
        ensure_storable(self.quantity, "Quantity")?;
        ensure_storable(self.unit_price, "Unit price")?;
        if let Some(increment) = self.min_bid_increment {
            ensure_storable(increment, "Minimum bid increment")?;
        }
        if self.kind == OfferKind::Auction {
            match self.auction_ends_at {
                Some(end) if end > now => {}
                _ => {
                    return Err(CoopError::InvalidInput(
                        "Auctions need an end date in the future".to_string(),
                    ))
                }
            }
            if self.min_bid_increment.map(|inc| inc <= Decimal::ZERO).unwrap_or(true) {
                return Err(CoopError::InvalidInput(
                    "Auctions need a positive minimum bid increment".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferFilter {
    pub substance_id: Option<Uuid>,
    pub kind: Option<OfferKind>,
    pub seller_id: Option<Uuid>,
    pub status: Option<OfferStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuctionBid {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub bidder_id: Uuid,
    pub unit_price: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBidRequest {
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "proposal_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub proposer_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub message: Option<String>,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProposalRequest {
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    /// Allowed moves: pending → confirmed → completed, anything unfinished → cancelled
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Confirmed, Completed) | (Pending, Cancelled) | (Confirmed, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionSource {
    Direct,
    Proposal,
    Auction,
    FlashDeal,
    StrategicReserve,
}

impl TransactionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionSource::Direct => "direct",
            TransactionSource::Proposal => "proposal",
            TransactionSource::Auction => "auction",
            TransactionSource::FlashDeal => "flash_deal",
            TransactionSource::StrategicReserve => "strategic_reserve",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub offer_id: Option<Uuid>,
    pub buyer_id: Uuid,
    pub seller_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub status: TransactionStatus,
    pub source: TransactionSource,
    pub reference_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.buyer_id == user_id || self.seller_id == Some(user_id)
    }
}

/// Values for a new transaction row
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub offer_id: Option<Uuid>,
    pub buyer_id: Uuid,
    pub seller_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub status: TransactionStatus,
    pub source: TransactionSource,
    pub reference_id: Option<Uuid>,
}

impl NewTransaction {
    /// Quantity times unit price, rounded to cents and bounded to the column range
    pub fn total_amount(&self) -> Result<Decimal> {
        let total = checked_mul(self.quantity, self.unit_price, "Total amount")?.round_dp(2);
        ensure_storable(total, "Total amount")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransactionStatusRequest {
    pub status: TransactionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;

    fn auction(seller: Uuid) -> MarketplaceOffer {
        let now = Utc::now();
        MarketplaceOffer {
            id: Uuid::new_v4(),
            seller_id: seller,
            substance_id: Uuid::new_v4(),
            raw_material_id: None,
            title: "Minoxidil 1kg".to_string(),
            description: None,
            kind: OfferKind::Auction,
            quantity: Decimal::new(1000, 0),
            unit: "g".to_string(),
            unit_price: Decimal::new(100, 0),
            min_bid_increment: Some(Decimal::new(5, 0)),
            auction_ends_at: Some(now + Duration::hours(2)),
            status: OfferStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_first_bid_must_reach_starting_price() {
        let offer = auction(Uuid::new_v4());
        let now = Utc::now();
        let bidder = Uuid::new_v4();
        assert_matches!(offer.validate_bid(bidder, Decimal::new(99, 0), None, now), Err(CoopError::BusinessRule(_)));
        assert!(offer.validate_bid(bidder, Decimal::new(100, 0), None, now).is_ok());
    }

    #[test]
    fn test_bid_must_exceed_highest_by_increment() {
        let offer = auction(Uuid::new_v4());
        let now = Utc::now();
        let bidder = Uuid::new_v4();
        let highest = Some(Decimal::new(120, 0));
        assert!(offer.validate_bid(bidder, Decimal::new(124, 0), highest, now).is_err());
        assert!(offer.validate_bid(bidder, Decimal::new(125, 0), highest, now).is_ok());
    }

    #[test]
    fn test_seller_and_expired_auction_rejected() {
        let seller = Uuid::new_v4();
        let offer = auction(seller);
        let now = Utc::now();
        assert!(offer.validate_bid(seller, Decimal::new(200, 0), None, now).is_err());
        assert!(offer
            .validate_bid(Uuid::new_v4(), Decimal::new(200, 0), None, now + Duration::hours(3))
            .is_err());
    }

    #[test]
    fn test_purchase_rules() {
        let mut offer = auction(Uuid::new_v4());
        offer.kind = OfferKind::FixedPrice;
        let buyer = Uuid::new_v4();
        assert!(offer.validate_purchase(buyer, Decimal::new(10, 0)).is_ok());
        assert!(offer.validate_purchase(buyer, Decimal::new(1001, 0)).is_err());
        assert!(offer.validate_purchase(buyer, Decimal::ZERO).is_err());
        assert!(offer.validate_purchase(offer.seller_id, Decimal::ONE).is_err());
    }

    #[test]
    fn test_transaction_state_machine() {
        use TransactionStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn test_create_offer_validation() {
        let now = Utc::now();
        let mut request = CreateOfferRequest {
            substance_id: Uuid::new_v4(),
            raw_material_id: None,
            title: "Lote".to_string(),
            description: None,
            kind: OfferKind::Auction,
            quantity: Decimal::new(10, 0),
            unit: "g".to_string(),
            unit_price: Decimal::new(5, 0),
            min_bid_increment: None,
            auction_ends_at: Some(now + Duration::days(1)),
        };
        assert!(request.validate(now).is_err());
        request.min_bid_increment = Some(Decimal::ONE);
        assert!(request.validate(now).is_ok());
        request.auction_ends_at = Some(now - Duration::days(1));
        assert!(request.validate(now).is_err());
    }

    #[test]
    fn test_total_amount_rounding() {
        let tx = NewTransaction {
            offer_id: None,
            buyer_id: Uuid::new_v4(),
            seller_id: None,
            quantity: Decimal::new(3333, 3),
            unit_price: Decimal::new(3, 0),
            status: TransactionStatus::Pending,
            source: TransactionSource::Direct,
            reference_id: None,
        };
        assert_eq!(tx.total_amount().unwrap(), Decimal::new(1000, 2));
    }

    #[test]
    fn test_oversized_amounts_are_invalid_input() {
        let offer = auction(Uuid::new_v4());
        let now = Utc::now();
        let bidder = Uuid::new_v4();
        assert_matches!(offer.validate_bid(bidder, Decimal::MAX, None, now), Err(CoopError::InvalidInput(_)));

        let mut topped = offer.clone();
        topped.min_bid_increment = Some(Decimal::MAX);
        assert_matches!(
            topped.validate_bid(bidder, Decimal::new(500, 0), Some(Decimal::MAX), now),
            Err(CoopError::InvalidInput(_))
        );

        let mut fixed = offer;
        fixed.kind = OfferKind::FixedPrice;
        assert_matches!(fixed.validate_purchase(bidder, Decimal::MAX), Err(CoopError::InvalidInput(_)));

        let tx = NewTransaction {
            offer_id: None,
            buyer_id: bidder,
            seller_id: None,
            quantity: Decimal::MAX,
            unit_price: Decimal::new(2, 0),
            status: TransactionStatus::Pending,
            source: TransactionSource::Direct,
            reference_id: None,
        };
        assert_matches!(tx.total_amount(), Err(CoopError::InvalidInput(_)));

        let tx = NewTransaction { quantity: Decimal::new(999_999, 0), unit_price: Decimal::new(10_000_000, 0), ..tx };
        assert_matches!(tx.total_amount(), Err(CoopError::InvalidInput(_)));
    }
}
