//! Marketplace service
//!
//! Offers, direct purchases, auctions, proposals and the transaction state
//! machine. Every multi-row change runs inside one database transaction with
//! the offer row locked.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::{debug, info};
use uuid::Uuid;
use crate::database::DatabaseService;
use crate::database::repositories::{
    purchase_debit, refund_credit, FinancialRepository, FlashDealRepository, MarketplaceRepository, ReserveRepository,
};
use crate::models::amount::ensure_storable;
use crate::models::financial::{CreateMovementRequest, MovementKind};
use crate::models::marketplace::{
    AuctionBid, CreateOfferRequest, CreateProposalRequest, MarketplaceOffer, NewTransaction, OfferFilter, OfferKind,
    OfferStatus, Proposal, ProposalStatus, Transaction, TransactionSource, TransactionStatus,
};
use crate::models::notification::{Audience, NotificationEvent};
use crate::models::quotation::parse_unit;
use crate::models::role::PERM_MARKETPLACE_MODERATE;
use crate::models::user::UserRole;
use crate::services::auth::{AuthContext, AuthService};
use crate::services::flash_deal::FLASH_DEAL_CATEGORY;
use crate::services::notification::NotificationService;
use crate::services::reserve::RESERVE_CATEGORY;
use crate::utils::errors::{CoopError, Result};
use crate::utils::logging::log_user_action;

const TRADERS: [UserRole; 3] = [UserRole::Cooperado, UserRole::Cooperativa, UserRole::Fornecedor];

pub const PURCHASE_CATEGORY: &str = "marketplace_purchase";
pub const SALE_CATEGORY: &str = "marketplace_sale";

/// Ledger lines written when a transaction completes.
///
/// Claim-sourced transactions were debited when claimed and get nothing here.
pub fn completion_movements(transaction: &Transaction) -> Vec<CreateMovementRequest> {
    if matches!(transaction.source, TransactionSource::FlashDeal | TransactionSource::StrategicReserve) {
        return Vec::new();
    }

    let mut movements = vec![purchase_debit(
        transaction.buyer_id,
        transaction.total_amount,
        PURCHASE_CATEGORY,
        "transaction",
        transaction.id,
    )];
    if let Some(seller_id) = transaction.seller_id {
        movements.push(CreateMovementRequest {
            user_id: seller_id,
            kind: MovementKind::Credit,
            category: SALE_CATEGORY.to_string(),
            amount: transaction.total_amount,
            description: None,
            reference_type: Some("transaction".to_string()),
            reference_id: Some(transaction.id),
        });
    }
    movements
}

/// Give back what a transaction took when it is cancelled.
///
/// Claim-sourced transactions return the claimed quantity and refund the
/// debit made at claim time. Offer-sourced ones return the quantity to the
/// offer; an auction lot goes back to the seller as a closed offer.
async fn release_cancelled(conn: &mut PgConnection, transaction: &Transaction, cancelled_by: Uuid) -> Result<()> {
    match transaction.source {
        TransactionSource::FlashDeal => {
            if let Some(claim_id) = transaction.reference_id {
                if let Some(claim) = FlashDealRepository::remove_claim(&mut *conn, claim_id).await? {
                    FlashDealRepository::release_claimed(&mut *conn, claim.deal_id, claim.quantity).await?;
                }
            }
            let refund = refund_credit(transaction.buyer_id, transaction.total_amount, FLASH_DEAL_CATEGORY, transaction.id);
            FinancialRepository::insert(&mut *conn, refund, Some(cancelled_by)).await?;
        }
        TransactionSource::StrategicReserve => {
            if let Some(claim_id) = transaction.reference_id {
                ReserveRepository::remove_claim(&mut *conn, claim_id).await?;
            }
            let refund = refund_credit(transaction.buyer_id, transaction.total_amount, RESERVE_CATEGORY, transaction.id);
            FinancialRepository::insert(&mut *conn, refund, Some(cancelled_by)).await?;
        }
        TransactionSource::Direct | TransactionSource::Proposal => {
            if let Some(offer_id) = transaction.offer_id {
                if MarketplaceRepository::lock_offer(&mut *conn, offer_id).await?.is_some() {
                    MarketplaceRepository::restore_quantity(&mut *conn, offer_id, transaction.quantity).await?;
                }
            }
        }
        TransactionSource::Auction => {
            if let Some(offer_id) = transaction.offer_id {
                let offer = MarketplaceRepository::lock_offer(&mut *conn, offer_id).await?;
                if offer.map(|o| o.status == OfferStatus::Sold).unwrap_or(false) {
                    MarketplaceRepository::set_offer_status(&mut *conn, offer_id, OfferStatus::Closed).await?;
                }
            }
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct MarketplaceService {
    db: DatabaseService,
    auth: AuthService,
    notifications: NotificationService,
}

impl MarketplaceService {
    pub fn new(db: DatabaseService, auth: AuthService, notifications: NotificationService) -> Self {
        Self { db, auth, notifications }
    }

    pub async fn get_offer(&self, id: Uuid) -> Result<MarketplaceOffer> {
        self.db
            .marketplace
            .find_offer(id)
            .await?
            .ok_or_else(|| CoopError::not_found("offer", id))
    }

    pub async fn list_offers(&self, filter: &OfferFilter, limit: i64, offset: i64) -> Result<Vec<MarketplaceOffer>> {
        self.db.marketplace.list_offers(filter, limit, offset).await
    }

    pub async fn create_offer(&self, ctx: &AuthContext, request: CreateOfferRequest) -> Result<MarketplaceOffer> {
        ctx.require_role(&TRADERS)?;
        request.validate(Utc::now())?;
        if parse_unit(&request.unit).is_none() {
            return Err(CoopError::InvalidInput(format!("Unknown unit: {}", request.unit)));
        }

        let substance = self
            .db
            .substances
            .find_by_id(request.substance_id)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| CoopError::not_found("substance", request.substance_id))?;

        if let Some(raw_material_id) = request.raw_material_id {
            let material = self
                .db
                .raw_materials
                .find_by_id(raw_material_id)
                .await?
                .ok_or_else(|| CoopError::not_found("raw material", raw_material_id))?;
            if material.owner_id != ctx.user_id {
                return Err(CoopError::PermissionDenied("Raw material belongs to another user".to_string()));
            }
        }

        let offer = self.db.marketplace.create_offer(ctx.user_id, request).await?;
        log_user_action(ctx.user_id, "create_offer", Some(&offer.id.to_string()));

        let followers: Vec<Uuid> = self
            .db
            .follows
            .follower_ids(ctx.user_id, substance.id)
            .await?
            .into_iter()
            .filter(|id| *id != ctx.user_id)
            .collect();
        if !followers.is_empty() {
            self.notifications.dispatch(
                NotificationEvent::new(
                    "marketplace.offer_created",
                    "New offer",
                    format!("{} offered {}: {}", ctx.name, substance.name, offer.title),
                    Audience::Users(followers),
                )
                .with_link(format!("/marketplace/offers/{}", offer.id)),
            );
        }

        Ok(offer)
    }

    async fn can_moderate(&self, ctx: &AuthContext) -> Result<bool> {
        self.auth.has_permission(ctx, PERM_MARKETPLACE_MODERATE).await
    }

    /// Seller or a moderator withdraws an active offer
    pub async fn cancel_offer(&self, ctx: &AuthContext, id: Uuid) -> Result<MarketplaceOffer> {
        let mut tx = self.db.begin().await?;
        let offer = MarketplaceRepository::lock_offer(&mut tx, id)
            .await?
            .ok_or_else(|| CoopError::not_found("offer", id))?;

        if offer.seller_id != ctx.user_id && !self.can_moderate(ctx).await? {
            return Err(CoopError::PermissionDenied("Only the seller can cancel this offer".to_string()));
        }
        if !offer.is_open() {
            return Err(CoopError::BusinessRule("Offer is no longer active".to_string()));
        }

        let cancelled = MarketplaceRepository::set_offer_status(&mut tx, id, OfferStatus::Cancelled).await?;
        MarketplaceRepository::reject_pending_proposals(&mut tx, id).await?;
        tx.commit().await?;

        log_user_action(ctx.user_id, "cancel_offer", Some(&id.to_string()));
        Ok(cancelled)
    }

    /// Buy part or all of a fixed-price offer
    pub async fn buy_offer(&self, ctx: &AuthContext, id: Uuid, quantity: Decimal) -> Result<Transaction> {
        ctx.require_role(&TRADERS)?;

        let mut tx = self.db.begin().await?;
        let offer = MarketplaceRepository::lock_offer(&mut tx, id)
            .await?
            .ok_or_else(|| CoopError::not_found("offer", id))?;
        offer.validate_purchase(ctx.user_id, quantity)?;

        let remaining = MarketplaceRepository::reduce_quantity(&mut tx, id, quantity).await?;
        if remaining.status == OfferStatus::Sold {
            MarketplaceRepository::reject_pending_proposals(&mut tx, id).await?;
        }
        let transaction = MarketplaceRepository::insert_transaction(
            &mut tx,
            NewTransaction {
                offer_id: Some(id),
                buyer_id: ctx.user_id,
                seller_id: Some(offer.seller_id),
                quantity,
                unit_price: offer.unit_price,
                status: TransactionStatus::Pending,
                source: TransactionSource::Direct,
                reference_id: None,
            },
        )
        .await?;
        tx.commit().await?;

        info!(offer_id = %id, transaction_id = %transaction.id, quantity = %quantity, "Offer purchased");

        self.notifications.dispatch(
            NotificationEvent::new(
                "marketplace.offer_purchased",
                "Offer purchased",
                format!("{} bought {} {} of {}", ctx.name, quantity, offer.unit, offer.title),
                Audience::User(offer.seller_id),
            )
            .with_link(format!("/marketplace/transactions/{}", transaction.id)),
        );

        Ok(transaction)
    }

    pub async fn place_bid(&self, ctx: &AuthContext, id: Uuid, unit_price: Decimal) -> Result<AuctionBid> {
        ctx.require_role(&TRADERS)?;

        let mut tx = self.db.begin().await?;
        let offer = MarketplaceRepository::lock_offer(&mut tx, id)
            .await?
            .ok_or_else(|| CoopError::not_found("offer", id))?;
        let previous = MarketplaceRepository::highest_bid(&mut tx, id).await?;
        offer.validate_bid(ctx.user_id, unit_price, previous.as_ref().map(|b| b.unit_price), Utc::now())?;

        let bid = MarketplaceRepository::insert_bid(&mut tx, id, ctx.user_id, unit_price).await?;
        tx.commit().await?;

        debug!(offer_id = %id, bid_id = %bid.id, unit_price = %unit_price, "Bid placed");

        if let Some(previous) = previous.filter(|b| b.bidder_id != ctx.user_id) {
            self.notifications.dispatch(
                NotificationEvent::new(
                    "marketplace.outbid",
                    "You were outbid",
                    format!("A bid of {} beat yours on {}", unit_price, offer.title),
                    Audience::User(previous.bidder_id),
                )
                .with_link(format!("/marketplace/offers/{}", id)),
            );
        }
        self.notifications.dispatch(
            NotificationEvent::new(
                "marketplace.bid_placed",
                "New bid",
                format!("New bid of {} on {}", unit_price, offer.title),
                Audience::User(offer.seller_id),
            )
            .with_link(format!("/marketplace/offers/{}", id)),
        );

        Ok(bid)
    }

    pub async fn list_bids(&self, id: Uuid) -> Result<Vec<AuctionBid>> {
        self.get_offer(id).await?;
        self.db.marketplace.list_bids(id).await
    }

    /// Settle an auction after its end; the highest bid wins the whole lot
    pub async fn close_auction(&self, ctx: &AuthContext, id: Uuid) -> Result<(MarketplaceOffer, Option<Transaction>)> {
        let mut tx = self.db.begin().await?;
        let offer = MarketplaceRepository::lock_offer(&mut tx, id)
            .await?
            .ok_or_else(|| CoopError::not_found("offer", id))?;

        if offer.seller_id != ctx.user_id && !ctx.is_master() {
            return Err(CoopError::PermissionDenied("Only the seller can close this auction".to_string()));
        }
        if offer.kind != OfferKind::Auction {
            return Err(CoopError::BusinessRule("Offer is not an auction".to_string()));
        }
        if !offer.is_open() {
            return Err(CoopError::BusinessRule("Auction is not active".to_string()));
        }
        if offer.auction_ends_at.map(|end| Utc::now() < end).unwrap_or(false) {
            return Err(CoopError::BusinessRule("Auction has not ended yet".to_string()));
        }

        let winner = MarketplaceRepository::highest_bid(&mut tx, id).await?;
        let (closed, transaction) = match &winner {
            Some(bid) => {
                let transaction = MarketplaceRepository::insert_transaction(
                    &mut tx,
                    NewTransaction {
                        offer_id: Some(id),
                        buyer_id: bid.bidder_id,
                        seller_id: Some(offer.seller_id),
                        quantity: offer.quantity,
                        unit_price: bid.unit_price,
                        status: TransactionStatus::Pending,
                        source: TransactionSource::Auction,
                        reference_id: Some(bid.id),
                    },
                )
                .await?;
                let closed = MarketplaceRepository::set_offer_status(&mut tx, id, OfferStatus::Sold).await?;
                (closed, Some(transaction))
            }
            None => (MarketplaceRepository::set_offer_status(&mut tx, id, OfferStatus::Closed).await?, None),
        };
        tx.commit().await?;

        info!(offer_id = %id, has_winner = winner.is_some(), "Auction closed");

        if let Some(bid) = winner {
            self.notifications.dispatch(
                NotificationEvent::new(
                    "marketplace.auction_won",
                    "Auction won",
                    format!("You won {} at {}", offer.title, bid.unit_price),
                    Audience::User(bid.bidder_id),
                )
                .with_link(format!("/marketplace/offers/{}", id)),
            );
        }

        Ok((closed, transaction))
    }

    pub async fn create_proposal(&self, ctx: &AuthContext, offer_id: Uuid, request: CreateProposalRequest) -> Result<Proposal> {
        ctx.require_role(&TRADERS)?;
        let offer = self.get_offer(offer_id).await?;

        if offer.kind != OfferKind::FixedPrice {
            return Err(CoopError::BusinessRule("Auctions take bids, not proposals".to_string()));
        }
        if !offer.is_open() {
            return Err(CoopError::BusinessRule("Offer is no longer active".to_string()));
        }
        if offer.seller_id == ctx.user_id {
            return Err(CoopError::BusinessRule("Sellers cannot propose on their own offer".to_string()));
        }
        if request.quantity <= Decimal::ZERO || request.unit_price <= Decimal::ZERO {
            return Err(CoopError::InvalidInput("Quantity and unit price must be positive".to_string()));
        }
        ensure_storable(request.quantity, "Quantity")?;
        ensure_storable(request.unit_price, "Unit price")?;
        if request.quantity > offer.quantity {
            return Err(CoopError::BusinessRule(format!("Only {} {} available", offer.quantity, offer.unit)));
        }

        let proposal = self.db.marketplace.create_proposal(offer_id, ctx.user_id, request).await?;
        log_user_action(ctx.user_id, "create_proposal", Some(&proposal.id.to_string()));

        self.notifications.dispatch(
            NotificationEvent::new(
                "marketplace.proposal_received",
                "New proposal",
                format!("{} proposed {} per {} on {}", ctx.name, proposal.unit_price, offer.unit, offer.title),
                Audience::User(offer.seller_id),
            )
            .with_link(format!("/marketplace/offers/{}", offer_id)),
        );

        Ok(proposal)
    }

    /// The seller sees every proposal; everyone else only their own
    pub async fn list_proposals(&self, ctx: &AuthContext, offer_id: Uuid) -> Result<Vec<Proposal>> {
        let offer = self.get_offer(offer_id).await?;
        let proposals = self.db.marketplace.list_proposals(offer_id).await?;

        if offer.seller_id == ctx.user_id || ctx.is_master() {
            Ok(proposals)
        } else {
            Ok(proposals.into_iter().filter(|p| p.proposer_id == ctx.user_id).collect())
        }
    }

    pub async fn accept_proposal(&self, ctx: &AuthContext, id: Uuid) -> Result<Transaction> {
        let mut tx = self.db.begin().await?;
        let proposal = MarketplaceRepository::lock_proposal(&mut tx, id)
            .await?
            .ok_or_else(|| CoopError::not_found("proposal", id))?;
        let offer = MarketplaceRepository::lock_offer(&mut tx, proposal.offer_id)
            .await?
            .ok_or_else(|| CoopError::not_found("offer", proposal.offer_id))?;

        if offer.seller_id != ctx.user_id {
            return Err(CoopError::PermissionDenied("Only the seller can accept proposals".to_string()));
        }
        if proposal.status != ProposalStatus::Pending {
            return Err(CoopError::BusinessRule("Proposal is no longer pending".to_string()));
        }
        if !offer.is_open() {
            return Err(CoopError::BusinessRule("Offer is no longer active".to_string()));
        }
        if proposal.quantity > offer.quantity {
            return Err(CoopError::BusinessRule(format!("Only {} {} available", offer.quantity, offer.unit)));
        }

        MarketplaceRepository::set_proposal_status(&mut tx, id, ProposalStatus::Accepted).await?;
        let remaining = MarketplaceRepository::reduce_quantity(&mut tx, offer.id, proposal.quantity).await?;
        if remaining.status == OfferStatus::Sold {
            MarketplaceRepository::reject_pending_proposals(&mut tx, offer.id).await?;
        }
        let transaction = MarketplaceRepository::insert_transaction(
            &mut tx,
            NewTransaction {
                offer_id: Some(offer.id),
                buyer_id: proposal.proposer_id,
                seller_id: Some(offer.seller_id),
                quantity: proposal.quantity,
                unit_price: proposal.unit_price,
                status: TransactionStatus::Pending,
                source: TransactionSource::Proposal,
                reference_id: Some(proposal.id),
            },
        )
        .await?;
        tx.commit().await?;

        info!(proposal_id = %id, transaction_id = %transaction.id, "Proposal accepted");

        self.notifications.dispatch(
            NotificationEvent::new(
                "marketplace.proposal_accepted",
                "Proposal accepted",
                format!("Your proposal on {} was accepted", offer.title),
                Audience::User(proposal.proposer_id),
            )
            .with_link(format!("/marketplace/transactions/{}", transaction.id)),
        );

        Ok(transaction)
    }

    pub async fn reject_proposal(&self, ctx: &AuthContext, id: Uuid) -> Result<Proposal> {
        let mut tx = self.db.begin().await?;
        let proposal = MarketplaceRepository::lock_proposal(&mut tx, id)
            .await?
            .ok_or_else(|| CoopError::not_found("proposal", id))?;
        let offer = self.get_offer(proposal.offer_id).await?;

        if offer.seller_id != ctx.user_id {
            return Err(CoopError::PermissionDenied("Only the seller can reject proposals".to_string()));
        }
        if proposal.status != ProposalStatus::Pending {
            return Err(CoopError::BusinessRule("Proposal is no longer pending".to_string()));
        }

        let rejected = MarketplaceRepository::set_proposal_status(&mut tx, id, ProposalStatus::Rejected).await?;
        tx.commit().await?;

        self.notifications.dispatch(NotificationEvent::new(
            "marketplace.proposal_rejected",
            "Proposal rejected",
            format!("Your proposal on {} was rejected", offer.title),
            Audience::User(proposal.proposer_id),
        ));

        Ok(rejected)
    }

    pub async fn withdraw_proposal(&self, ctx: &AuthContext, id: Uuid) -> Result<Proposal> {
        let mut tx = self.db.begin().await?;
        let proposal = MarketplaceRepository::lock_proposal(&mut tx, id)
            .await?
            .ok_or_else(|| CoopError::not_found("proposal", id))?;

        if proposal.proposer_id != ctx.user_id {
            return Err(CoopError::PermissionDenied("Only the proposer can withdraw a proposal".to_string()));
        }
        if proposal.status != ProposalStatus::Pending {
            return Err(CoopError::BusinessRule("Proposal is no longer pending".to_string()));
        }

        let withdrawn = MarketplaceRepository::set_proposal_status(&mut tx, id, ProposalStatus::Withdrawn).await?;
        tx.commit().await?;
        Ok(withdrawn)
    }

    /// Staff see every transaction; other users the ones they take part in
    pub async fn list_transactions(&self, ctx: &AuthContext, limit: i64, offset: i64) -> Result<Vec<Transaction>> {
        let user_id = if ctx.is_staff() { None } else { Some(ctx.user_id) };
        self.db.marketplace.list_transactions(user_id, limit, offset).await
    }

    pub async fn get_transaction(&self, ctx: &AuthContext, id: Uuid) -> Result<Transaction> {
        let transaction = self
            .db
            .marketplace
            .find_transaction(id)
            .await?
            .ok_or_else(|| CoopError::not_found("transaction", id))?;
        if !transaction.involves(ctx.user_id) && !ctx.is_staff() {
            return Err(CoopError::PermissionDenied("Not a party to this transaction".to_string()));
        }
        Ok(transaction)
    }

    /// Move a transaction along its state machine.
    ///
    /// Completion writes the ledger; cancellation releases stock and refunds
    /// claim debits in the same database transaction.
    pub async fn update_transaction_status(&self, ctx: &AuthContext, id: Uuid, next: TransactionStatus) -> Result<Transaction> {
        let mut tx = self.db.begin().await?;
        let transaction = MarketplaceRepository::lock_transaction(&mut tx, id)
            .await?
            .ok_or_else(|| CoopError::not_found("transaction", id))?;

        if !transaction.involves(ctx.user_id) && !ctx.is_master() {
            return Err(CoopError::PermissionDenied("Not a party to this transaction".to_string()));
        }
        if !transaction.status.can_transition_to(next) {
            return Err(CoopError::BusinessRule(format!(
                "Cannot move a transaction from {:?} to {:?}",
                transaction.status, next
            )));
        }

        let updated = MarketplaceRepository::set_transaction_status(&mut tx, id, next).await?;
        match next {
            TransactionStatus::Completed => {
                for movement in completion_movements(&updated) {
                    FinancialRepository::insert(&mut tx, movement, Some(ctx.user_id)).await?;
                }
            }
            TransactionStatus::Cancelled => release_cancelled(&mut tx, &updated, ctx.user_id).await?,
            _ => {}
        }
        tx.commit().await?;

        info!(transaction_id = %id, from = ?transaction.status, to = ?next, "Transaction status changed");

        let counterparts: Vec<Uuid> = [Some(updated.buyer_id), updated.seller_id]
            .into_iter()
            .flatten()
            .filter(|id| *id != ctx.user_id)
            .collect();
        if !counterparts.is_empty() {
            self.notifications.dispatch(
                NotificationEvent::new(
                    "marketplace.transaction_updated",
                    "Transaction updated",
                    format!("Transaction moved to {:?}", next).to_lowercase(),
                    Audience::Users(counterparts),
                )
                .with_link(format!("/marketplace/transactions/{}", id)),
            );
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction(source: TransactionSource, seller: Option<Uuid>) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            offer_id: None,
            buyer_id: Uuid::new_v4(),
            seller_id: seller,
            quantity: Decimal::new(2, 0),
            unit_price: Decimal::new(1050, 2),
            total_amount: Decimal::new(2100, 2),
            status: TransactionStatus::Completed,
            source,
            reference_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_completion_debits_buyer_and_credits_seller() {
        let seller = Uuid::new_v4();
        let tx = transaction(TransactionSource::Direct, Some(seller));
        let movements = completion_movements(&tx);

        assert_eq!(movements.len(), 2);
        assert_eq!(movements[0].user_id, tx.buyer_id);
        assert_eq!(movements[0].kind, MovementKind::Debit);
        assert_eq!(movements[1].user_id, seller);
        assert_eq!(movements[1].kind, MovementKind::Credit);
        assert!(movements.iter().all(|m| m.amount == Decimal::new(2100, 2)));
    }

    #[test]
    fn test_claims_are_not_charged_twice() {
        let tx = transaction(TransactionSource::FlashDeal, Some(Uuid::new_v4()));
        assert!(completion_movements(&tx).is_empty());
        let tx = transaction(TransactionSource::StrategicReserve, None);
        assert!(completion_movements(&tx).is_empty());
    }
}
