//! Marketplace repository: offers, bids, proposals and transactions

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use crate::models::marketplace::{
    AuctionBid, CreateOfferRequest, CreateProposalRequest, MarketplaceOffer, NewTransaction,
    OfferFilter, OfferStatus, Proposal, ProposalStatus, Transaction, TransactionStatus,
};
use crate::utils::errors::CoopError;

#[derive(Clone, Debug)]
pub struct MarketplaceRepository {
    pool: PgPool,
}

impl MarketplaceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_offer(&self, seller_id: Uuid, request: CreateOfferRequest) -> Result<MarketplaceOffer, CoopError> {
        let offer = sqlx::query_as::<_, MarketplaceOffer>(
            r#"
            INSERT INTO marketplace_offers
                (id, seller_id, substance_id, raw_material_id, title, description, kind, quantity, unit,
                 unit_price, min_bid_increment, auction_ends_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(seller_id)
        .bind(request.substance_id)
        .bind(request.raw_material_id)
        .bind(request.title)
        .bind(request.description)
        .bind(request.kind)
        .bind(request.quantity)
        .bind(request.unit)
        .bind(request.unit_price)
        .bind(request.min_bid_increment)
        .bind(request.auction_ends_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(offer)
    }

    pub async fn find_offer(&self, id: Uuid) -> Result<Option<MarketplaceOffer>, CoopError> {
        let offer = sqlx::query_as::<_, MarketplaceOffer>("SELECT * FROM marketplace_offers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(offer)
    }

    pub async fn lock_offer(conn: &mut PgConnection, id: Uuid) -> Result<Option<MarketplaceOffer>, CoopError> {
        let offer = sqlx::query_as::<_, MarketplaceOffer>("SELECT * FROM marketplace_offers WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(offer)
    }

    /// Active offers by default; `filter.status` overrides
    pub async fn list_offers(&self, filter: &OfferFilter, limit: i64, offset: i64) -> Result<Vec<MarketplaceOffer>, CoopError> {
        let offers = sqlx::query_as::<_, MarketplaceOffer>(
            r#"
            SELECT * FROM marketplace_offers
            WHERE status = $1
              AND ($2::uuid IS NULL OR substance_id = $2)
              AND ($3::offer_kind IS NULL OR kind = $3)
              AND ($4::uuid IS NULL OR seller_id = $4)
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#
        )
        .bind(filter.status.unwrap_or(OfferStatus::Active))
        .bind(filter.substance_id)
        .bind(filter.kind)
        .bind(filter.seller_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(offers)
    }

    pub async fn set_offer_status(conn: &mut PgConnection, id: Uuid, status: OfferStatus) -> Result<MarketplaceOffer, CoopError> {
        let offer = sqlx::query_as::<_, MarketplaceOffer>(
            "UPDATE marketplace_offers SET status = $2, updated_at = $3 WHERE id = $1 RETURNING *"
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(offer)
    }

    /// Take `quantity` out of an offer; it becomes `sold` when nothing is left
    pub async fn reduce_quantity(conn: &mut PgConnection, id: Uuid, quantity: Decimal) -> Result<MarketplaceOffer, CoopError> {
        let offer = sqlx::query_as::<_, MarketplaceOffer>(
            r#"
            UPDATE marketplace_offers
            SET quantity = quantity - $2,
                status = CASE WHEN quantity - $2 <= 0 THEN 'sold'::offer_status ELSE status END,
                updated_at = $3
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(offer)
    }

    /// Put `quantity` back into an offer; a sold-out offer becomes active again
    pub async fn restore_quantity(conn: &mut PgConnection, id: Uuid, quantity: Decimal) -> Result<MarketplaceOffer, CoopError> {
        let offer = sqlx::query_as::<_, MarketplaceOffer>(
            r#"
            UPDATE marketplace_offers
            SET quantity = quantity + $2,
                status = CASE WHEN status = 'sold' THEN 'active'::offer_status ELSE status END,
                updated_at = $3
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(offer)
    }

    pub async fn highest_bid(conn: &mut PgConnection, offer_id: Uuid) -> Result<Option<AuctionBid>, CoopError> {
        let bid = sqlx::query_as::<_, AuctionBid>(
            "SELECT * FROM auction_bids WHERE offer_id = $1 ORDER BY unit_price DESC, created_at ASC LIMIT 1"
        )
        .bind(offer_id)
        .fetch_optional(conn)
        .await?;

        Ok(bid)
    }

    pub async fn insert_bid(conn: &mut PgConnection, offer_id: Uuid, bidder_id: Uuid, unit_price: Decimal) -> Result<AuctionBid, CoopError> {
        let bid = sqlx::query_as::<_, AuctionBid>(
            r#"
            INSERT INTO auction_bids (id, offer_id, bidder_id, unit_price, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(offer_id)
        .bind(bidder_id)
        .bind(unit_price)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(bid)
    }

    pub async fn list_bids(&self, offer_id: Uuid) -> Result<Vec<AuctionBid>, CoopError> {
        let bids = sqlx::query_as::<_, AuctionBid>(
            "SELECT * FROM auction_bids WHERE offer_id = $1 ORDER BY unit_price DESC, created_at ASC"
        )
        .bind(offer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bids)
    }

    pub async fn create_proposal(&self, offer_id: Uuid, proposer_id: Uuid, request: CreateProposalRequest) -> Result<Proposal, CoopError> {
        let proposal = sqlx::query_as::<_, Proposal>(
            r#"
            INSERT INTO proposals (id, offer_id, proposer_id, quantity, unit_price, message, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(offer_id)
        .bind(proposer_id)
        .bind(request.quantity)
        .bind(request.unit_price)
        .bind(request.message)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(proposal)
    }

    pub async fn lock_proposal(conn: &mut PgConnection, id: Uuid) -> Result<Option<Proposal>, CoopError> {
        let proposal = sqlx::query_as::<_, Proposal>("SELECT * FROM proposals WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(proposal)
    }

    pub async fn list_proposals(&self, offer_id: Uuid) -> Result<Vec<Proposal>, CoopError> {
        let proposals = sqlx::query_as::<_, Proposal>(
            "SELECT * FROM proposals WHERE offer_id = $1 ORDER BY created_at DESC"
        )
        .bind(offer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(proposals)
    }

    pub async fn set_proposal_status(conn: &mut PgConnection, id: Uuid, status: ProposalStatus) -> Result<Proposal, CoopError> {
        let proposal = sqlx::query_as::<_, Proposal>(
            "UPDATE proposals SET status = $2, updated_at = $3 WHERE id = $1 RETURNING *"
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(proposal)
    }

    /// Reject every other pending proposal on an offer once it is sold out
    pub async fn reject_pending_proposals(conn: &mut PgConnection, offer_id: Uuid) -> Result<u64, CoopError> {
        let result = sqlx::query(
            "UPDATE proposals SET status = 'rejected', updated_at = $2 WHERE offer_id = $1 AND status = 'pending'"
        )
        .bind(offer_id)
        .bind(Utc::now())
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn insert_transaction(conn: &mut PgConnection, tx: NewTransaction) -> Result<Transaction, CoopError> {
        let total_amount = tx.total_amount()?;
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions
                (id, offer_id, buyer_id, seller_id, quantity, unit_price, total_amount, status, source, reference_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(tx.offer_id)
        .bind(tx.buyer_id)
        .bind(tx.seller_id)
        .bind(tx.quantity)
        .bind(tx.unit_price)
        .bind(total_amount)
        .bind(tx.status)
        .bind(tx.source)
        .bind(tx.reference_id)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(transaction)
    }

    pub async fn find_transaction(&self, id: Uuid) -> Result<Option<Transaction>, CoopError> {
        let transaction = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(transaction)
    }

    pub async fn lock_transaction(conn: &mut PgConnection, id: Uuid) -> Result<Option<Transaction>, CoopError> {
        let transaction = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(transaction)
    }

    /// Transactions where the user is buyer or seller; everything when `user_id` is `None`
    pub async fn list_transactions(&self, user_id: Option<Uuid>, limit: i64, offset: i64) -> Result<Vec<Transaction>, CoopError> {
        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE ($1::uuid IS NULL OR buyer_id = $1 OR seller_id = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    pub async fn set_transaction_status(conn: &mut PgConnection, id: Uuid, status: TransactionStatus) -> Result<Transaction, CoopError> {
        let transaction = sqlx::query_as::<_, Transaction>(
            "UPDATE transactions SET status = $2, updated_at = $3 WHERE id = $1 RETURNING *"
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(transaction)
    }
}
