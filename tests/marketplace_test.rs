//! Marketplace transactions against a real database
//!
//! Covers purchase, proposal and auction flows through completion and
//! cancellation, and cancellation of flash deal and reserve claims.

mod helpers;

use assert_matches::assert_matches;
use coopfarma::models::marketplace::{CreateProposalRequest, OfferStatus, TransactionSource, TransactionStatus};
use coopfarma::models::user::UserRole;
use coopfarma::CoopError;
use helpers::*;
use rust_decimal::Decimal;
use serial_test::serial;

macro_rules! context_or_skip {
    () => {
        match TestContext::try_new().await {
            Some(ctx) => ctx,
            None => return,
        }
    };
}

#[tokio::test]
#[serial]
async fn test_direct_purchase_completes_with_debit_and_credit() {
    let ctx = context_or_skip!();
    let seller = ctx.create_user(UserRole::Fornecedor, None).await;
    let buyer = ctx.create_user(UserRole::Cooperado, Some("12345678000199")).await;
    let substance = ctx.create_substance("Ácido kójico").await;
    let market = &ctx.state.services.marketplace;

    let offer = market.create_offer(&seller.ctx, fixed_price_offer(substance.id, 10)).await.unwrap();
    let transaction = market.buy_offer(&buyer.ctx, offer.id, Decimal::new(4, 0)).await.unwrap();
    assert_eq!(transaction.status, TransactionStatus::Pending);
    assert_eq!(transaction.total_amount, Decimal::new(5000, 2));
    assert_eq!(market.get_offer(offer.id).await.unwrap().quantity, Decimal::new(6, 0));

    // Completion straight from pending is not allowed
    assert_matches!(
        market.update_transaction_status(&buyer.ctx, transaction.id, TransactionStatus::Completed).await,
        Err(CoopError::BusinessRule(_))
    );

    market.update_transaction_status(&seller.ctx, transaction.id, TransactionStatus::Confirmed).await.unwrap();
    let completed = market
        .update_transaction_status(&buyer.ctx, transaction.id, TransactionStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.status, TransactionStatus::Completed);
    assert_eq!(ctx.database.count_records("financial_movements").await.unwrap(), 2);

    let buyer_balance = ctx.state.services.financial.balance(&buyer.ctx, None).await.unwrap();
    assert_eq!(buyer_balance.debits, Decimal::new(5000, 2));
    assert_eq!(buyer_balance.credits, Decimal::ZERO);
    let seller_balance = ctx.state.services.financial.balance(&seller.ctx, None).await.unwrap();
    assert_eq!(seller_balance.credits, Decimal::new(5000, 2));

    assert_matches!(
        market.update_transaction_status(&buyer.ctx, transaction.id, TransactionStatus::Cancelled).await,
        Err(CoopError::BusinessRule(_))
    );
}

#[tokio::test]
#[serial]
async fn test_cancelled_purchase_returns_quantity_to_offer() {
    let ctx = context_or_skip!();
    let seller = ctx.create_user(UserRole::Fornecedor, None).await;
    let buyer = ctx.create_user(UserRole::Cooperado, Some("12345678000199")).await;
    let substance = ctx.create_substance("Nicotinamida").await;
    let market = &ctx.state.services.marketplace;

    let offer = market.create_offer(&seller.ctx, fixed_price_offer(substance.id, 5)).await.unwrap();
    let transaction = market.buy_offer(&buyer.ctx, offer.id, Decimal::new(5, 0)).await.unwrap();
    let sold_out = market.get_offer(offer.id).await.unwrap();
    assert_eq!(sold_out.status, OfferStatus::Sold);
    assert_eq!(sold_out.quantity, Decimal::ZERO);

    let cancelled = market
        .update_transaction_status(&buyer.ctx, transaction.id, TransactionStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, TransactionStatus::Cancelled);

    let restored = market.get_offer(offer.id).await.unwrap();
    assert_eq!(restored.status, OfferStatus::Active);
    assert_eq!(restored.quantity, Decimal::new(5, 0));
    assert_eq!(ctx.database.count_records("financial_movements").await.unwrap(), 0);

    // The returned stock can be bought again
    market.buy_offer(&buyer.ctx, offer.id, Decimal::new(2, 0)).await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_cancelled_proposal_transaction_restores_offer() {
    let ctx = context_or_skip!();
    let seller = ctx.create_user(UserRole::Cooperativa, None).await;
    let proposer = ctx.create_user(UserRole::Cooperado, Some("12345678000199")).await;
    let substance = ctx.create_substance("Pantenol").await;
    let market = &ctx.state.services.marketplace;

    let offer = market.create_offer(&seller.ctx, fixed_price_offer(substance.id, 10)).await.unwrap();
    let proposal = market
        .create_proposal(
            &proposer.ctx,
            offer.id,
            CreateProposalRequest {
                quantity: Decimal::new(3, 0),
                unit_price: Decimal::new(11, 0),
                message: Some("Pagamento à vista".to_string()),
            },
        )
        .await
        .unwrap();

    assert_matches!(market.accept_proposal(&proposer.ctx, proposal.id).await, Err(CoopError::PermissionDenied(_)));

    let transaction = market.accept_proposal(&seller.ctx, proposal.id).await.unwrap();
    assert_eq!(transaction.source, TransactionSource::Proposal);
    assert_eq!(transaction.buyer_id, proposer.user.id);
    assert_eq!(transaction.total_amount, Decimal::new(33, 0));
    assert_eq!(market.get_offer(offer.id).await.unwrap().quantity, Decimal::new(7, 0));

    market
        .update_transaction_status(&seller.ctx, transaction.id, TransactionStatus::Cancelled)
        .await
        .unwrap();
    let restored = market.get_offer(offer.id).await.unwrap();
    assert_eq!(restored.quantity, Decimal::new(10, 0));
    assert_eq!(restored.status, OfferStatus::Active);
}

#[tokio::test]
#[serial]
async fn test_auction_close_picks_highest_bid_and_cancel_closes_lot() {
    let ctx = context_or_skip!();
    let seller = ctx.create_user(UserRole::Fornecedor, None).await;
    let first = ctx.create_user(UserRole::Cooperado, Some("11111111000111")).await;
    let second = ctx.create_user(UserRole::Cooperado, Some("22222222000122")).await;
    let substance = ctx.create_substance("Resveratrol").await;
    let market = &ctx.state.services.marketplace;

    let offer = market.create_offer(&seller.ctx, auction_offer(substance.id)).await.unwrap();
    market.place_bid(&first.ctx, offer.id, Decimal::new(10, 0)).await.unwrap();
    assert_matches!(
        market.place_bid(&second.ctx, offer.id, Decimal::new(1050, 2)).await,
        Err(CoopError::BusinessRule(_))
    );
    market.place_bid(&second.ctx, offer.id, Decimal::new(12, 0)).await.unwrap();

    assert_matches!(market.close_auction(&seller.ctx, offer.id).await, Err(CoopError::BusinessRule(_)));

    sqlx::query("UPDATE marketplace_offers SET auction_ends_at = NOW() - INTERVAL '1 minute' WHERE id = $1")
        .bind(offer.id)
        .execute(&ctx.database.pool)
        .await
        .unwrap();

    let (closed, transaction) = market.close_auction(&seller.ctx, offer.id).await.unwrap();
    assert_eq!(closed.status, OfferStatus::Sold);
    let transaction = transaction.expect("auction with bids has a winner");
    assert_eq!(transaction.buyer_id, second.user.id);
    assert_eq!(transaction.source, TransactionSource::Auction);
    assert_eq!(transaction.total_amount, Decimal::new(1200, 0));

    market
        .update_transaction_status(&second.ctx, transaction.id, TransactionStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(market.get_offer(offer.id).await.unwrap().status, OfferStatus::Closed);
    assert_eq!(ctx.database.count_records("financial_movements").await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn test_cancelled_flash_deal_claim_is_refunded_and_released() {
    let ctx = context_or_skip!();
    let admin = ctx.create_user(UserRole::Cooperativa, None).await;
    let member = ctx.create_user(UserRole::Cooperado, Some("33333333000133")).await;
    let substance = ctx.create_substance("Melatonina").await;
    let deals = &ctx.state.services.flash_deals;

    let deal = deals.create(&admin.ctx, flash_deal_request(substance.id, 10, Some(3))).await.unwrap();
    let receipt = deals.claim(&member.ctx, deal.id, Decimal::new(3, 0)).await.unwrap();
    assert_eq!(receipt.transaction.status, TransactionStatus::Confirmed);
    assert_matches!(deals.claim(&member.ctx, deal.id, Decimal::ONE).await, Err(CoopError::PermissionDenied(_)));

    ctx.state
        .services
        .marketplace
        .update_transaction_status(&member.ctx, receipt.transaction.id, TransactionStatus::Cancelled)
        .await
        .unwrap();

    let balance = ctx.state.services.financial.balance(&member.ctx, None).await.unwrap();
    assert_eq!(balance.debits, Decimal::new(750, 2));
    assert_eq!(balance.credits, Decimal::new(750, 2));
    assert_eq!(balance.balance, Decimal::ZERO);

    assert_eq!(deals.get(deal.id).await.unwrap().remaining_stock, Decimal::new(10, 0));
    assert_eq!(ctx.database.count_records("flash_deal_claims").await.unwrap(), 0);

    // The per-user limit is available again
    deals.claim(&member.ctx, deal.id, Decimal::new(3, 0)).await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_cancelled_reserve_claim_frees_cnpj_share() {
    let ctx = context_or_skip!();
    let admin = ctx.create_user(UserRole::Cooperativa, None).await;
    let member = ctx.create_user(UserRole::Cooperado, Some("44444444000144")).await;
    ctx.create_user(UserRole::Cooperado, Some("55555555000155")).await;
    let substance = ctx.create_substance("Dutasterida").await;
    let reserves = &ctx.state.services.reserves;

    let quota = reserves.create(&admin.ctx, reserve_request(substance.id, 10)).await.unwrap();
    assert_eq!(quota.share_per_cnpj, Decimal::new(5, 0));

    let receipt = reserves.claim(&member.ctx, quota.id, Decimal::new(5, 0)).await.unwrap();
    assert_matches!(reserves.claim(&member.ctx, quota.id, Decimal::ONE).await, Err(CoopError::PermissionDenied(_)));

    ctx.state
        .services
        .marketplace
        .update_transaction_status(&member.ctx, receipt.transaction.id, TransactionStatus::Cancelled)
        .await
        .unwrap();

    let status = reserves.status(&member.ctx, quota.id).await.unwrap();
    assert_eq!(status.total_claimed, Decimal::ZERO);
    assert_eq!(status.cnpj_remaining, Some(Decimal::new(5, 0)));

    let balance = ctx.state.services.financial.balance(&member.ctx, None).await.unwrap();
    assert_eq!(balance.balance, Decimal::ZERO);

    reserves.claim(&member.ctx, quota.id, Decimal::new(5, 0)).await.unwrap();
}
