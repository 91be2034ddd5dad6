//! Flash deal service
//!
//! Claims run in one transaction against the locked deal row, so concurrent
//! claimers serialize and remaining stock never goes negative.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use crate::database::DatabaseService;
use crate::database::repositories::{purchase_debit, FinancialRepository, FlashDealRepository, MarketplaceRepository};
use crate::models::flash_deal::{CreateFlashDealRequest, FlashDeal, FlashDealClaim, FlashDealView};
use crate::models::marketplace::{NewTransaction, Transaction, TransactionSource, TransactionStatus};
use crate::models::notification::{Audience, NotificationEvent};
use crate::models::user::UserRole;
use crate::services::auth::AuthContext;
use crate::services::notification::NotificationService;
use crate::utils::errors::{CoopError, Result};
use crate::utils::logging::{log_admin_action, log_claim};

pub const FLASH_DEAL_CATEGORY: &str = "flash_deal";

/// Everything a successful claim produced
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashDealReceipt {
    pub claim: FlashDealClaim,
    pub transaction: Transaction,
    pub remaining_stock: Decimal,
}

#[derive(Clone)]
pub struct FlashDealService {
    db: DatabaseService,
    notifications: NotificationService,
}

impl FlashDealService {
    pub fn new(db: DatabaseService, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    pub async fn create(&self, ctx: &AuthContext, request: CreateFlashDealRequest) -> Result<FlashDeal> {
        ctx.require_role(&[UserRole::Cooperativa])?;
        request.validate(Utc::now())?;

        let substance = self
            .db
            .substances
            .find_by_id(request.substance_id)
            .await?
            .ok_or_else(|| CoopError::not_found("substance", request.substance_id))?;

        let deal = self.db.flash_deals.create(ctx.user_id, request).await?;
        log_admin_action(ctx.user_id, "create_flash_deal", Some(&deal.id.to_string()), Some(&substance.name));

        self.notifications.dispatch(
            NotificationEvent::new(
                "flash_deal.created",
                format!("Flash deal: {}", deal.title),
                format!("{} {} of {} at {}", deal.stock_limit, deal.unit, substance.name, deal.unit_price),
                Audience::Role(UserRole::Cooperado),
            )
            .with_link(format!("/marketplace/flash-deals/{}", deal.id))
            .with_data(serde_json::json!({ "dealId": deal.id, "endsAt": deal.ends_at })),
        );

        Ok(deal)
    }

    pub async fn get(&self, id: Uuid) -> Result<FlashDealView> {
        let deal = self
            .db
            .flash_deals
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoopError::not_found("flash deal", id))?;
        Ok(FlashDealView::new(deal, Utc::now()))
    }

    pub async fn list_active(&self) -> Result<Vec<FlashDealView>> {
        let now = Utc::now();
        let deals = self.db.flash_deals.list_active(now).await?;
        Ok(deals.into_iter().map(|d| FlashDealView::new(d, now)).collect())
    }

    pub async fn deactivate(&self, ctx: &AuthContext, id: Uuid) -> Result<FlashDeal> {
        ctx.require_role(&[UserRole::Master, UserRole::Cooperativa])?;
        let deal = self.db.flash_deals.deactivate(id).await?;
        log_admin_action(ctx.user_id, "deactivate_flash_deal", Some(&id.to_string()), None);
        Ok(deal)
    }

    /// Claim `quantity` from a live deal
    pub async fn claim(&self, ctx: &AuthContext, id: Uuid, quantity: Decimal) -> Result<FlashDealReceipt> {
        ctx.require_role(&[UserRole::Cooperado])?;

        let mut tx = self.db.begin().await?;
        let deal = FlashDealRepository::lock(&mut tx, id)
            .await?
            .ok_or_else(|| CoopError::not_found("flash deal", id))?;
        let user_claimed = FlashDealRepository::user_claimed(&mut tx, id, ctx.user_id).await?;

        if let Err(e) = deal.check_claim(quantity, user_claimed, Utc::now()) {
            log_claim("flash_deal", id, ctx.user_id, &quantity.to_string(), false);
            return Err(e);
        }

        let updated = FlashDealRepository::add_claimed(&mut tx, id, quantity).await?;
        let claim = FlashDealRepository::insert_claim(&mut tx, id, ctx.user_id, quantity).await?;
        let transaction = MarketplaceRepository::insert_transaction(
            &mut tx,
            NewTransaction {
                offer_id: None,
                buyer_id: ctx.user_id,
                seller_id: Some(deal.created_by),
                quantity,
                unit_price: deal.unit_price,
                status: TransactionStatus::Confirmed,
                source: TransactionSource::FlashDeal,
                reference_id: Some(claim.id),
            },
        )
        .await?;
        FinancialRepository::insert(
            &mut tx,
            purchase_debit(ctx.user_id, transaction.total_amount, FLASH_DEAL_CATEGORY, "flash_deal_claim", claim.id),
            Some(ctx.user_id),
        )
        .await?;
        tx.commit().await?;

        log_claim("flash_deal", id, ctx.user_id, &quantity.to_string(), true);
        if updated.remaining_stock() == Decimal::ZERO {
            info!(deal_id = %id, "Flash deal sold out");
        }

        Ok(FlashDealReceipt {
            claim,
            transaction,
            remaining_stock: updated.remaining_stock(),
        })
    }

    pub async fn my_claims(&self, ctx: &AuthContext) -> Result<Vec<FlashDealClaim>> {
        self.db.flash_deals.claims_for_user(ctx.user_id).await
    }
}
