//! Financial ledger service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;
use crate::database::DatabaseService;
use crate::models::amount::ensure_storable;
use crate::models::financial::{Balance, CreateMovementRequest, FinancialMovement, FinancialSummary, MovementFilter};
use crate::models::role::PERM_FINANCIAL_VIEW;
use crate::services::auth::{AuthContext, AuthService};
use crate::utils::errors::{CoopError, Result};
use crate::utils::logging::log_admin_action;

#[derive(Clone)]
pub struct FinancialService {
    db: DatabaseService,
    auth: AuthService,
}

impl FinancialService {
    pub fn new(db: DatabaseService, auth: AuthService) -> Self {
        Self { db, auth }
    }

    async fn sees_everyone(&self, ctx: &AuthContext) -> Result<bool> {
        Ok(ctx.is_staff() || self.auth.has_permission(ctx, PERM_FINANCIAL_VIEW).await?)
    }

    /// User whose ledger the caller asked for, falling back to their own
    async fn scoped_user(&self, ctx: &AuthContext, requested: Option<Uuid>) -> Result<Uuid> {
        match requested {
            Some(user_id) if user_id != ctx.user_id => {
                if self.sees_everyone(ctx).await? {
                    Ok(user_id)
                } else {
                    Err(CoopError::PermissionDenied("Cannot view another user's ledger".to_string()))
                }
            }
            _ => Ok(ctx.user_id),
        }
    }

    /// Record a manual movement
    pub async fn record(&self, ctx: &AuthContext, request: CreateMovementRequest) -> Result<FinancialMovement> {
        if !ctx.is_staff() {
            return Err(CoopError::PermissionDenied("Only staff can record movements".to_string()));
        }
        if request.amount <= Decimal::ZERO {
            return Err(CoopError::InvalidInput("Amount must be positive".to_string()));
        }
        ensure_storable(request.amount, "Amount")?;
        if request.category.trim().is_empty() {
            return Err(CoopError::InvalidInput("Category is required".to_string()));
        }
        if self.db.users.find_by_id(request.user_id).await?.is_none() {
            return Err(CoopError::not_found("user", request.user_id));
        }

        let movement = self.db.financial.create(request, ctx.user_id).await?;
        log_admin_action(
            ctx.user_id,
            "record_movement",
            Some(&movement.user_id.to_string()),
            Some(&format!("{:?} {} {}", movement.kind, movement.amount, movement.category)),
        );
        Ok(movement)
    }

    /// Everyone's movements for staff; unprivileged callers only see their own
    pub async fn list(&self, ctx: &AuthContext, mut filter: MovementFilter, limit: i64, offset: i64) -> Result<Vec<FinancialMovement>> {
        if !self.sees_everyone(ctx).await? {
            if filter.user_id.map(|u| u != ctx.user_id).unwrap_or(false) {
                return Err(CoopError::PermissionDenied("Cannot view another user's ledger".to_string()));
            }
            filter.user_id = Some(ctx.user_id);
        }
        self.db.financial.list(&filter, limit, offset).await
    }

    pub async fn balance(&self, ctx: &AuthContext, user_id: Option<Uuid>) -> Result<Balance> {
        let user_id = self.scoped_user(ctx, user_id).await?;
        let (credits, debits) = self.db.financial.totals(user_id).await?;
        Ok(Balance::new(user_id, credits, debits))
    }

    pub async fn summary(
        &self,
        ctx: &AuthContext,
        user_id: Option<Uuid>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<FinancialSummary> {
        if let (Some(from), Some(to)) = (from, to) {
            if from >= to {
                return Err(CoopError::InvalidInput("Period start must precede its end".to_string()));
            }
        }
        let user_id = self.scoped_user(ctx, user_id).await?;
        let filter = MovementFilter { user_id: Some(user_id), from, to, category: None };
        let by_category = self.db.financial.category_totals(&filter).await?;
        Ok(FinancialSummary::from_totals(user_id, from, to, by_category))
    }
}
