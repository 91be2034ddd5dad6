//! Quotation service
//!
//! Members ask for prices, eligible suppliers answer in whatever package
//! they sell, and answers are compared per base unit.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use crate::database::DatabaseService;
use crate::database::repositories::QuotationRepository;
use crate::models::amount::ensure_storable;
use crate::models::notification::{Audience, NotificationEvent};
use crate::models::quotation::{
    compare_responses, normalized_unit_price, parse_unit, ComparedResponse, CreateQuotationRequest,
    CreateQuotationResponseRequest, Quotation, QuotationResponse, QuotationStatus,
};
use crate::models::user::UserRole;
use crate::services::auth::AuthContext;
use crate::services::notification::NotificationService;
use crate::services::qualification::QualificationService;
use crate::utils::errors::{CoopError, Result};
use crate::utils::logging::log_user_action;

const REQUESTERS: [UserRole; 2] = [UserRole::Cooperado, UserRole::Cooperativa];

/// Quotation with its ranked responses
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationComparison {
    pub quotation: Quotation,
    pub responses: Vec<ComparedResponse>,
}

#[derive(Clone)]
pub struct QuotationService {
    db: DatabaseService,
    qualification: QualificationService,
    notifications: NotificationService,
}

impl QuotationService {
    pub fn new(db: DatabaseService, qualification: QualificationService, notifications: NotificationService) -> Self {
        Self { db, qualification, notifications }
    }

    pub async fn create(&self, ctx: &AuthContext, request: CreateQuotationRequest) -> Result<Quotation> {
        ctx.require_role(&REQUESTERS)?;

        if request.quantity <= Decimal::ZERO {
            return Err(CoopError::InvalidInput("Quantity must be positive".to_string()));
        }
        ensure_storable(request.quantity, "Quantity")?;
        if parse_unit(&request.unit).is_none() {
            return Err(CoopError::InvalidInput(format!("Unknown unit: {}", request.unit)));
        }
        if request.closes_at.map(|c| c <= Utc::now()).unwrap_or(false) {
            return Err(CoopError::InvalidInput("Deadline must be in the future".to_string()));
        }
        let substance = self
            .db
            .substances
            .find_by_id(request.substance_id)
            .await?
            .ok_or_else(|| CoopError::not_found("substance", request.substance_id))?;

        let quotation = self.db.quotations.create(ctx.user_id, request).await?;
        log_user_action(ctx.user_id, "create_quotation", Some(&quotation.id.to_string()));

        self.notifications.dispatch(
            NotificationEvent::new(
                "quotation.created",
                "New quotation",
                format!("Quotation for {} {} of {}", quotation.quantity, quotation.unit, substance.name),
                Audience::Role(UserRole::Fornecedor),
            )
            .with_link(format!("/quotations/{}", quotation.id)),
        );

        Ok(quotation)
    }

    /// Requesters see their own, staff see all, suppliers see open ones
    pub async fn list(&self, ctx: &AuthContext, status: Option<QuotationStatus>, limit: i64, offset: i64) -> Result<Vec<Quotation>> {
        match ctx.role {
            UserRole::Master | UserRole::Cooperativa => self.db.quotations.list(None, status, limit, offset).await,
            UserRole::Fornecedor => self.db.quotations.list(None, Some(QuotationStatus::Open), limit, offset).await,
            UserRole::Cooperado => self.db.quotations.list(Some(ctx.user_id), status, limit, offset).await,
        }
    }

    pub async fn get(&self, ctx: &AuthContext, id: Uuid) -> Result<Quotation> {
        let quotation = self
            .db
            .quotations
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoopError::not_found("quotation", id))?;

        let visible = match ctx.role {
            UserRole::Master | UserRole::Cooperativa => true,
            UserRole::Fornecedor => true,
            UserRole::Cooperado => quotation.requested_by == ctx.user_id,
        };
        if !visible {
            return Err(CoopError::PermissionDenied("Quotation belongs to another member".to_string()));
        }
        Ok(quotation)
    }

    /// Answer a quotation as the caller's supplier profile
    pub async fn respond(&self, ctx: &AuthContext, id: Uuid, request: CreateQuotationResponseRequest) -> Result<QuotationResponse> {
        ctx.require_role(&[UserRole::Fornecedor])?;

        let supplier = self
            .db
            .suppliers
            .find_by_user(ctx.user_id)
            .await?
            .ok_or_else(|| CoopError::not_found("supplier profile", ctx.user_id))?;
        let eligibility = self.qualification.eligibility(supplier.id).await?;
        if !eligibility.status.can_trade() {
            return Err(CoopError::PermissionDenied(format!(
                "Supplier is {:?} and cannot answer quotations",
                eligibility.status
            ).to_lowercase()));
        }

        let quotation = self.get(ctx, id).await?;
        if !quotation.accepts_responses(Utc::now()) {
            return Err(CoopError::BusinessRule("Quotation is not accepting responses".to_string()));
        }

        // validates quantity, price and unit
        normalized_unit_price(request.package_price, request.package_quantity, &request.package_unit)?;
        let requested = parse_unit(&quotation.unit)
            .ok_or_else(|| CoopError::InvalidInput(format!("Unknown unit: {}", quotation.unit)))?;
        let offered = parse_unit(&request.package_unit)
            .ok_or_else(|| CoopError::InvalidInput(format!("Unknown unit: {}", request.package_unit)))?;
        if requested.dimension != offered.dimension {
            return Err(CoopError::InvalidInput(format!(
                "Unit {} cannot be compared with {}",
                request.package_unit, quotation.unit
            )));
        }
        if request.delivery_days.map(|d| d < 0).unwrap_or(false) {
            return Err(CoopError::InvalidInput("Delivery days cannot be negative".to_string()));
        }

        let existing = self.db.quotations.responses_for(id).await?;
        if existing.iter().any(|r| r.supplier_id == supplier.id) {
            return Err(CoopError::Conflict("Supplier already answered this quotation".to_string()));
        }

        let response = self.db.quotations.create_response(id, supplier.id, request).await?;
        info!(quotation_id = %id, supplier_id = %supplier.id, "Quotation answered");

        self.notifications.dispatch(
            NotificationEvent::new(
                "quotation.response_received",
                "New quotation response",
                format!("{} answered your quotation", supplier.company_name),
                Audience::User(quotation.requested_by),
            )
            .with_link(format!("/quotations/{}", id)),
        );

        Ok(response)
    }

    /// Responses ranked by normalized price; only the requester and staff may compare
    pub async fn comparison(&self, ctx: &AuthContext, id: Uuid) -> Result<QuotationComparison> {
        let quotation = self.get(ctx, id).await?;
        if quotation.requested_by != ctx.user_id && !ctx.is_staff() {
            return Err(CoopError::PermissionDenied("Only the requester can compare responses".to_string()));
        }

        let responses = self.db.quotations.responses_for(id).await?;
        let responses = compare_responses(&quotation, responses)?;
        Ok(QuotationComparison { quotation, responses })
    }

    /// Pick the winning response, closing the quotation
    pub async fn select(&self, ctx: &AuthContext, id: Uuid, response_id: Uuid) -> Result<Quotation> {
        let mut tx = self.db.begin().await?;
        let quotation = QuotationRepository::lock(&mut tx, id)
            .await?
            .ok_or_else(|| CoopError::not_found("quotation", id))?;

        if quotation.requested_by != ctx.user_id && !ctx.is_master() {
            return Err(CoopError::PermissionDenied("Only the requester can select a response".to_string()));
        }
        if quotation.status != QuotationStatus::Open {
            return Err(CoopError::BusinessRule("Quotation is no longer open".to_string()));
        }

        let response = QuotationRepository::find_response(&mut tx, response_id)
            .await?
            .filter(|r| r.quotation_id == id)
            .ok_or_else(|| CoopError::not_found("quotation response", response_id))?;

        let closed = QuotationRepository::select_response(&mut tx, id, response.id).await?;
        tx.commit().await?;

        log_user_action(ctx.user_id, "select_quotation_response", Some(&response_id.to_string()));

        if let Some(supplier) = self.db.suppliers.find_by_id(response.supplier_id).await? {
            self.notifications.dispatch(
                NotificationEvent::new(
                    "quotation.response_selected",
                    "Your quotation response was selected",
                    format!("Your response to quotation {} was selected", id),
                    Audience::User(supplier.user_id),
                )
                .with_link(format!("/quotations/{}", id)),
            );
        }

        Ok(closed)
    }

    pub async fn cancel(&self, ctx: &AuthContext, id: Uuid) -> Result<Quotation> {
        let quotation = self.get(ctx, id).await?;
        if quotation.requested_by != ctx.user_id && !ctx.is_master() {
            return Err(CoopError::PermissionDenied("Only the requester can cancel a quotation".to_string()));
        }
        if quotation.status != QuotationStatus::Open {
            return Err(CoopError::BusinessRule("Quotation is no longer open".to_string()));
        }

        let cancelled = self.db.quotations.set_status(id, QuotationStatus::Cancelled).await?;
        log_user_action(ctx.user_id, "cancel_quotation", Some(&id.to_string()));
        Ok(cancelled)
    }
}
