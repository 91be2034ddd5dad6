//! Substance catalog service

use tracing::info;
use uuid::Uuid;
use crate::database::DatabaseService;
use crate::database::repositories::SubstanceRepository;
use crate::models::access_request::{RequestStatus, ReviewDecision};
use crate::models::notification::{Audience, NotificationEvent};
use crate::models::quotation::parse_unit;
use crate::models::substance::{
    CreateSubstanceRequest, CreateSubstanceRequestInput, Substance, SubstanceRequest, SubstanceSearch, UpdateSubstanceRequest,
};
use crate::models::user::UserRole;
use crate::services::auth::AuthContext;
use crate::services::notification::NotificationService;
use crate::utils::errors::{CoopError, Result};
use crate::utils::logging::{log_admin_action, log_user_action};

const CATALOG_WRITERS: [UserRole; 2] = [UserRole::Master, UserRole::Cooperativa];

fn check_unit(unit: Option<&str>) -> Result<()> {
    match unit {
        Some(unit) if parse_unit(unit).is_none() => Err(CoopError::InvalidInput(format!("Unknown unit: {}", unit))),
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct SubstanceService {
    db: DatabaseService,
    notifications: NotificationService,
}

impl SubstanceService {
    pub fn new(db: DatabaseService, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    pub async fn search(&self, search: &SubstanceSearch, limit: i64, offset: i64) -> Result<Vec<Substance>> {
        self.db.substances.search(search, limit, offset).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Substance> {
        self.db
            .substances
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoopError::not_found("substance", id))
    }

    pub async fn create(&self, ctx: &AuthContext, request: CreateSubstanceRequest) -> Result<Substance> {
        ctx.require_role(&CATALOG_WRITERS)?;

        let name = request.name.trim();
        if name.is_empty() {
            return Err(CoopError::InvalidInput("Substance name is required".to_string()));
        }
        check_unit(request.default_unit.as_deref())?;
        if self.db.substances.name_exists(name).await? {
            return Err(CoopError::Conflict(format!("Substance {} already exists", name)));
        }

        let substance = self.db.substances.create(request).await?;
        log_admin_action(ctx.user_id, "create_substance", Some(&substance.name), None);
        Ok(substance)
    }

    pub async fn update(&self, ctx: &AuthContext, id: Uuid, request: UpdateSubstanceRequest) -> Result<Substance> {
        ctx.require_role(&CATALOG_WRITERS)?;
        check_unit(request.default_unit.as_deref())?;

        if let Some(name) = request.name.as_deref().map(str::trim) {
            if name.is_empty() {
                return Err(CoopError::InvalidInput("Substance name is required".to_string()));
            }
            let current = self.get(id).await?;
            if !current.name.eq_ignore_ascii_case(name) && self.db.substances.name_exists(name).await? {
                return Err(CoopError::Conflict(format!("Substance {} already exists", name)));
            }
        }

        let substance = self.db.substances.update(id, request).await?;
        log_admin_action(ctx.user_id, "update_substance", Some(&substance.name), None);
        Ok(substance)
    }

    /// Any authenticated user may ask for a substance to be added
    pub async fn request_substance(&self, ctx: &AuthContext, input: CreateSubstanceRequestInput) -> Result<SubstanceRequest> {
        if input.name.trim().is_empty() {
            return Err(CoopError::InvalidInput("Substance name is required".to_string()));
        }
        if self.db.substances.name_exists(input.name.trim()).await? {
            return Err(CoopError::Conflict(format!("Substance {} already exists", input.name.trim())));
        }

        let request = self.db.substances.create_request(ctx.user_id, input).await?;
        log_user_action(ctx.user_id, "request_substance", Some(&request.name));

        self.notifications.dispatch(NotificationEvent::new(
            "substance_request.created",
            "New substance request",
            format!("{} was requested for the catalog", request.name),
            Audience::Role(UserRole::Master),
        ));

        Ok(request)
    }

    /// Staff see every request; other users see their own
    pub async fn list_requests(&self, ctx: &AuthContext, status: Option<RequestStatus>, limit: i64, offset: i64) -> Result<Vec<SubstanceRequest>> {
        let requested_by = if ctx.is_staff() { None } else { Some(ctx.user_id) };
        self.db.substances.list_requests(requested_by, status, limit, offset).await
    }

    /// Approve (creating the substance) or reject a pending request
    pub async fn review_request(&self, ctx: &AuthContext, id: Uuid, decision: ReviewDecision) -> Result<SubstanceRequest> {
        ctx.require_master()?;

        let mut tx = self.db.begin().await?;
        let request = SubstanceRepository::lock_request(&mut tx, id)
            .await?
            .ok_or_else(|| CoopError::not_found("substance request", id))?;
        if request.status != RequestStatus::Pending {
            return Err(CoopError::BusinessRule("Substance request was already reviewed".to_string()));
        }

        let reviewed = if decision.approve {
            if self.db.substances.name_exists(&request.name).await? {
                return Err(CoopError::Conflict(format!("Substance {} already exists", request.name)));
            }
            let substance = SubstanceRepository::insert(
                &mut tx,
                CreateSubstanceRequest {
                    name: request.name.clone(),
                    cas_number: request.cas_number.clone(),
                    dcb_code: None,
                    category: None,
                    default_unit: None,
                    is_controlled: false,
                },
            )
            .await?;
            SubstanceRepository::set_request_status(&mut tx, id, RequestStatus::Approved, ctx.user_id, decision.notes, Some(substance.id)).await?
        } else {
            SubstanceRepository::set_request_status(&mut tx, id, RequestStatus::Rejected, ctx.user_id, decision.notes, None).await?
        };
        tx.commit().await?;

        info!(request_id = %id, approved = decision.approve, "Substance request reviewed");
        log_admin_action(ctx.user_id, "review_substance_request", Some(&id.to_string()), None);

        self.notifications.dispatch(NotificationEvent::new(
            "substance_request.reviewed",
            if decision.approve { "Substance request approved" } else { "Substance request rejected" },
            format!("Your request for {} was reviewed", reviewed.name),
            Audience::User(reviewed.requested_by),
        ));

        Ok(reviewed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_check() {
        assert!(check_unit(None).is_ok());
        assert!(check_unit(Some("kg")).is_ok());
        assert!(check_unit(Some("barrel")).is_err());
    }
}
