//! Supplier qualification service
//!
//! Suppliers register a profile and submit document bundles; a master
//! reviews them. Eligibility is derived on read from the latest request,
//! the current qualification and the attached document expiries.

use std::sync::Arc;
use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;
use crate::config::Settings;
use crate::database::DatabaseService;
use crate::database::repositories::SupplierRepository;
use crate::models::access_request::{RequestStatus, ReviewDecision};
use crate::models::notification::{Audience, NotificationEvent};
use crate::models::supplier::{
    CreateSupplierRequest, EligibilityReport, QualificationRequestDetail, SubmitQualificationRequest, Supplier,
};
use crate::models::user::UserRole;
use crate::services::auth::AuthContext;
use crate::services::notification::NotificationService;
use crate::utils::errors::{CoopError, Result};
use crate::utils::helpers::{is_valid_cnpj, is_valid_email, normalize_cnpj, normalize_email};
use crate::utils::logging::{log_admin_action, log_user_action};

#[derive(Clone)]
pub struct QualificationService {
    db: DatabaseService,
    settings: Arc<Settings>,
    notifications: NotificationService,
}

impl QualificationService {
    pub fn new(db: DatabaseService, settings: Arc<Settings>, notifications: NotificationService) -> Self {
        Self { db, settings, notifications }
    }

    /// Create the caller's supplier profile; one per user
    pub async fn register_supplier(&self, ctx: &AuthContext, mut request: CreateSupplierRequest) -> Result<Supplier> {
        ctx.require_role(&[UserRole::Fornecedor])?;

        if request.company_name.trim().is_empty() {
            return Err(CoopError::InvalidInput("Company name is required".to_string()));
        }
        if !is_valid_cnpj(&request.cnpj) {
            return Err(CoopError::InvalidInput(format!("Invalid CNPJ: {}", request.cnpj)));
        }
        request.cnpj = normalize_cnpj(&request.cnpj);
        request.contact_email = normalize_email(&request.contact_email);
        if !is_valid_email(&request.contact_email) {
            return Err(CoopError::InvalidInput(format!("Invalid email: {}", request.contact_email)));
        }
        if self.db.suppliers.find_by_user(ctx.user_id).await?.is_some() {
            return Err(CoopError::Conflict("Supplier profile already exists".to_string()));
        }

        let supplier = self.db.suppliers.create(ctx.user_id, request).await?;
        log_user_action(ctx.user_id, "register_supplier", Some(&supplier.id.to_string()));
        Ok(supplier)
    }

    pub async fn get_supplier(&self, id: Uuid) -> Result<Supplier> {
        self.db
            .suppliers
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoopError::not_found("supplier", id))
    }

    pub async fn list_suppliers(&self, limit: i64, offset: i64) -> Result<Vec<Supplier>> {
        self.db.suppliers.list(limit, offset).await
    }

    async fn own_supplier(&self, ctx: &AuthContext) -> Result<Supplier> {
        self.db
            .suppliers
            .find_by_user(ctx.user_id)
            .await?
            .ok_or_else(|| CoopError::not_found("supplier profile", ctx.user_id))
    }

    /// Submit a document bundle for review
    pub async fn submit_request(&self, ctx: &AuthContext, request: SubmitQualificationRequest) -> Result<QualificationRequestDetail> {
        ctx.require_role(&[UserRole::Fornecedor])?;
        let supplier = self.own_supplier(ctx).await?;

        if self.db.suppliers.has_pending_request(supplier.id).await? {
            return Err(CoopError::BusinessRule("A qualification request is already pending".to_string()));
        }

        for document in &request.documents {
            if document.doc_type.trim().is_empty() {
                return Err(CoopError::InvalidInput("Document type is required".to_string()));
            }
            let file = self
                .db
                .files
                .find_by_id(document.file_id)
                .await?
                .ok_or_else(|| CoopError::not_found("file", document.file_id))?;
            if file.owner_id != ctx.user_id {
                return Err(CoopError::PermissionDenied("Documents must be uploaded by the supplier".to_string()));
            }
        }

        let mut tx = self.db.begin().await?;
        let created = SupplierRepository::insert_request(&mut tx, supplier.id, request.notes).await?;
        let mut documents = Vec::with_capacity(request.documents.len());
        for document in request.documents {
            documents.push(SupplierRepository::insert_document(&mut tx, created.id, document).await?);
        }
        tx.commit().await?;

        info!(supplier_id = %supplier.id, request_id = %created.id, documents = documents.len(), "Qualification request submitted");

        self.notifications.dispatch(
            NotificationEvent::new(
                "qualification.submitted",
                "Qualification request submitted",
                format!("{} submitted documents for qualification", supplier.company_name),
                Audience::Role(UserRole::Master),
            )
            .with_link(format!("/suppliers/qualification-requests/{}", created.id)),
        );

        Ok(QualificationRequestDetail { request: created, documents })
    }

    /// Approve or reject a pending request
    pub async fn review_request(&self, ctx: &AuthContext, id: Uuid, decision: ReviewDecision) -> Result<QualificationRequestDetail> {
        ctx.require_master()?;

        let notes = decision.notes.filter(|n| !n.trim().is_empty());
        if !decision.approve && notes.is_none() {
            return Err(CoopError::InvalidInput("Rejecting a request requires notes".to_string()));
        }

        let now = Utc::now();
        let valid_until = decision
            .valid_until
            .unwrap_or_else(|| now + Duration::days(self.settings.business.qualification_validity_days));
        if decision.approve && valid_until <= now {
            return Err(CoopError::InvalidInput("Qualification validity must be in the future".to_string()));
        }

        let mut tx = self.db.begin().await?;
        let request = SupplierRepository::lock_request(&mut tx, id)
            .await?
            .ok_or_else(|| CoopError::not_found("qualification request", id))?;
        if request.status != RequestStatus::Pending {
            return Err(CoopError::BusinessRule("Qualification request was already reviewed".to_string()));
        }

        let status = if decision.approve { RequestStatus::Approved } else { RequestStatus::Rejected };
        let reviewed = SupplierRepository::set_request_status(&mut tx, id, status, ctx.user_id, notes.clone()).await?;
        if decision.approve {
            SupplierRepository::insert_qualification(&mut tx, request.supplier_id, id, valid_until, ctx.user_id).await?;
        }
        tx.commit().await?;

        log_admin_action(
            ctx.user_id,
            if decision.approve { "approve_qualification" } else { "reject_qualification" },
            Some(&id.to_string()),
            notes.as_deref(),
        );

        if let Some(supplier) = self.db.suppliers.find_by_id(request.supplier_id).await? {
            let (title, message) = if decision.approve {
                ("Qualification approved", format!("Your qualification is valid until {}", valid_until.format("%Y-%m-%d")))
            } else {
                ("Qualification rejected", notes.clone().unwrap_or_default())
            };
            self.notifications.dispatch(
                NotificationEvent::new("qualification.reviewed", title, message, Audience::User(supplier.user_id))
                    .with_data(serde_json::json!({ "requestId": id, "approved": decision.approve })),
            );
        }

        let documents = self.db.suppliers.documents_for_request(id).await?;
        Ok(QualificationRequestDetail { request: reviewed, documents })
    }

    /// Masters and cooperativa staff see every request; suppliers only their own
    pub async fn list_requests(&self, ctx: &AuthContext, status: Option<RequestStatus>, limit: i64, offset: i64) -> Result<Vec<QualificationRequestDetail>> {
        let supplier_id = match ctx.role {
            UserRole::Master | UserRole::Cooperativa => None,
            UserRole::Fornecedor => Some(self.own_supplier(ctx).await?.id),
            UserRole::Cooperado => {
                return Err(CoopError::PermissionDenied("Qualification requests are not visible to members".to_string()))
            }
        };

        let requests = self.db.suppliers.list_requests(supplier_id, status, limit, offset).await?;
        let mut details = Vec::with_capacity(requests.len());
        for request in requests {
            let documents = self.db.suppliers.documents_for_request(request.id).await?;
            details.push(QualificationRequestDetail { request, documents });
        }
        Ok(details)
    }

    /// Derive the current eligibility of a supplier
    pub async fn eligibility(&self, supplier_id: Uuid) -> Result<EligibilityReport> {
        let supplier = self.get_supplier(supplier_id).await?;
        let inputs = self.db.suppliers.eligibility_inputs(supplier.id).await?;
        let window = Duration::days(self.settings.business.expiring_window_days);

        Ok(EligibilityReport {
            supplier_id: supplier.id,
            status: inputs.derive(Utc::now(), window),
            effective_until: inputs.effective_until(),
        })
    }
}
