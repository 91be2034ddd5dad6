//! User service implementation
//!
//! This service handles account administration, self-service profile edits,
//! public access requests and cooperative role management.

use tracing::{debug, info};
use uuid::Uuid;
use crate::database::DatabaseService;
use crate::database::repositories::NewUser;
use crate::models::access_request::{AccessRequest, CreateAccessRequest, RequestStatus};
use crate::models::notification::{Audience, NotificationEvent};
use crate::models::role::{unknown_permissions, CooperativeRole, CreateRoleRequest, UpdateRoleRequest};
use crate::models::user::{CreateUserRequest, UpdateProfileRequest, UpdateUserRequest, User, UserRole};
use crate::services::auth::{hash_password_async, AuthContext, MIN_PASSWORD_LENGTH};
use crate::services::mailer::{Mailer, OutgoingEmail};
use crate::services::notification::NotificationService;
use crate::utils::errors::{CoopError, Result};
use crate::utils::helpers::{generate_temporary_password, is_valid_cnpj, is_valid_email, normalize_cnpj, normalize_email};
use crate::utils::logging::{log_admin_action, log_user_action};

/// Length of generated temporary passwords
pub const TEMPORARY_PASSWORD_LENGTH: usize = 12;

/// Validate and normalize an optional CNPJ
fn clean_cnpj(cnpj: Option<String>) -> Result<Option<String>> {
    match cnpj.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        None => Ok(None),
        Some(raw) if is_valid_cnpj(raw) => Ok(Some(normalize_cnpj(raw))),
        Some(raw) => Err(CoopError::InvalidInput(format!("Invalid CNPJ: {}", raw))),
    }
}

fn clean_email(email: &str) -> Result<String> {
    let email = normalize_email(email);
    if is_valid_email(&email) {
        Ok(email)
    } else {
        Err(CoopError::InvalidInput(format!("Invalid email: {}", email)))
    }
}

fn require_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        Err(CoopError::InvalidInput("Name is required".to_string()))
    } else {
        Ok(name.to_string())
    }
}

/// User service for account, access request and role operations
#[derive(Clone)]
pub struct UserService {
    db: DatabaseService,
    mailer: Mailer,
    notifications: NotificationService,
}

impl UserService {
    pub fn new(db: DatabaseService, mailer: Mailer, notifications: NotificationService) -> Self {
        Self { db, mailer, notifications }
    }

    pub async fn list_users(&self, ctx: &AuthContext, role: Option<UserRole>, limit: i64, offset: i64) -> Result<Vec<User>> {
        ctx.require_master()?;
        self.db.users.list(role, limit, offset).await
    }

    /// Any user may read their own account; `master` may read every account
    pub async fn get_user(&self, ctx: &AuthContext, id: Uuid) -> Result<User> {
        if ctx.user_id != id {
            ctx.require_master()?;
        }
        self.db
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoopError::not_found("user", id))
    }

    pub async fn create_user(&self, ctx: &AuthContext, request: CreateUserRequest) -> Result<User> {
        ctx.require_master()?;

        let email = clean_email(&request.email)?;
        let name = require_name(&request.name)?;
        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(CoopError::InvalidInput(format!(
                "Password must have at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        if self.db.users.email_exists(&email).await? {
            return Err(CoopError::Conflict(format!("Email {} is already registered", email)));
        }

        let password_hash = hash_password_async(request.password.clone()).await?;
        let user = self
            .db
            .users
            .create(NewUser {
                email,
                password_hash,
                name,
                role: request.role,
                cnpj: clean_cnpj(request.cnpj)?,
                phone: request.phone,
            })
            .await?;

        log_admin_action(ctx.user_id, "create_user", Some(&user.id.to_string()), Some(user.role.as_str()));
        Ok(user)
    }

    pub async fn update_user(&self, ctx: &AuthContext, id: Uuid, mut request: UpdateUserRequest) -> Result<User> {
        ctx.require_master()?;
        if let Some(name) = &request.name {
            request.name = Some(require_name(name)?);
        }
        request.cnpj = clean_cnpj(request.cnpj)?;

        let user = self.db.users.update(id, request).await?;
        log_admin_action(ctx.user_id, "update_user", Some(&id.to_string()), None);
        Ok(user)
    }

    pub async fn deactivate_user(&self, ctx: &AuthContext, id: Uuid) -> Result<User> {
        ctx.require_master()?;
        if ctx.user_id == id {
            return Err(CoopError::BusinessRule("You cannot deactivate your own account".to_string()));
        }

        let user = self.db.users.set_active(id, false).await?;
        log_admin_action(ctx.user_id, "deactivate_user", Some(&id.to_string()), None);
        Ok(user)
    }

    /// Self-service edit; the role never changes here
    pub async fn update_profile(&self, ctx: &AuthContext, mut request: UpdateProfileRequest) -> Result<User> {
        if let Some(name) = &request.name {
            request.name = Some(require_name(name)?);
        }
        let user = self.db.users.update_profile(ctx.user_id, request).await?;
        log_user_action(ctx.user_id, "update_profile", None);
        Ok(user)
    }

    /// Public submission of an access request
    pub async fn submit_access_request(&self, mut request: CreateAccessRequest) -> Result<AccessRequest> {
        request.email = clean_email(&request.email)?;
        request.name = require_name(&request.name)?;
        request.cnpj = clean_cnpj(request.cnpj)?;

        if request.requested_role == UserRole::Master {
            return Err(CoopError::InvalidInput("The master role cannot be requested".to_string()));
        }
        if self.db.users.email_exists(&request.email).await? {
            return Err(CoopError::Conflict(format!("Email {} is already registered", request.email)));
        }
        if self.db.access_requests.has_pending_for_email(&request.email).await? {
            return Err(CoopError::Conflict(format!(
                "A pending request already exists for {}",
                request.email
            )));
        }

        let created = self.db.access_requests.create(request).await?;
        info!(request_id = %created.id, role = %created.requested_role, "Access request submitted");

        self.notifications.dispatch(
            NotificationEvent::new(
                "access_request.created",
                "New access request",
                format!("{} asked to join as {}", created.name, created.requested_role),
                Audience::Role(UserRole::Master),
            )
            .with_link(format!("/requests/{}", created.id)),
        );

        Ok(created)
    }

    pub async fn list_access_requests(&self, ctx: &AuthContext, status: Option<RequestStatus>, limit: i64, offset: i64) -> Result<Vec<AccessRequest>> {
        ctx.require_master()?;
        self.db.access_requests.list(status, limit, offset).await
    }

    /// Approve a pending request, creating the account with a temporary password
    pub async fn approve_access_request(&self, ctx: &AuthContext, id: Uuid, notes: Option<String>) -> Result<(AccessRequest, User)> {
        ctx.require_master()?;

        let request = self
            .db
            .access_requests
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoopError::not_found("access request", id))?;
        if request.status != RequestStatus::Pending {
            return Err(CoopError::BusinessRule("Access request was already reviewed".to_string()));
        }
        if self.db.users.email_exists(&request.email).await? {
            return Err(CoopError::Conflict(format!("Email {} is already registered", request.email)));
        }

        let reviewed = self
            .db
            .access_requests
            .review(id, RequestStatus::Approved, ctx.user_id, notes)
            .await?
            .ok_or_else(|| CoopError::BusinessRule("Access request was already reviewed".to_string()))?;

        let temporary_password = generate_temporary_password(TEMPORARY_PASSWORD_LENGTH);
        let password_hash = hash_password_async(temporary_password.clone()).await?;
        let user = self
            .db
            .users
            .create(NewUser {
                email: reviewed.email.clone(),
                password_hash,
                name: reviewed.name.clone(),
                role: reviewed.requested_role,
                cnpj: reviewed.cnpj.clone(),
                phone: None,
            })
            .await?;

        log_admin_action(ctx.user_id, "approve_access_request", Some(&id.to_string()), Some(&user.id.to_string()));

        let email = OutgoingEmail {
            to: user.email.clone(),
            subject: "Your CoopFarma access was approved".to_string(),
            text: format!(
                "Hello {},\n\nYour access was approved. Sign in with {} and the temporary password {} and change it right away.",
                user.name, user.email, temporary_password
            ),
        };
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            mailer.send_best_effort(&email).await;
        });

        Ok((reviewed, user))
    }

    pub async fn reject_access_request(&self, ctx: &AuthContext, id: Uuid, notes: Option<String>) -> Result<AccessRequest> {
        ctx.require_master()?;

        let reviewed = self
            .db
            .access_requests
            .review(id, RequestStatus::Rejected, ctx.user_id, notes)
            .await?;

        match reviewed {
            Some(request) => {
                log_admin_action(ctx.user_id, "reject_access_request", Some(&id.to_string()), None);
                Ok(request)
            }
            None => match self.db.access_requests.find_by_id(id).await? {
                Some(_) => Err(CoopError::BusinessRule("Access request was already reviewed".to_string())),
                None => Err(CoopError::not_found("access request", id)),
            },
        }
    }

    pub async fn list_roles(&self) -> Result<Vec<CooperativeRole>> {
        self.db.roles.list().await
    }

    fn check_permissions(permissions: &[String]) -> Result<()> {
        let unknown = unknown_permissions(permissions);
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(CoopError::InvalidInput(format!("Unknown permissions: {}", unknown.join(", "))))
        }
    }

    pub async fn create_role(&self, ctx: &AuthContext, mut request: CreateRoleRequest) -> Result<CooperativeRole> {
        ctx.require_master()?;
        request.name = require_name(&request.name)?;
        Self::check_permissions(&request.permissions)?;

        let role = self.db.roles.create(request).await?;
        log_admin_action(ctx.user_id, "create_role", Some(&role.name), None);
        Ok(role)
    }

    pub async fn update_role(&self, ctx: &AuthContext, id: Uuid, request: UpdateRoleRequest) -> Result<CooperativeRole> {
        ctx.require_master()?;
        if let Some(permissions) = &request.permissions {
            Self::check_permissions(permissions)?;
        }

        let role = self.db.roles.update(id, request).await?;
        log_admin_action(ctx.user_id, "update_role", Some(&role.name), None);
        Ok(role)
    }

    pub async fn delete_role(&self, ctx: &AuthContext, id: Uuid) -> Result<()> {
        ctx.require_master()?;
        if !self.db.roles.delete(id).await? {
            return Err(CoopError::not_found("role", id));
        }
        log_admin_action(ctx.user_id, "delete_role", Some(&id.to_string()), None);
        Ok(())
    }

    pub async fn assign_role(&self, ctx: &AuthContext, role_id: Uuid, user_id: Uuid) -> Result<()> {
        ctx.require_master()?;
        if self.db.roles.find_by_id(role_id).await?.is_none() {
            return Err(CoopError::not_found("role", role_id));
        }
        if self.db.users.find_by_id(user_id).await?.is_none() {
            return Err(CoopError::not_found("user", user_id));
        }

        self.db.roles.assign(user_id, role_id).await?;
        log_admin_action(ctx.user_id, "assign_role", Some(&user_id.to_string()), Some(&role_id.to_string()));
        Ok(())
    }

    pub async fn unassign_role(&self, ctx: &AuthContext, role_id: Uuid, user_id: Uuid) -> Result<()> {
        ctx.require_master()?;
        if !self.db.roles.unassign(user_id, role_id).await? {
            return Err(CoopError::not_found("role assignment", format!("{}/{}", role_id, user_id)));
        }
        debug!(role_id = %role_id, user_id = %user_id, "Role unassigned");
        log_admin_action(ctx.user_id, "unassign_role", Some(&user_id.to_string()), Some(&role_id.to_string()));
        Ok(())
    }

    /// Cooperative roles held by a user; visible to that user and to master
    pub async fn roles_for(&self, ctx: &AuthContext, user_id: Uuid) -> Result<Vec<CooperativeRole>> {
        if ctx.user_id != user_id {
            ctx.require_master()?;
        }
        self.db.roles.roles_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_clean_cnpj() {
        assert_eq!(clean_cnpj(None).unwrap(), None);
        assert_eq!(clean_cnpj(Some("  ".into())).unwrap(), None);
        assert_eq!(
            clean_cnpj(Some("11.222.333/0001-81".into())).unwrap(),
            Some("11222333000181".to_string())
        );
        assert_matches!(clean_cnpj(Some("11.222.333/0001-00".into())), Err(CoopError::InvalidInput(_)));
    }

    #[test]
    fn test_clean_email_and_name() {
        assert_eq!(clean_email(" Farmacia@Coop.com ").unwrap(), "farmacia@coop.com");
        assert!(clean_email("broken").is_err());
        assert_eq!(require_name("  Ana ").unwrap(), "Ana");
        assert!(require_name("   ").is_err());
    }

    #[test]
    fn test_role_permission_check() {
        assert!(UserService::check_permissions(&["voting.manage".to_string()]).is_ok());
        assert_matches!(
            UserService::check_permissions(&["voting.manage".to_string(), "nope".to_string()]),
            Err(CoopError::InvalidInput(msg)) if msg.contains("nope")
        );
    }
}
