//! Authentication service implementation
//!
//! This service handles password hashing, login and token issuance, and
//! the role and permission checks every other service relies on.

use std::sync::Arc;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::config::Settings;
use crate::database::DatabaseService;
use crate::middleware::rate_limit::LoginRateLimiter;
use crate::models::role::KNOWN_PERMISSIONS;
use crate::models::user::{ChangePasswordRequest, LoginRequest, LoginResponse, User, UserRole};
use crate::utils::errors::{CoopError, Result};
use crate::utils::helpers::normalize_email;
use crate::utils::logging::log_user_action;

/// Minimum length for a new password
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller, resolved from the bearer token on every request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: UserRole,
    pub email: String,
    pub name: String,
    pub cnpj: Option<String>,
}

impl AuthContext {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
            email: user.email.clone(),
            name: user.name.clone(),
            cnpj: user.cnpj.clone(),
        }
    }

    pub fn is_master(&self) -> bool {
        self.role == UserRole::Master
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Fail with 403 unless the caller holds one of `roles`
    pub fn require_role(&self, roles: &[UserRole]) -> Result<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(CoopError::PermissionDenied(format!(
                "Role {} may not perform this action",
                self.role
            )))
        }
    }

    pub fn require_master(&self) -> Result<()> {
        self.require_role(&[UserRole::Master])
    }

    /// CNPJ of the caller, required for per-company operations
    pub fn require_cnpj(&self) -> Result<&str> {
        self.cnpj
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| CoopError::PermissionDenied("A CNPJ is required for this action".to_string()))
    }
}

/// Hash a password with argon2id and a random salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC hash string
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

/// `hash_password` on the blocking thread pool
pub async fn hash_password_async(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| CoopError::Internal(format!("Password hashing task failed: {}", e)))?
}

/// `verify_password` on the blocking thread pool
pub async fn verify_password_async(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| CoopError::Internal(format!("Password check task failed: {}", e)))
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: DatabaseService,
    settings: Arc<Settings>,
    limiter: LoginRateLimiter,
}

impl AuthService {
    pub fn new(db: DatabaseService, settings: Arc<Settings>) -> Self {
        let limiter = LoginRateLimiter::new(settings.auth.login_attempts_per_minute);
        Self { db, settings, limiter }
    }

    pub fn limiter(&self) -> &LoginRateLimiter {
        &self.limiter
    }

    /// Issue a signed token for `user`
    pub fn issue_token(&self, user: &User) -> Result<(String, chrono::DateTime<Utc>)> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.settings.auth.token_ttl_hours);
        let claims = Claims {
            sub: user.id,
            role: user.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.settings.auth.jwt_secret.as_bytes()),
        )?;

        Ok((token, expires_at))
    }

    /// Decode and validate a token
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.settings.auth.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;
        Ok(data.claims)
    }

    /// Resolve a bearer token into the caller's context
    pub async fn authenticate(&self, token: &str) -> Result<AuthContext> {
        let claims = self
            .verify_token(token)
            .map_err(|_| CoopError::Unauthorized("Invalid or expired token".to_string()))?;

        let user = self
            .db
            .users
            .find_by_id(claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| CoopError::Unauthorized("Account not found or inactive".to_string()))?;

        Ok(AuthContext::from_user(&user))
    }

    /// Check credentials and issue a token
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse> {
        let email = normalize_email(&request.email);
        self.limiter.check(&email)?;

        let invalid = || CoopError::Unauthorized("Invalid credentials".to_string());

        let user = match self.db.users.find_by_email(&email).await? {
            Some(user) if user.is_active => user,
            _ => {
                debug!(email = %email, "Login for unknown or inactive account");
                return Err(invalid());
            }
        };

        if !verify_password_async(request.password, user.password_hash.clone()).await? {
            debug!(user_id = %user.id, "Login with wrong password");
            return Err(invalid());
        }

        let (token, expires_at) = self.issue_token(&user)?;
        info!(user_id = %user.id, role = %user.role, "User logged in");

        Ok(LoginResponse { token, expires_at, user })
    }

    pub async fn me(&self, ctx: &AuthContext) -> Result<User> {
        self.db
            .users
            .find_by_id(ctx.user_id)
            .await?
            .ok_or_else(|| CoopError::not_found("user", ctx.user_id))
    }

    /// Change the caller's password after checking the current one
    pub async fn change_password(&self, ctx: &AuthContext, request: ChangePasswordRequest) -> Result<()> {
        if request.new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(CoopError::InvalidInput(format!(
                "New password must have at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let user = self.me(ctx).await?;
        if !verify_password_async(request.current_password, user.password_hash.clone()).await? {
            return Err(CoopError::InvalidInput("Current password is incorrect".to_string()));
        }

        let hash = hash_password_async(request.new_password).await?;
        self.db.users.set_password_hash(user.id, &hash).await?;
        log_user_action(user.id, "change_password", None);

        Ok(())
    }

    /// Effective permissions; `master` holds all of them
    pub async fn permissions(&self, ctx: &AuthContext) -> Result<Vec<String>> {
        if ctx.is_master() {
            return Ok(KNOWN_PERMISSIONS.iter().map(|p| p.to_string()).collect());
        }
        self.db.roles.permissions_for_user(ctx.user_id).await
    }

    pub async fn has_permission(&self, ctx: &AuthContext, permission: &str) -> Result<bool> {
        if ctx.is_master() {
            return Ok(true);
        }
        let permissions = self.db.roles.permissions_for_user(ctx.user_id).await?;
        Ok(permissions.iter().any(|p| p == permission))
    }

    /// Fail with 403 unless the caller holds `permission`
    pub async fn require_permission(&self, ctx: &AuthContext, permission: &str) -> Result<()> {
        if self.has_permission(ctx, permission).await? {
            Ok(())
        } else {
            Err(CoopError::PermissionDenied(format!("Missing permission {}", permission)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::database::create_lazy_pool;

    fn context(role: UserRole, cnpj: Option<&str>) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            role,
            email: "user@coop.com".to_string(),
            name: "User".to_string(),
            cnpj: cnpj.map(str::to_string),
        }
    }

    fn service() -> AuthService {
        let mut settings = Settings::default();
        settings.auth.jwt_secret = "a-test-secret-that-is-long-enough-for-hs256".to_string();
        let pool = create_lazy_pool(&settings.database).unwrap();
        AuthService::new(DatabaseService::new(pool), Arc::new(settings))
    }

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            email: "cooperado@coop.com".to_string(),
            password_hash: String::new(),
            name: "Farmácia".to_string(),
            role,
            cnpj: None,
            phone: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[tokio::test]
    async fn test_password_hashing_runs_off_the_async_workers() {
        let hash = hash_password_async("correct horse".to_string()).await.unwrap();
        assert!(verify_password_async("correct horse".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password_async("wrong horse".to_string(), hash).await.unwrap());
    }

    #[test]
    fn test_role_checks() {
        let ctx = context(UserRole::Cooperado, None);
        assert!(ctx.require_role(&[UserRole::Cooperado, UserRole::Cooperativa]).is_ok());
        assert_matches!(ctx.require_master(), Err(CoopError::PermissionDenied(_)));
        assert_matches!(ctx.require_cnpj(), Err(CoopError::PermissionDenied(_)));

        let ctx = context(UserRole::Cooperado, Some("11222333000181"));
        assert_eq!(ctx.require_cnpj().unwrap(), "11222333000181");
    }

    #[tokio::test]
    async fn test_token_roundtrip() {
        let service = service();
        let user = user(UserRole::Cooperativa);

        let (token, expires_at) = service.issue_token(&user).unwrap();
        assert!(expires_at > Utc::now());

        let claims = service.verify_token(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, UserRole::Cooperativa);
    }

    #[tokio::test]
    async fn test_token_rejected_with_other_secret() {
        let service = service();
        let (token, _) = service.issue_token(&user(UserRole::Master)).unwrap();

        let mut other = Settings::default();
        other.auth.jwt_secret = "another-secret-entirely-different-from-first".to_string();
        let pool = create_lazy_pool(&other.database).unwrap();
        let other = AuthService::new(DatabaseService::new(pool), Arc::new(other));

        assert_matches!(other.verify_token(&token), Err(CoopError::Token(_)));
        assert!(service.verify_token("garbage").is_err());
    }

    #[tokio::test]
    async fn test_master_holds_every_permission() {
        let service = service();
        let ctx = context(UserRole::Master, None);
        // no database round trip for master
        let permissions = service.permissions(&ctx).await.unwrap();
        assert_eq!(permissions.len(), KNOWN_PERMISSIONS.len());
        assert!(service.has_permission(&ctx, "voting.manage").await.unwrap());
    }
}
