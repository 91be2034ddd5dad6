//! User repository implementation

use sqlx::PgPool;
use chrono::Utc;
use uuid::Uuid;
use crate::models::user::{User, UserRole, UpdateUserRequest, UpdateProfileRequest};
use crate::utils::errors::CoopError;

/// Values for a new user row; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    pub cnpj: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone)]
#[derive(Debug)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create(&self, user: NewUser) -> Result<User, CoopError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, name, role, cnpj, phone, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.name)
        .bind(user.role)
        .bind(user.cnpj)
        .bind(user.phone)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, CoopError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Find user by (already normalized) email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, CoopError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, CoopError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    /// List users with pagination, optionally filtered by role
    pub async fn list(&self, role: Option<UserRole>, limit: i64, offset: i64) -> Result<Vec<User>, CoopError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE ($1::user_role IS NULL OR role = $1) ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        )
        .bind(role)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Update user (admin edit)
    pub async fn update(&self, id: Uuid, request: UpdateUserRequest) -> Result<User, CoopError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                role = COALESCE($3, role),
                cnpj = COALESCE($4, cnpj),
                phone = COALESCE($5, phone),
                is_active = COALESCE($6, is_active),
                updated_at = $7
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(request.name)
        .bind(request.role)
        .bind(request.cnpj)
        .bind(request.phone)
        .bind(request.is_active)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        user.ok_or_else(|| CoopError::not_found("user", id))
    }

    /// Update the caller's own profile
    pub async fn update_profile(&self, id: Uuid, request: UpdateProfileRequest) -> Result<User, CoopError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                updated_at = $4
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(request.name)
        .bind(request.phone)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        user.ok_or_else(|| CoopError::not_found("user", id))
    }

    pub async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), CoopError> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Activate/deactivate user
    pub async fn set_active(&self, id: Uuid, is_active: bool) -> Result<User, CoopError> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET is_active = $2, updated_at = $3 WHERE id = $1 RETURNING *"
        )
        .bind(id)
        .bind(is_active)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        user.ok_or_else(|| CoopError::not_found("user", id))
    }

    /// Active users holding any of the given roles
    pub async fn active_by_roles(&self, roles: &[UserRole]) -> Result<Vec<User>, CoopError> {
        let roles: Vec<String> = roles.iter().map(|r| r.as_str().to_string()).collect();
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE is_active AND role::text = ANY($1)"
        )
        .bind(roles)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    pub async fn active_all(&self) -> Result<Vec<User>, CoopError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE is_active")
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    /// Active users among the given ids
    pub async fn active_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, CoopError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE is_active AND id = ANY($1)"
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Distinct CNPJs among active cooperados; the reserve participant count
    pub async fn count_participating_cnpjs(&self) -> Result<i64, CoopError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT cnpj) FROM users WHERE is_active AND role = 'cooperado' AND cnpj IS NOT NULL"
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Count total users
    pub async fn count(&self) -> Result<i64, CoopError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
