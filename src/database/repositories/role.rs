//! Cooperative role repository implementation

use sqlx::PgPool;
use chrono::Utc;
use uuid::Uuid;
use crate::models::role::{CooperativeRole, CreateRoleRequest, UpdateRoleRequest};
use crate::utils::errors::CoopError;

#[derive(Clone, Debug)]
pub struct RoleRepository {
    pool: PgPool,
}

impl RoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<CooperativeRole>, CoopError> {
        let roles = sqlx::query_as::<_, CooperativeRole>("SELECT * FROM cooperative_roles ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(roles)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<CooperativeRole>, CoopError> {
        let role = sqlx::query_as::<_, CooperativeRole>("SELECT * FROM cooperative_roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(role)
    }

    pub async fn create(&self, request: CreateRoleRequest) -> Result<CooperativeRole, CoopError> {
        let role = sqlx::query_as::<_, CooperativeRole>(
            r#"
            INSERT INTO cooperative_roles (id, name, description, permissions, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(request.name)
        .bind(request.description)
        .bind(request.permissions)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(role)
    }

    pub async fn update(&self, id: Uuid, request: UpdateRoleRequest) -> Result<CooperativeRole, CoopError> {
        let role = sqlx::query_as::<_, CooperativeRole>(
            r#"
            UPDATE cooperative_roles
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                permissions = COALESCE($4, permissions),
                updated_at = $5
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(request.name)
        .bind(request.description)
        .bind(request.permissions)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        role.ok_or_else(|| CoopError::not_found("role", id))
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, CoopError> {
        let result = sqlx::query("DELETE FROM cooperative_roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Assign a role; assigning twice is a no-op
    pub async fn assign(&self, user_id: Uuid, role_id: Uuid) -> Result<(), CoopError> {
        sqlx::query(
            "INSERT INTO user_cooperative_roles (user_id, role_id, assigned_at) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING"
        )
        .bind(user_id)
        .bind(role_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn unassign(&self, user_id: Uuid, role_id: Uuid) -> Result<bool, CoopError> {
        let result = sqlx::query("DELETE FROM user_cooperative_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<CooperativeRole>, CoopError> {
        let roles = sqlx::query_as::<_, CooperativeRole>(
            r#"
            SELECT r.* FROM cooperative_roles r
            JOIN user_cooperative_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    /// Union of permissions over every role the user holds
    pub async fn permissions_for_user(&self, user_id: Uuid) -> Result<Vec<String>, CoopError> {
        let permissions: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT p FROM cooperative_roles r
            JOIN user_cooperative_roles ur ON ur.role_id = r.id
            CROSS JOIN LATERAL unnest(r.permissions) AS p
            WHERE ur.user_id = $1
            ORDER BY p
            "#
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }
}
