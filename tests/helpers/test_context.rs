//! Test context
//!
//! Wires the full application state on top of a test database and offers
//! shortcuts for creating callers of each role.

use axum::Router;
use coopfarma::database::repositories::NewUser;
use coopfarma::database::DatabaseService;
use coopfarma::models::substance::{CreateSubstanceRequest, Substance};
use coopfarma::models::user::{User, UserRole};
use coopfarma::services::auth::hash_password;
use coopfarma::services::AuthContext;
use coopfarma::{handlers, AppState, Settings};
use uuid::Uuid;
use super::database_helper::TestDatabase;
use super::test_data::test_settings;

pub const TEST_PASSWORD: &str = "senha-de-teste-123";

/// A seeded caller: the stored user, its context and a bearer token
pub struct TestUser {
    pub user: User,
    pub ctx: AuthContext,
    pub token: String,
}

pub struct TestContext {
    pub database: TestDatabase,
    pub state: AppState,
}

impl TestContext {
    /// `None` when no test database is available
    pub async fn try_new() -> Option<Self> {
        let database = TestDatabase::try_new().await?;
        let settings = Settings {
            database: coopfarma::config::DatabaseConfig {
                url: database.database_url.clone(),
                ..Default::default()
            },
            ..test_settings()
        };
        let state = AppState::new(settings, DatabaseService::new(database.pool.clone()))
            .expect("Failed to build application state");

        Some(Self { database, state })
    }

    pub fn router(&self) -> Router {
        handlers::router(self.state.clone())
    }

    pub async fn create_user(&self, role: UserRole, cnpj: Option<&str>) -> TestUser {
        let suffix = Uuid::new_v4().simple().to_string();
        let user = self
            .state
            .db
            .users
            .create(NewUser {
                email: format!("{}-{}@coopfarma.test", role, &suffix[..8]),
                password_hash: hash_password(TEST_PASSWORD).expect("Failed to hash password"),
                name: format!("Test {}", role),
                role,
                cnpj: cnpj.map(str::to_string),
                phone: None,
            })
            .await
            .expect("Failed to create user");

        let (token, _) = self
            .state
            .services
            .auth
            .issue_token(&user)
            .expect("Failed to issue token");
        let ctx = AuthContext::from_user(&user);

        TestUser { user, ctx, token }
    }

    pub async fn create_substance(&self, name: &str) -> Substance {
        self.state
            .db
            .substances
            .create(CreateSubstanceRequest {
                name: name.to_string(),
                cas_number: None,
                dcb_code: None,
                category: Some("ativo".to_string()),
                default_unit: Some("g".to_string()),
                is_controlled: false,
            })
            .await
            .expect("Failed to create substance")
    }

    pub async fn cleanup(&self) -> Result<(), sqlx::Error> {
        self.database.cleanup().await
    }
}
