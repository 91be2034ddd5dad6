//! Transparency news service

use uuid::Uuid;
use crate::database::DatabaseService;
use crate::models::notification::{Audience, NotificationEvent};
use crate::models::role::PERM_TRANSPARENCY_PUBLISH;
use crate::models::transparency::{CreateNewsRequest, TransparencyNews, UpdateNewsRequest};
use crate::services::auth::{AuthContext, AuthService};
use crate::services::notification::NotificationService;
use crate::utils::errors::{CoopError, Result};
use crate::utils::logging::log_admin_action;

#[derive(Clone)]
pub struct TransparencyService {
    db: DatabaseService,
    auth: AuthService,
    notifications: NotificationService,
}

impl TransparencyService {
    pub fn new(db: DatabaseService, auth: AuthService, notifications: NotificationService) -> Self {
        Self { db, auth, notifications }
    }

    /// Staff publish implicitly; anyone else needs the permission
    async fn is_publisher(&self, ctx: &AuthContext) -> Result<bool> {
        Ok(ctx.is_staff() || self.auth.has_permission(ctx, PERM_TRANSPARENCY_PUBLISH).await?)
    }

    async fn require_publisher(&self, ctx: &AuthContext) -> Result<()> {
        if self.is_publisher(ctx).await? {
            Ok(())
        } else {
            Err(CoopError::PermissionDenied(format!("Missing permission {}", PERM_TRANSPARENCY_PUBLISH)))
        }
    }

    fn announce(&self, news: &TransparencyNews) {
        self.notifications.dispatch(
            NotificationEvent::new("transparency.published", news.title.clone(), "New transparency publication", Audience::All)
                .with_link(format!("/transparency/news/{}", news.id)),
        );
    }

    pub async fn list(&self, ctx: &AuthContext, limit: i64, offset: i64) -> Result<Vec<TransparencyNews>> {
        let include_drafts = self.is_publisher(ctx).await?;
        self.db.news.list(include_drafts, limit, offset).await
    }

    pub async fn create(&self, ctx: &AuthContext, request: CreateNewsRequest) -> Result<TransparencyNews> {
        self.require_publisher(ctx).await?;
        if request.title.trim().is_empty() || request.body.trim().is_empty() {
            return Err(CoopError::InvalidInput("Title and body are required".to_string()));
        }

        let news = self.db.news.create(ctx.user_id, request).await?;
        log_admin_action(ctx.user_id, "create_news", Some(&news.id.to_string()), Some(&news.title));
        if news.is_published {
            self.announce(&news);
        }
        Ok(news)
    }

    pub async fn update(&self, ctx: &AuthContext, id: Uuid, request: UpdateNewsRequest) -> Result<TransparencyNews> {
        self.require_publisher(ctx).await?;
        let blank = |v: &Option<String>| v.as_deref().map(|s| s.trim().is_empty()).unwrap_or(false);
        if blank(&request.title) || blank(&request.body) {
            return Err(CoopError::InvalidInput("Title and body cannot be blank".to_string()));
        }

        let news = self.db.news.update(id, request).await?;
        log_admin_action(ctx.user_id, "update_news", Some(&id.to_string()), None);
        Ok(news)
    }

    pub async fn set_published(&self, ctx: &AuthContext, id: Uuid, published: bool) -> Result<TransparencyNews> {
        self.require_publisher(ctx).await?;
        let was_published = self
            .db
            .news
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoopError::not_found("news", id))?
            .is_published;

        let news = self.db.news.set_published(id, published).await?;
        log_admin_action(
            ctx.user_id,
            if published { "publish_news" } else { "unpublish_news" },
            Some(&id.to_string()),
            None,
        );
        if published && !was_published {
            self.announce(&news);
        }
        Ok(news)
    }
}
