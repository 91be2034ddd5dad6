//! Notification service implementation
//!
//! Fans a domain event out to its audience: in-app rows plus a live SSE
//! frame, and best-effort email, each gated by the recipient's preferences.

use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::database::DatabaseService;
use crate::models::notification::{Audience, Notification, NotificationEvent, NotificationPreference, UpdatePreferencesRequest};
use crate::models::user::User;
use crate::services::auth::AuthContext;
use crate::services::event_hub::{EventHub, SseMessage, Subscription};
use crate::services::mailer::{Mailer, OutgoingEmail};
use crate::utils::errors::{CoopError, Result};

/// SSE event name for notification frames
pub const NOTIFICATION_EVENT: &str = "notification";

/// Channels one recipient gets for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub user_id: Uuid,
    pub email: String,
    pub in_app: bool,
    pub send_email: bool,
}

/// Decide the channels per recipient; users without stored preferences get defaults
pub fn plan_deliveries(recipients: &[User], preferences: Vec<NotificationPreference>, kind: &str) -> Vec<Delivery> {
    let mut by_user: HashMap<Uuid, NotificationPreference> =
        preferences.into_iter().map(|p| (p.user_id, p)).collect();

    recipients
        .iter()
        .filter_map(|user| {
            let prefs = by_user
                .remove(&user.id)
                .unwrap_or_else(|| NotificationPreference::default_for(user.id));
            let delivery = Delivery {
                user_id: user.id,
                email: user.email.clone(),
                in_app: prefs.wants_in_app(kind),
                send_email: prefs.wants_email(kind),
            };
            (delivery.in_app || delivery.send_email).then_some(delivery)
        })
        .collect()
}

/// Notification service
#[derive(Clone)]
pub struct NotificationService {
    db: DatabaseService,
    hub: EventHub,
    mailer: Mailer,
}

impl NotificationService {
    pub fn new(db: DatabaseService, hub: EventHub, mailer: Mailer) -> Self {
        Self { db, hub, mailer }
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Register an SSE connection for the caller
    pub fn subscribe(&self, ctx: &AuthContext) -> Subscription {
        self.hub.subscribe(ctx.user_id, ctx.role)
    }

    async fn resolve_audience(&self, audience: &Audience) -> Result<Vec<User>> {
        match audience {
            Audience::User(id) => self.db.users.active_by_ids(&[*id]).await,
            Audience::Users(ids) => self.db.users.active_by_ids(ids).await,
            Audience::Role(role) => self.db.users.active_by_roles(&[*role]).await,
            Audience::Roles(roles) => self.db.users.active_by_roles(roles).await,
            Audience::All => self.db.users.active_all().await,
        }
    }

    /// Deliver an event now; returns how many recipients got at least one channel.
    ///
    /// A failed write skips that recipient's in-app channel only.
    pub async fn notify(&self, event: NotificationEvent) -> Result<usize> {
        let recipients = self.resolve_audience(&event.audience).await?;
        if recipients.is_empty() {
            debug!(kind = %event.kind, "Notification has no recipients");
            return Ok(0);
        }

        let ids: Vec<Uuid> = recipients.iter().map(|u| u.id).collect();
        let preferences = self.db.notifications.preferences_for(&ids).await?;
        let deliveries = plan_deliveries(&recipients, preferences, &event.kind);

        let mut emails = Vec::new();
        let mut delivered = 0;
        for delivery in &deliveries {
            let mut reached = false;
            if delivery.in_app {
                match self.db.notifications.insert(delivery.user_id, &event).await {
                    Ok(notification) => {
                        reached = true;
                        match SseMessage::json(NOTIFICATION_EVENT, &notification) {
                            Ok(message) => {
                                self.hub.send_to_user(delivery.user_id, &message);
                            }
                            Err(e) => warn!(error = %e, "Failed to encode notification frame"),
                        }
                    }
                    Err(e) => {
                        warn!(user_id = %delivery.user_id, kind = %event.kind, error = %e, "Failed to store notification");
                    }
                }
            }
            if delivery.send_email {
                reached = true;
                emails.push(OutgoingEmail {
                    to: delivery.email.clone(),
                    subject: event.title.clone(),
                    text: match &event.link {
                        Some(link) => format!("{}\n\n{}", event.message, link),
                        None => event.message.clone(),
                    },
                });
            }
            if reached {
                delivered += 1;
            }
        }

        if !emails.is_empty() {
            let mailer = self.mailer.clone();
            tokio::spawn(async move {
                for email in emails {
                    mailer.send_best_effort(&email).await;
                }
            });
        }

        info!(kind = %event.kind, planned = deliveries.len(), delivered, "Notification dispatched");
        Ok(delivered)
    }

    /// Fire and forget; used after a transaction commits
    pub fn dispatch(&self, event: NotificationEvent) {
        let service = self.clone();
        tokio::spawn(async move {
            let kind = event.kind.clone();
            if let Err(e) = service.notify(event).await {
                warn!(kind = %kind, error = %e, "Notification delivery failed");
            }
        });
    }

    pub async fn list(&self, ctx: &AuthContext, unread_only: bool, limit: i64, offset: i64) -> Result<Vec<Notification>> {
        self.db.notifications.list_for_user(ctx.user_id, unread_only, limit, offset).await
    }

    pub async fn unread_count(&self, ctx: &AuthContext) -> Result<i64> {
        self.db.notifications.unread_count(ctx.user_id).await
    }

    pub async fn mark_read(&self, ctx: &AuthContext, id: Uuid) -> Result<()> {
        if self.db.notifications.mark_read(id, ctx.user_id).await? {
            Ok(())
        } else {
            Err(CoopError::not_found("notification", id))
        }
    }

    pub async fn mark_all_read(&self, ctx: &AuthContext) -> Result<u64> {
        self.db.notifications.mark_all_read(ctx.user_id).await
    }

    pub async fn preferences(&self, ctx: &AuthContext) -> Result<NotificationPreference> {
        self.db.notifications.preferences(ctx.user_id).await
    }

    pub async fn update_preferences(&self, ctx: &AuthContext, update: UpdatePreferencesRequest) -> Result<NotificationPreference> {
        let mut prefs = self.db.notifications.preferences(ctx.user_id).await?;
        prefs.apply(&update);
        self.db.notifications.save_preferences(&prefs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::models::user::UserRole;

    fn user(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: String::new(),
            name: email.to_string(),
            role: UserRole::Cooperado,
            cnpj: None,
            phone: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_defaults_apply_without_stored_preferences() {
        let users = vec![user("a@coop.com")];
        let plan = plan_deliveries(&users, Vec::new(), "flash_deal.created");
        assert_eq!(plan.len(), 1);
        assert!(plan[0].in_app);
        assert!(!plan[0].send_email);
    }

    #[test]
    fn test_channels_follow_preferences() {
        let a = user("a@coop.com");
        let b = user("b@coop.com");
        let c = user("c@coop.com");

        let mut email_only = NotificationPreference::default_for(b.id);
        email_only.in_app_enabled = false;
        email_only.email_enabled = true;

        let mut muted = NotificationPreference::default_for(c.id);
        muted.email_enabled = true;
        muted.muted_kinds = vec!["voting.opened".to_string()];

        let users = vec![a.clone(), b.clone(), c.clone()];
        let plan = plan_deliveries(&users, vec![email_only, muted], "voting.opened");

        // muted recipients are skipped entirely
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0], Delivery { user_id: a.id, email: a.email.clone(), in_app: true, send_email: false });
        assert_eq!(plan[1], Delivery { user_id: b.id, email: b.email.clone(), in_app: false, send_email: true });
    }
}
