//! Follow service

use uuid::Uuid;
use crate::database::DatabaseService;
use crate::models::follow::{Follow, FollowTarget};
use crate::services::auth::AuthContext;
use crate::utils::errors::{CoopError, Result};
use crate::utils::logging::log_user_action;

fn reject_self_follow(follower_id: Uuid, kind: FollowTarget, target_id: Uuid) -> Result<()> {
    if kind == FollowTarget::User && follower_id == target_id {
        return Err(CoopError::InvalidInput("You cannot follow yourself".to_string()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct FollowService {
    db: DatabaseService,
}

impl FollowService {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    async fn ensure_target_exists(&self, kind: FollowTarget, target_id: Uuid) -> Result<()> {
        let exists = match kind {
            FollowTarget::User => self.db.users.find_by_id(target_id).await?.is_some(),
            FollowTarget::Substance => self.db.substances.find_by_id(target_id).await?.is_some(),
        };
        if !exists {
            let entity = match kind {
                FollowTarget::User => "user",
                FollowTarget::Substance => "substance",
            };
            return Err(CoopError::not_found(entity, target_id));
        }
        Ok(())
    }

    pub async fn follow(&self, ctx: &AuthContext, kind: FollowTarget, target_id: Uuid) -> Result<Follow> {
        reject_self_follow(ctx.user_id, kind, target_id)?;
        self.ensure_target_exists(kind, target_id).await?;

        let follow = self.db.follows.follow(ctx.user_id, kind, target_id).await?;
        log_user_action(ctx.user_id, "follow", Some(&target_id.to_string()));
        Ok(follow)
    }

    pub async fn unfollow(&self, ctx: &AuthContext, kind: FollowTarget, target_id: Uuid) -> Result<()> {
        if !self.db.follows.unfollow(ctx.user_id, kind, target_id).await? {
            return Err(CoopError::not_found("follow", target_id));
        }
        log_user_action(ctx.user_id, "unfollow", Some(&target_id.to_string()));
        Ok(())
    }

    pub async fn following(&self, ctx: &AuthContext, kind: Option<FollowTarget>) -> Result<Vec<Follow>> {
        self.db.follows.following(ctx.user_id, kind).await
    }

    pub async fn followers(&self, ctx: &AuthContext) -> Result<Vec<Follow>> {
        self.db.follows.followers(ctx.user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_cannot_follow_self() {
        let me = Uuid::new_v4();
        assert_matches!(reject_self_follow(me, FollowTarget::User, me), Err(CoopError::InvalidInput(_)));
        assert!(reject_self_follow(me, FollowTarget::User, Uuid::new_v4()).is_ok());
        // a substance sharing the id is a different target
        assert!(reject_self_follow(me, FollowTarget::Substance, me).is_ok());
    }
}
