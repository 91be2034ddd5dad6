//! Rate limiting
//!
//! Login attempts are limited per normalized email with a keyed
//! `governor` limiter shared by every request handler.

use std::num::NonZeroU32;
use std::sync::Arc;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::{debug, warn};
use crate::utils::errors::{CoopError, Result};

/// Keyed limiter for login attempts
#[derive(Clone)]
pub struct LoginRateLimiter {
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl LoginRateLimiter {
    /// Allow `attempts_per_minute` attempts per key, replenished evenly
    pub fn new(attempts_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(attempts_per_minute).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(per_minute);

        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Consume one attempt for `key`
    pub fn check(&self, key: &str) -> Result<()> {
        match self.limiter.check_key(&key.to_string()) {
            Ok(()) => {
                debug!(key = key, "Login attempt allowed");
                Ok(())
            }
            Err(_) => {
                warn!(key = key, "Login rate limit exceeded");
                Err(CoopError::RateLimitExceeded)
            }
        }
    }

    /// Drop state for keys whose quota has fully replenished
    pub fn cleanup(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }
}

impl std::fmt::Debug for LoginRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRateLimiter")
            .field("tracked_keys", &self.tracked_keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_limit_per_key() {
        let limiter = LoginRateLimiter::new(3);

        for _ in 0..3 {
            assert!(limiter.check("a@coop.com").is_ok());
        }
        assert_matches!(limiter.check("a@coop.com"), Err(CoopError::RateLimitExceeded));

        // other keys keep their own budget
        assert!(limiter.check("b@coop.com").is_ok());
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[test]
    fn test_zero_attempts_still_allows_one() {
        let limiter = LoginRateLimiter::new(0);
        assert!(limiter.check("x@coop.com").is_ok());
        assert!(limiter.check("x@coop.com").is_err());
    }
}
