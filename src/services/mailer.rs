//! Outbound email through an HTTP mail relay
//!
//! The relay holds the SMTP credentials; this service only posts JSON to it.
//! Email is best effort everywhere it is used.

use std::time::Duration;
use serde::Serialize;
use tracing::{debug, info, warn};
use crate::config::MailConfig;
use crate::utils::errors::{CoopError, Result};

/// An email ready to hand to the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Mail relay client
#[derive(Clone)]
pub struct Mailer {
    config: MailConfig,
    http_client: reqwest::Client,
}

impl Mailer {
    pub fn new(config: MailConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .user_agent("CoopFarma/1.0")
            .build()
            .map_err(CoopError::Http)?;

        Ok(Self { config, http_client })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Send one email; a no-op when mail is disabled
    pub async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        if !self.is_enabled() {
            debug!(to = %email.to, subject = %email.subject, "Mail disabled, skipping");
            return Ok(());
        }

        let payload = RelayPayload {
            from: &self.config.from_address,
            to: &email.to,
            subject: &email.subject,
            text: &email.text,
        };

        self.http_client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }

    /// Send and swallow failures
    pub async fn send_best_effort(&self, email: &OutgoingEmail) -> bool {
        match self.send(email).await {
            Ok(()) => true,
            Err(e) => {
                warn!(to = %email.to, subject = %email.subject, error = %e, "Email delivery failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("enabled", &self.config.enabled)
            .field("api_url", &self.config.api_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_mailer_is_noop() {
        let mailer = Mailer::new(MailConfig {
            enabled: false,
            api_url: "http://127.0.0.1:1/unreachable".to_string(),
            ..MailConfig::default()
        })
        .unwrap();

        let email = OutgoingEmail {
            to: "someone@coop.com".to_string(),
            subject: "Hi".to_string(),
            text: "Body".to_string(),
        };
        assert!(mailer.send(&email).await.is_ok());
        assert!(mailer.send_best_effort(&email).await);
    }
}
