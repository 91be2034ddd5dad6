//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{CoopError, Result};
use super::Settings;

/// Minimum accepted length of the JWT signing secret, in bytes
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_server_config(&settings.server)?;
    validate_database_config(&settings.database)?;
    validate_auth_config(&settings.auth)?;
    validate_mail_config(&settings.mail)?;
    validate_storage_config(&settings.storage)?;
    validate_business_config(&settings.business)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

/// Validate server configuration
fn validate_server_config(config: &super::ServerConfig) -> Result<()> {
    if config.port == 0 {
        return Err(CoopError::Config("Server port must be greater than 0".to_string()));
    }

    for origin in &config.cors_origins {
        if origin != "*" && url::Url::parse(origin).is_err() {
            return Err(CoopError::Config(format!("Invalid CORS origin: {}", origin)));
        }
    }

    if config.sse_keep_alive_seconds == 0 {
        return Err(CoopError::Config(
            "SSE keep-alive interval must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(CoopError::Config("Database URL is required".to_string()));
    }

    if config.max_connections == 0 {
        return Err(CoopError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(CoopError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate authentication configuration
fn validate_auth_config(config: &super::AuthConfig) -> Result<()> {
    if config.jwt_secret.is_empty() {
        return Err(CoopError::Config("JWT secret is required".to_string()));
    }

    if config.jwt_secret.len() < MIN_JWT_SECRET_LEN {
        return Err(CoopError::Config(format!(
            "JWT secret must be at least {} bytes",
            MIN_JWT_SECRET_LEN
        )));
    }

    if config.token_ttl_hours <= 0 {
        return Err(CoopError::Config("Token TTL must be positive".to_string()));
    }

    if config.login_attempts_per_minute == 0 {
        return Err(CoopError::Config(
            "Login attempts per minute must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate mail configuration, only when mail is enabled
fn validate_mail_config(config: &super::MailConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    if url::Url::parse(&config.api_url).is_err() {
        return Err(CoopError::Config(format!("Invalid mail API URL: {}", config.api_url)));
    }

    if !crate::utils::helpers::is_valid_email(&config.from_address) {
        return Err(CoopError::Config("Mail sender address is invalid".to_string()));
    }

    if config.timeout_seconds == 0 {
        return Err(CoopError::Config("Mail timeout must be greater than 0".to_string()));
    }

    Ok(())
}

/// Validate storage configuration
fn validate_storage_config(config: &super::StorageConfig) -> Result<()> {
    if config.upload_dir.is_empty() {
        return Err(CoopError::Config("Upload directory is required".to_string()));
    }

    if config.max_upload_bytes == 0 {
        return Err(CoopError::Config("Max upload size must be greater than 0".to_string()));
    }

    Ok(())
}

fn validate_business_config(config: &super::BusinessConfig) -> Result<()> {
    if config.qualification_validity_days <= 0 {
        return Err(CoopError::Config(
            "Qualification validity must be positive".to_string()
        ));
    }

    if config.expiring_window_days < 0 {
        return Err(CoopError::Config(
            "Expiring window cannot be negative".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(CoopError::Config("Log level is required".to_string()));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(CoopError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn valid_settings() -> Settings {
        let mut settings = Settings::default();
        settings.auth.jwt_secret = "x".repeat(MIN_JWT_SECRET_LEN);
        settings
    }

    #[test]
    fn test_valid_settings_pass() {
        assert!(validate_settings(&valid_settings()).is_ok());
    }

    #[test]
    fn test_missing_or_short_secret_rejected() {
        let mut settings = valid_settings();
        settings.auth.jwt_secret = String::new();
        assert_matches!(validate_settings(&settings), Err(CoopError::Config(_)));

        settings.auth.jwt_secret = "short".to_string();
        assert_matches!(validate_settings(&settings), Err(CoopError::Config(_)));
    }

    #[test]
    fn test_pool_bounds() {
        let mut settings = valid_settings();
        settings.database.min_connections = 20;
        assert_matches!(validate_settings(&settings), Err(CoopError::Config(_)));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut settings = valid_settings();
        settings.logging.level = "verbose".to_string();
        assert_matches!(validate_settings(&settings), Err(CoopError::Config(_)));
    }

    #[test]
    fn test_mail_checked_only_when_enabled() {
        let mut settings = valid_settings();
        settings.mail.api_url = "not a url".to_string();
        assert!(validate_settings(&settings).is_ok());

        settings.mail.enabled = true;
        assert_matches!(validate_settings(&settings), Err(CoopError::Config(_)));
    }
}
