//! Helper functions and utilities
//!
//! This module contains common helper functions used throughout the application.

use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// Default page size for list endpoints
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Upper bound on page size for list endpoints
pub const MAX_PAGE_SIZE: i64 = 200;

/// Pagination query parameters shared by list endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl Pagination {
    /// Page size clamped to `1..=MAX_PAGE_SIZE`
    pub fn limit(&self) -> i64 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Row offset for the requested page (pages start at 1)
    pub fn offset(&self) -> i64 {
        calculate_offset(self.page.unwrap_or(1), self.limit())
    }
}

/// Calculate pagination offset
pub fn calculate_offset(page: i64, page_size: i64) -> i64 {
    page.max(1).saturating_sub(1).saturating_mul(page_size)
}

/// Validate email format
pub fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid")
    });
    re.is_match(email)
}

/// Lowercase and trim an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Strip punctuation from a CNPJ, keeping only digits
pub fn normalize_cnpj(cnpj: &str) -> String {
    cnpj.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Validate a CNPJ, formatted or not, including both check digits
pub fn is_valid_cnpj(cnpj: &str) -> bool {
    let digits: Vec<u32> = normalize_cnpj(cnpj)
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect();

    if digits.len() != 14 {
        return false;
    }

    // Repeated digits pass the checksum but are never issued
    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }

    let check = |len: usize| -> u32 {
        let weights: Vec<u32> = if len == 12 {
            vec![5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2]
        } else {
            vec![6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2]
        };
        let sum: u32 = digits[..len].iter().zip(weights.iter()).map(|(d, w)| d * w).sum();
        let rest = sum % 11;
        if rest < 2 { 0 } else { 11 - rest }
    };

    check(12) == digits[12] && check(13) == digits[13]
}

/// Generate a random alphanumeric temporary password
pub fn generate_temporary_password(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Sanitize filename for safe storage
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.chars().take(120).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cnpj_validation() {
        assert!(is_valid_cnpj("11.222.333/0001-81"));
        assert!(is_valid_cnpj("11222333000181"));
        assert!(!is_valid_cnpj("11.222.333/0001-82"));
        assert!(!is_valid_cnpj("00000000000000"));
        assert!(!is_valid_cnpj("1122233300018"));
    }

    #[test]
    fn test_cnpj_normalization() {
        assert_eq!(normalize_cnpj("11.222.333/0001-81"), "11222333000181");
    }

    #[test]
    fn test_email() {
        assert!(is_valid_email("farmacia@coop.com.br"));
        assert!(!is_valid_email("no-at-sign"));
        assert_eq!(normalize_email("  Admin@Coop.COM "), "admin@coop.com");
    }

    #[test]
    fn test_pagination() {
        let p = Pagination { page: Some(3), page_size: Some(20) };
        assert_eq!(p.limit(), 20);
        assert_eq!(p.offset(), 40);

        let p = Pagination { page: Some(0), page_size: Some(10_000) };
        assert_eq!(p.limit(), MAX_PAGE_SIZE);
        assert_eq!(p.offset(), 0);

        assert_eq!(Pagination::default().limit(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_temporary_password() {
        let password = generate_temporary_password(12);
        assert_eq!(password.len(), 12);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("laudo técnico.pdf"), "laudo_técnico.pdf");
        assert_eq!(sanitize_filename("..."), "file");
    }
}
