//! Bounds and checked arithmetic for quantities and money
//!
//! Every amount is stored as `NUMERIC(18,6)`, so request values are checked
//! against that range before any arithmetic touches them.

use rust_decimal::Decimal;
use crate::utils::errors::{CoopError, Result};

/// Smallest magnitude that no longer fits `NUMERIC(18,6)` (10^12)
pub const AMOUNT_LIMIT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Reject a value outside the storable range
pub fn ensure_storable(value: Decimal, field: &str) -> Result<Decimal> {
    if value.abs() >= AMOUNT_LIMIT {
        return Err(CoopError::InvalidInput(format!("{} is out of range", field)));
    }
    Ok(value)
}

pub fn checked_add(a: Decimal, b: Decimal, field: &str) -> Result<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| CoopError::InvalidInput(format!("{} is out of range", field)))
}

pub fn checked_mul(a: Decimal, b: Decimal, field: &str) -> Result<Decimal> {
    a.checked_mul(b)
        .ok_or_else(|| CoopError::InvalidInput(format!("{} is out of range", field)))
}

pub fn checked_div(a: Decimal, b: Decimal, field: &str) -> Result<Decimal> {
    a.checked_div(b)
        .ok_or_else(|| CoopError::InvalidInput(format!("{} is out of range", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_limit_is_ten_to_the_twelfth() {
        assert_eq!(AMOUNT_LIMIT, Decimal::new(1_000_000_000_000, 0));
    }

    #[test]
    fn test_storable_range() {
        let largest = Decimal::new(999_999_999_999_999_999, 6);
        assert_eq!(ensure_storable(largest, "amount").unwrap(), largest);
        assert_matches!(ensure_storable(AMOUNT_LIMIT, "amount"), Err(CoopError::InvalidInput(_)));
        assert_matches!(ensure_storable(-AMOUNT_LIMIT, "amount"), Err(CoopError::InvalidInput(_)));
        assert_matches!(ensure_storable(Decimal::MAX, "amount"), Err(CoopError::InvalidInput(_)));
    }

    #[test]
    fn test_overflow_is_invalid_input() {
        assert_matches!(checked_add(Decimal::MAX, Decimal::ONE, "total"), Err(CoopError::InvalidInput(_)));
        assert_matches!(checked_mul(Decimal::MAX, Decimal::new(2, 0), "total"), Err(CoopError::InvalidInput(_)));
        assert_matches!(checked_div(Decimal::ONE, Decimal::ZERO, "price"), Err(CoopError::InvalidInput(_)));
        assert_eq!(checked_mul(Decimal::new(25, 1), Decimal::new(4, 0), "total").unwrap(), Decimal::new(100, 1));
    }
}
