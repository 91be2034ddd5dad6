//! Quotation models and unit-price normalization

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;
use crate::models::amount::{checked_div, checked_mul, ensure_storable};
use crate::utils::errors::{CoopError, Result};

/// Decimal places kept for a normalized unit price
pub const NORMALIZED_PRICE_SCALE: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Mass,
    Volume,
    Count,
}

impl Dimension {
    /// Unit every price of this dimension is normalized to
    pub fn base_unit(&self) -> &'static str {
        match self {
            Dimension::Mass => "g",
            Dimension::Volume => "ml",
            Dimension::Count => "un",
        }
    }
}

/// A recognised unit and its factor relative to the dimension's base unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitFactor {
    pub dimension: Dimension,
    pub factor: Decimal,
}

/// Parse a unit label (case-insensitive, common Portuguese spellings accepted)
pub fn parse_unit(unit: &str) -> Option<UnitFactor> {
    let (dimension, factor) = match unit.trim().to_lowercase().as_str() {
        "kg" => (Dimension::Mass, Decimal::new(1000, 0)),
        "g" | "gr" => (Dimension::Mass, Decimal::ONE),
        "mg" => (Dimension::Mass, Decimal::new(1, 3)),
        "mcg" | "µg" | "ug" => (Dimension::Mass, Decimal::new(1, 6)),
        "l" | "lt" => (Dimension::Volume, Decimal::new(1000, 0)),
        "ml" => (Dimension::Volume, Decimal::ONE),
        "un" | "und" | "unit" | "unidade" => (Dimension::Count, Decimal::ONE),
        _ => return None,
    };
    Some(UnitFactor { dimension, factor })
}

/// Price per base unit for a package of `package_quantity` `package_unit` costing `package_price`
pub fn normalized_unit_price(package_price: Decimal, package_quantity: Decimal, package_unit: &str) -> Result<Decimal> {
    let unit = parse_unit(package_unit)
        .ok_or_else(|| CoopError::InvalidInput(format!("Unknown unit: {}", package_unit)))?;
    if package_quantity <= Decimal::ZERO {
        return Err(CoopError::InvalidInput("Package quantity must be positive".to_string()));
    }
    if package_price <= Decimal::ZERO {
        return Err(CoopError::InvalidInput("Package price must be positive".to_string()));
    }
    ensure_storable(package_quantity, "Package quantity")?;
    ensure_storable(package_price, "Package price")?;

    let base_quantity = checked_mul(package_quantity, unit.factor, "Package quantity")?;
    if base_quantity <= Decimal::ZERO {
        return Err(CoopError::InvalidInput("Package quantity is too small".to_string()));
    }
    Ok(checked_div(package_price, base_quantity, "Unit price")?.round_dp(NORMALIZED_PRICE_SCALE))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "quotation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QuotationStatus {
    Open,
    Closed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Quotation {
    pub id: Uuid,
    pub requested_by: Uuid,
    pub substance_id: Uuid,
    pub quantity: Decimal,
    pub unit: String,
    pub notes: Option<String>,
    pub status: QuotationStatus,
    pub closes_at: Option<DateTime<Utc>>,
    pub selected_response_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    pub fn accepts_responses(&self, now: DateTime<Utc>) -> bool {
        self.status == QuotationStatus::Open && self.closes_at.map(|c| now < c).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuotationRequest {
    pub substance_id: Uuid,
    pub quantity: Decimal,
    pub unit: String,
    pub notes: Option<String>,
    pub closes_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuotationResponse {
    pub id: Uuid,
    pub quotation_id: Uuid,
    pub supplier_id: Uuid,
    pub package_quantity: Decimal,
    pub package_unit: String,
    pub package_price: Decimal,
    pub delivery_days: Option<i32>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuotationResponseRequest {
    pub package_quantity: Decimal,
    pub package_unit: String,
    pub package_price: Decimal,
    pub delivery_days: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectResponseRequest {
    pub response_id: Uuid,
}

/// One supplier response expressed in the quotation's base unit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparedResponse {
    #[serde(flatten)]
    pub response: QuotationResponse,
    pub normalized_unit_price: Decimal,
    pub base_unit: String,
    pub estimated_total: Decimal,
}

/// Rank responses by normalized price, cheapest first.
///
/// Responses in another dimension than the quotation are skipped.
pub fn compare_responses(quotation: &Quotation, responses: Vec<QuotationResponse>) -> Result<Vec<ComparedResponse>> {
    let requested = parse_unit(&quotation.unit)
        .ok_or_else(|| CoopError::InvalidInput(format!("Unknown unit: {}", quotation.unit)))?;
    let requested_base = checked_mul(quotation.quantity, requested.factor, "Quotation quantity")?;

    let mut compared = Vec::with_capacity(responses.len());
    for response in responses {
        match parse_unit(&response.package_unit) {
            Some(unit) if unit.dimension == requested.dimension => {}
            _ => continue,
        }
        let Ok(price) = normalized_unit_price(response.package_price, response.package_quantity, &response.package_unit) else {
            continue;
        };
        compared.push(ComparedResponse {
            normalized_unit_price: price,
            base_unit: requested.dimension.base_unit().to_string(),
            estimated_total: checked_mul(price, requested_base, "Estimated total")?.round_dp(2),
            response,
        });
    }

    compared.sort_by(|a, b| {
        a.normalized_unit_price
            .cmp(&b.normalized_unit_price)
            .then_with(|| a.response.delivery_days.unwrap_or(i32::MAX).cmp(&b.response.delivery_days.unwrap_or(i32::MAX)))
            .then_with(|| a.response.created_at.cmp(&b.response.created_at))
    });

    Ok(compared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn response(qty: Decimal, unit: &str, price: Decimal) -> QuotationResponse {
        QuotationResponse {
            id: Uuid::new_v4(),
            quotation_id: Uuid::new_v4(),
            supplier_id: Uuid::new_v4(),
            package_quantity: qty,
            package_unit: unit.to_string(),
            package_price: price,
            delivery_days: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    fn quotation(qty: Decimal, unit: &str) -> Quotation {
        Quotation {
            id: Uuid::new_v4(),
            requested_by: Uuid::new_v4(),
            substance_id: Uuid::new_v4(),
            quantity: qty,
            unit: unit.to_string(),
            notes: None,
            status: QuotationStatus::Open,
            closes_at: None,
            selected_response_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_unit() {
        assert_eq!(parse_unit("KG").unwrap().factor, Decimal::new(1000, 0));
        assert_eq!(parse_unit("mg").unwrap().dimension, Dimension::Mass);
        assert_eq!(parse_unit("L").unwrap().dimension, Dimension::Volume);
        assert!(parse_unit("barrel").is_none());
    }

    #[test]
    fn test_normalization_across_units() {
        // R$ 500 per kg and R$ 0.50 per g are the same price
        let per_kg = normalized_unit_price(Decimal::new(500, 0), Decimal::ONE, "kg").unwrap();
        let per_g = normalized_unit_price(Decimal::new(50, 2), Decimal::ONE, "g").unwrap();
        assert_eq!(per_kg, per_g);

        let per_mg = normalized_unit_price(Decimal::new(10, 0), Decimal::new(1000, 0), "mg").unwrap();
        assert_eq!(per_mg, Decimal::new(10, 0));
    }

    #[test]
    fn test_normalization_rejects_bad_input() {
        assert!(normalized_unit_price(Decimal::new(10, 0), Decimal::ZERO, "g").is_err());
        assert!(normalized_unit_price(Decimal::new(10, 0), Decimal::ONE, "furlong").is_err());
    }

    #[test]
    fn test_normalization_out_of_range_is_invalid_input() {
        assert_matches!(normalized_unit_price(Decimal::ONE, Decimal::MAX, "kg"), Err(CoopError::InvalidInput(_)));
        assert_matches!(normalized_unit_price(Decimal::MAX, Decimal::ONE, "g"), Err(CoopError::InvalidInput(_)));
        assert_matches!(
            normalized_unit_price(Decimal::ONE, Decimal::new(1, 28), "mcg"),
            Err(CoopError::InvalidInput(_))
        );
        assert!(normalized_unit_price(Decimal::new(999_999, 0), Decimal::new(999_999, 0), "kg").is_ok());
    }

    #[test]
    fn test_compare_sorts_and_skips_other_dimensions() {
        let q = quotation(Decimal::new(2, 0), "kg");
        let responses = vec![
            response(Decimal::new(100, 0), "g", Decimal::new(60, 0)),
            response(Decimal::ONE, "kg", Decimal::new(500, 0)),
            response(Decimal::ONE, "l", Decimal::new(1, 0)),
        ];
        let compared = compare_responses(&q, responses).unwrap();
        assert_eq!(compared.len(), 2);
        assert_eq!(compared[0].normalized_unit_price, Decimal::new(5, 1));
        assert_eq!(compared[0].estimated_total, Decimal::new(1000, 0));
        assert_eq!(compared[1].normalized_unit_price, Decimal::new(6, 1));
        assert_eq!(compared[0].base_unit, "g");
    }

    proptest! {
        #[test]
        fn prop_kg_and_g_agree(price_cents in 1i64..10_000_000, kilos in 1i64..100) {
            let price = Decimal::new(price_cents, 2);
            let by_kg = normalized_unit_price(price, Decimal::new(kilos, 0), "kg").unwrap();
            let by_g = normalized_unit_price(price, Decimal::new(kilos * 1000, 0), "g").unwrap();
            prop_assert_eq!(by_kg, by_g);
        }
    }
}
