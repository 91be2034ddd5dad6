//! Financial movement ledger model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "movement_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FinancialMovement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: MovementKind,
    pub category: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMovementRequest {
    pub user_id: Uuid,
    pub kind: MovementKind,
    pub category: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementFilter {
    pub user_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub user_id: Uuid,
    pub credits: Decimal,
    pub debits: Decimal,
    pub balance: Decimal,
}

impl Balance {
    pub fn new(user_id: Uuid, credits: Decimal, debits: Decimal) -> Self {
        Self { user_id, credits, debits, balance: credits - debits }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub kind: MovementKind,
    pub category: String,
    pub total: Decimal,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub user_id: Uuid,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub total_credits: Decimal,
    pub total_debits: Decimal,
    pub net: Decimal,
    pub by_category: Vec<CategoryTotal>,
}

impl FinancialSummary {
    pub fn from_totals(user_id: Uuid, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>, by_category: Vec<CategoryTotal>) -> Self {
        let sum = |kind: MovementKind| -> Decimal {
            by_category.iter().filter(|c| c.kind == kind).map(|c| c.total).sum()
        };
        let total_credits = sum(MovementKind::Credit);
        let total_debits = sum(MovementKind::Debit);
        Self {
            user_id,
            from,
            to,
            total_credits,
            total_debits,
            net: total_credits - total_debits,
            by_category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_totals() {
        let user = Uuid::new_v4();
        let rows = vec![
            CategoryTotal { kind: MovementKind::Credit, category: "sale".into(), total: Decimal::new(300, 0), count: 2 },
            CategoryTotal { kind: MovementKind::Debit, category: "purchase".into(), total: Decimal::new(120, 0), count: 1 },
            CategoryTotal { kind: MovementKind::Debit, category: "fee".into(), total: Decimal::new(30, 0), count: 3 },
        ];
        let summary = FinancialSummary::from_totals(user, None, None, rows);
        assert_eq!(summary.total_credits, Decimal::new(300, 0));
        assert_eq!(summary.total_debits, Decimal::new(150, 0));
        assert_eq!(summary.net, Decimal::new(150, 0));

        let balance = Balance::new(user, Decimal::new(10, 0), Decimal::new(25, 0));
        assert_eq!(balance.balance, Decimal::new(-15, 0));
    }
}
