//! Supplier and qualification models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;
use super::access_request::RequestStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_name: String,
    pub cnpj: String,
    pub contact_email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSupplierRequest {
    pub company_name: String,
    pub cnpj: String,
    pub contact_email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QualificationRequest {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub status: RequestStatus,
    pub notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub review_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QualificationDocument {
    pub id: Uuid,
    pub request_id: Uuid,
    pub doc_type: String,
    pub file_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SupplierQualification {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub request_id: Uuid,
    pub valid_until: DateTime<Utc>,
    pub approved_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInput {
    pub doc_type: String,
    pub file_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQualificationRequest {
    pub notes: Option<String>,
    pub documents: Vec<DocumentInput>,
}

/// Request together with its documents, as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualificationRequestDetail {
    #[serde(flatten)]
    pub request: QualificationRequest,
    pub documents: Vec<QualificationDocument>,
}

/// Derived supplier eligibility; never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EligibilityStatus {
    Eligible,
    Expiring,
    Expired,
    Pending,
    Ineligible,
}

impl EligibilityStatus {
    /// Whether the supplier may take part in quotations
    pub fn can_trade(&self) -> bool {
        matches!(self, EligibilityStatus::Eligible | EligibilityStatus::Expiring)
    }
}

/// Everything needed to derive a supplier's eligibility
#[derive(Debug, Clone, Default)]
pub struct EligibilityInputs {
    pub latest_request_status: Option<RequestStatus>,
    pub qualification_valid_until: Option<DateTime<Utc>>,
    pub earliest_document_expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityReport {
    pub supplier_id: Uuid,
    pub status: EligibilityStatus,
    pub effective_until: Option<DateTime<Utc>>,
}

impl EligibilityInputs {
    /// The earlier of the qualification validity and the first document expiry
    pub fn effective_until(&self) -> Option<DateTime<Utc>> {
        match (self.qualification_valid_until, self.earliest_document_expiry) {
            (Some(q), Some(d)) => Some(q.min(d)),
            (Some(q), None) => Some(q),
            (None, _) => None,
        }
    }

    pub fn derive(&self, now: DateTime<Utc>, expiring_window: Duration) -> EligibilityStatus {
        let pending = self.latest_request_status == Some(RequestStatus::Pending);
        if self.latest_request_status == Some(RequestStatus::Rejected) {
            return EligibilityStatus::Ineligible;
        }

        match self.effective_until() {
            Some(until) if until <= now => {
                if pending {
                    EligibilityStatus::Pending
                } else {
                    EligibilityStatus::Expired
                }
            }
            Some(until) if until <= now + expiring_window => EligibilityStatus::Expiring,
            Some(_) => EligibilityStatus::Eligible,
            None if pending => EligibilityStatus::Pending,
            None => EligibilityStatus::Ineligible,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Duration {
        Duration::days(30)
    }

    #[test]
    fn test_no_qualification() {
        let now = Utc::now();
        let inputs = EligibilityInputs::default();
        assert_eq!(inputs.derive(now, window()), EligibilityStatus::Ineligible);

        let inputs = EligibilityInputs {
            latest_request_status: Some(RequestStatus::Pending),
            ..Default::default()
        };
        assert_eq!(inputs.derive(now, window()), EligibilityStatus::Pending);

        let inputs = EligibilityInputs {
            latest_request_status: Some(RequestStatus::Rejected),
            ..Default::default()
        };
        assert_eq!(inputs.derive(now, window()), EligibilityStatus::Ineligible);
    }

    #[test]
    fn test_valid_and_expiring() {
        let now = Utc::now();
        let inputs = EligibilityInputs {
            latest_request_status: Some(RequestStatus::Approved),
            qualification_valid_until: Some(now + Duration::days(200)),
            earliest_document_expiry: None,
        };
        assert_eq!(inputs.derive(now, window()), EligibilityStatus::Eligible);
        assert!(inputs.derive(now, window()).can_trade());

        let inputs = EligibilityInputs {
            earliest_document_expiry: Some(now + Duration::days(10)),
            ..inputs
        };
        assert_eq!(inputs.derive(now, window()), EligibilityStatus::Expiring);
        assert_eq!(inputs.effective_until(), Some(now + Duration::days(10)));
    }

    #[test]
    fn test_expired_document_expires_supplier() {
        let now = Utc::now();
        let inputs = EligibilityInputs {
            latest_request_status: Some(RequestStatus::Approved),
            qualification_valid_until: Some(now + Duration::days(200)),
            earliest_document_expiry: Some(now - Duration::days(1)),
        };
        let status = inputs.derive(now, window());
        assert_eq!(status, EligibilityStatus::Expired);
        assert!(!status.can_trade());
    }

    #[test]
    fn test_latest_rejection_overrides_valid_qualification() {
        let now = Utc::now();
        let inputs = EligibilityInputs {
            latest_request_status: Some(RequestStatus::Rejected),
            qualification_valid_until: Some(now + Duration::days(200)),
            earliest_document_expiry: None,
        };
        let status = inputs.derive(now, window());
        assert_eq!(status, EligibilityStatus::Ineligible);
        assert!(!status.can_trade());
    }

    #[test]
    fn test_renewal_pending_after_expiry() {
        let now = Utc::now();
        let inputs = EligibilityInputs {
            latest_request_status: Some(RequestStatus::Pending),
            qualification_valid_until: Some(now - Duration::days(3)),
            earliest_document_expiry: None,
        };
        assert_eq!(inputs.derive(now, window()), EligibilityStatus::Pending);
    }
}
