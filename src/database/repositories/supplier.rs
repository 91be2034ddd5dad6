//! Supplier and qualification repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::models::access_request::RequestStatus;
use crate::models::supplier::{
    CreateSupplierRequest, DocumentInput, EligibilityInputs, QualificationDocument,
    QualificationRequest, Supplier, SupplierQualification,
};
use crate::utils::errors::CoopError;

#[derive(Clone, Debug)]
pub struct SupplierRepository {
    pool: PgPool,
}

impl SupplierRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the supplier profile owned by `user_id`
    pub async fn create(&self, user_id: Uuid, request: CreateSupplierRequest) -> Result<Supplier, CoopError> {
        let supplier = sqlx::query_as::<_, Supplier>(
            r#"
            INSERT INTO suppliers (id, user_id, company_name, cnpj, contact_email, phone, address, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(request.company_name)
        .bind(request.cnpj)
        .bind(request.contact_email)
        .bind(request.phone)
        .bind(request.address)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(supplier)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Supplier>, CoopError> {
        let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(supplier)
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Supplier>, CoopError> {
        let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(supplier)
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Supplier>, CoopError> {
        let suppliers = sqlx::query_as::<_, Supplier>(
            "SELECT * FROM suppliers ORDER BY company_name LIMIT $1 OFFSET $2"
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(suppliers)
    }

    pub async fn has_pending_request(&self, supplier_id: Uuid) -> Result<bool, CoopError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM qualification_requests WHERE supplier_id = $1 AND status = 'pending')"
        )
        .bind(supplier_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    pub async fn insert_request(conn: &mut PgConnection, supplier_id: Uuid, notes: Option<String>) -> Result<QualificationRequest, CoopError> {
        let request = sqlx::query_as::<_, QualificationRequest>(
            r#"
            INSERT INTO qualification_requests (id, supplier_id, notes, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(supplier_id)
        .bind(notes)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(request)
    }

    pub async fn insert_document(conn: &mut PgConnection, request_id: Uuid, document: DocumentInput) -> Result<QualificationDocument, CoopError> {
        let document = sqlx::query_as::<_, QualificationDocument>(
            r#"
            INSERT INTO qualification_documents (id, request_id, doc_type, file_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(request_id)
        .bind(document.doc_type)
        .bind(document.file_id)
        .bind(document.expires_at)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(document)
    }

    pub async fn lock_request(conn: &mut PgConnection, id: Uuid) -> Result<Option<QualificationRequest>, CoopError> {
        let request = sqlx::query_as::<_, QualificationRequest>(
            "SELECT * FROM qualification_requests WHERE id = $1 FOR UPDATE"
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(request)
    }

    /// Requests, optionally restricted to one supplier or status
    pub async fn list_requests(&self, supplier_id: Option<Uuid>, status: Option<RequestStatus>, limit: i64, offset: i64) -> Result<Vec<QualificationRequest>, CoopError> {
        let requests = sqlx::query_as::<_, QualificationRequest>(
            r#"
            SELECT * FROM qualification_requests
            WHERE ($1::uuid IS NULL OR supplier_id = $1)
              AND ($2::request_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        )
        .bind(supplier_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    pub async fn documents_for_request(&self, request_id: Uuid) -> Result<Vec<QualificationDocument>, CoopError> {
        let documents = sqlx::query_as::<_, QualificationDocument>(
            "SELECT * FROM qualification_documents WHERE request_id = $1 ORDER BY created_at"
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(documents)
    }

    pub async fn set_request_status(conn: &mut PgConnection, id: Uuid, status: RequestStatus, reviewer: Uuid, notes: Option<String>) -> Result<QualificationRequest, CoopError> {
        let request = sqlx::query_as::<_, QualificationRequest>(
            r#"
            UPDATE qualification_requests
            SET status = $2, reviewed_by = $3, review_notes = $4, reviewed_at = $5
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(id)
        .bind(status)
        .bind(reviewer)
        .bind(notes)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(request)
    }

    pub async fn insert_qualification(conn: &mut PgConnection, supplier_id: Uuid, request_id: Uuid, valid_until: DateTime<Utc>, approved_by: Uuid) -> Result<SupplierQualification, CoopError> {
        let qualification = sqlx::query_as::<_, SupplierQualification>(
            r#"
            INSERT INTO supplier_qualifications (id, supplier_id, request_id, valid_until, approved_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(supplier_id)
        .bind(request_id)
        .bind(valid_until)
        .bind(approved_by)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(qualification)
    }

    /// Gather the rows eligibility is derived from
    pub async fn eligibility_inputs(&self, supplier_id: Uuid) -> Result<EligibilityInputs, CoopError> {
        let latest_request_status: Option<RequestStatus> = sqlx::query_scalar(
            "SELECT status FROM qualification_requests WHERE supplier_id = $1 ORDER BY created_at DESC LIMIT 1"
        )
        .bind(supplier_id)
        .fetch_optional(&self.pool)
        .await?;

        let qualification = sqlx::query_as::<_, SupplierQualification>(
            "SELECT * FROM supplier_qualifications WHERE supplier_id = $1 ORDER BY valid_until DESC LIMIT 1"
        )
        .bind(supplier_id)
        .fetch_optional(&self.pool)
        .await?;

        let earliest_document_expiry = match &qualification {
            Some(q) => {
                sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
                    "SELECT MIN(expires_at) FROM qualification_documents WHERE request_id = $1"
                )
                .bind(q.request_id)
                .fetch_one(&self.pool)
                .await?
            }
            None => None,
        };

        Ok(EligibilityInputs {
            latest_request_status,
            qualification_valid_until: qualification.map(|q| q.valid_until),
            earliest_document_expiry,
        })
    }
}
