//! Database-backed integration tests
//!
//! Each test skips when no PostgreSQL is available (no container runtime and
//! no `TEST_DATABASE_URL`).

mod helpers;

use assert_matches::assert_matches;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use coopfarma::models::access_request::{CreateAccessRequest, ReviewDecision};
use coopfarma::models::notification::{Audience, NotificationEvent};
use coopfarma::models::substance::CreateSubstanceRequestInput;
use coopfarma::models::supplier::{CreateSupplierRequest, EligibilityStatus, SubmitQualificationRequest};
use coopfarma::models::user::UserRole;
use coopfarma::models::voting::{CloseVotingRequest, CreateVotingRequest};
use coopfarma::CoopError;
use helpers::*;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use serial_test::serial;
use tower::ServiceExt;

macro_rules! context_or_skip {
    () => {
        match TestContext::try_new().await {
            Some(ctx) => ctx,
            None => return,
        }
    };
}

#[tokio::test]
#[serial]
async fn test_login_and_me_over_http() {
    let ctx = context_or_skip!();
    let member = ctx.create_user(UserRole::Cooperado, Some("12345678000199")).await;

    let login = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": member.user.email, "password": TEST_PASSWORD }).to_string(),
        ))
        .unwrap();
    let response = ctx.router().oneshot(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let token = body["token"].as_str().unwrap().to_string();
    assert!(body["user"].get("passwordHash").is_none());

    let me = Request::builder()
        .uri("/api/auth/me")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = ctx.router().oneshot(me).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["id"], member.user.id.to_string());
    assert_eq!(body["role"], "cooperado");
}

#[tokio::test]
#[serial]
async fn test_login_with_wrong_password_is_unauthorized() {
    let ctx = context_or_skip!();
    let member = ctx.create_user(UserRole::Cooperado, None).await;

    let login = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": member.user.email, "password": "wrong-password" }).to_string(),
        ))
        .unwrap();
    let response = ctx.router().oneshot(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn test_flash_deal_claims_never_oversell() {
    let ctx = context_or_skip!();
    let admin = ctx.create_user(UserRole::Cooperativa, None).await;
    let substance = ctx.create_substance("Minoxidil").await;

    let deal = ctx
        .state
        .services
        .flash_deals
        .create(&admin.ctx, flash_deal_request(substance.id, 5, None))
        .await
        .unwrap();

    let mut members = Vec::new();
    for i in 0..8 {
        members.push(ctx.create_user(UserRole::Cooperado, Some(format!("1111111100{:04}", i).as_str())).await);
    }

    let mut handles = Vec::new();
    for member in &members {
        let service = ctx.state.services.flash_deals.clone();
        let caller = member.ctx.clone();
        let deal_id = deal.id;
        handles.push(tokio::spawn(async move { service.claim(&caller, deal_id, Decimal::ONE).await }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(e) => assert_matches!(e, CoopError::BusinessRule(_)),
        }
    }
    assert_eq!(succeeded, 5);

    let view = ctx.state.services.flash_deals.get(deal.id).await.unwrap();
    assert_eq!(view.remaining_stock, Decimal::ZERO);
    assert_eq!(ctx.database.count_records("flash_deal_claims").await.unwrap(), 5);
}

#[tokio::test]
#[serial]
async fn test_flash_deal_claim_debits_buyer() {
    let ctx = context_or_skip!();
    let admin = ctx.create_user(UserRole::Cooperativa, None).await;
    let member = ctx.create_user(UserRole::Cooperado, Some("22222222000122")).await;
    let substance = ctx.create_substance("Cafeína anidra").await;

    let deal = ctx
        .state
        .services
        .flash_deals
        .create(&admin.ctx, flash_deal_request(substance.id, 10, Some(3)))
        .await
        .unwrap();

    let receipt = ctx
        .state
        .services
        .flash_deals
        .claim(&member.ctx, deal.id, Decimal::new(2, 0))
        .await
        .unwrap();
    assert_eq!(receipt.remaining_stock, Decimal::new(8, 0));
    assert_eq!(receipt.transaction.total_amount, Decimal::new(500, 2));

    let over_limit = ctx
        .state
        .services
        .flash_deals
        .claim(&member.ctx, deal.id, Decimal::new(2, 0))
        .await;
    assert_matches!(over_limit, Err(CoopError::PermissionDenied(_)));

    let balance = ctx.state.services.financial.balance(&member.ctx, None).await.unwrap();
    assert_eq!(balance.debits, Decimal::new(500, 2));
    assert_eq!(balance.balance, Decimal::new(-500, 2));
}

#[tokio::test]
#[serial]
async fn test_reserve_share_is_enforced_per_cnpj() {
    let ctx = context_or_skip!();
    let admin = ctx.create_user(UserRole::Cooperativa, None).await;
    let first = ctx.create_user(UserRole::Cooperado, Some("33333333000133")).await;
    let colleague = ctx.create_user(UserRole::Cooperado, Some("33333333000133")).await;
    let second = ctx.create_user(UserRole::Cooperado, Some("44444444000144")).await;
    let substance = ctx.create_substance("Finasterida").await;

    let quota = ctx
        .state
        .services
        .reserves
        .create(&admin.ctx, reserve_request(substance.id, 10))
        .await
        .unwrap();
    assert_eq!(quota.participant_count, 2);
    assert_eq!(quota.share_per_cnpj, Decimal::new(5, 0));

    let reserves = &ctx.state.services.reserves;
    reserves.claim(&first.ctx, quota.id, Decimal::new(3, 0)).await.unwrap();

    // Same CNPJ shares the quota across users
    let over_share = reserves.claim(&colleague.ctx, quota.id, Decimal::new(3, 0)).await;
    assert_matches!(over_share, Err(CoopError::PermissionDenied(_)));

    let receipt = reserves.claim(&colleague.ctx, quota.id, Decimal::new(2, 0)).await.unwrap();
    assert_eq!(receipt.status.cnpj_remaining, Some(Decimal::ZERO));

    let status = reserves.status(&second.ctx, quota.id).await.unwrap();
    assert_eq!(status.total_claimed, Decimal::new(5, 0));
    assert_eq!(status.cnpj_claimed, Some(Decimal::ZERO));
}

#[tokio::test]
#[serial]
async fn test_voting_lifecycle_one_ballot_per_cnpj() {
    let ctx = context_or_skip!();
    let master = ctx.create_user(UserRole::Master, None).await;
    let a = ctx.create_user(UserRole::Cooperado, Some("55555555000155")).await;
    let a_colleague = ctx.create_user(UserRole::Cooperado, Some("55555555000155")).await;
    let b = ctx.create_user(UserRole::Cooperado, Some("66666666000166")).await;

    let voting = &ctx.state.services.voting;
    let draft = voting
        .create(
            &master.ctx,
            CreateVotingRequest {
                title: " Novo fornecedor de embalagens ".to_string(),
                description: None,
                options: vec!["Aprovar".to_string(), "Rejeitar".to_string()],
                closes_at: None,
                one_vote_per_cnpj: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(draft.title, "Novo fornecedor de embalagens");

    assert_matches!(voting.get(&a.ctx, draft.id).await, Err(CoopError::NotFound { .. }));
    assert_matches!(voting.vote(&a.ctx, draft.id, 0).await, Err(CoopError::BusinessRule(_)));

    voting.open(&master.ctx, draft.id).await.unwrap();
    voting.vote(&a.ctx, draft.id, 1).await.unwrap();
    assert_matches!(voting.vote(&a.ctx, draft.id, 0).await, Err(CoopError::Conflict(_)));
    assert_matches!(voting.vote(&a_colleague.ctx, draft.id, 0).await, Err(CoopError::Conflict(_)));
    voting.vote(&b.ctx, draft.id, 1).await.unwrap();

    let (decision, results) = voting
        .close(&master.ctx, draft.id, CloseVotingRequest { notes: Some("Assembleia".to_string()) })
        .await
        .unwrap();
    assert_eq!(results.total_votes, 2);
    assert_eq!(results.winning_option, Some(1));
    assert_eq!(decision.winning_option, Some(1));

    let public = voting.results(&a.ctx, draft.id).await.unwrap();
    assert_eq!(public.tally[1].votes, 2);
}

#[tokio::test]
#[serial]
async fn test_uploaded_file_is_private_to_owner_and_master() {
    use coopfarma::config::StorageConfig;
    use coopfarma::services::StorageService;

    let ctx = context_or_skip!();
    let upload_dir = tempfile::tempdir().unwrap();
    let storage = StorageService::new(
        ctx.state.db.clone(),
        StorageConfig {
            upload_dir: upload_dir.path().to_string_lossy().into_owned(),
            max_upload_bytes: 1024,
        },
    );

    let owner = ctx.create_user(UserRole::Fornecedor, None).await;
    let stranger = ctx.create_user(UserRole::Cooperado, Some("77777777000177")).await;
    let master = ctx.create_user(UserRole::Master, None).await;

    let stored = storage
        .store(&owner.ctx, "licença sanitária.pdf", Some("application/pdf"), b"%PDF-1.4")
        .await
        .unwrap();
    assert_eq!(stored.size_bytes, 8);

    let (file, bytes) = storage.open(&master.ctx, stored.id).await.unwrap();
    assert_eq!(file.content_type, "application/pdf");
    assert_eq!(bytes, b"%PDF-1.4");

    assert_matches!(storage.open(&stranger.ctx, stored.id).await, Err(CoopError::PermissionDenied(_)));
    assert_matches!(
        storage.store(&owner.ctx, "big.bin", None, &[0u8; 2048]).await,
        Err(CoopError::InvalidInput(_))
    );
}

fn approve() -> ReviewDecision {
    ReviewDecision { approve: true, notes: None, valid_until: None }
}

fn reject(notes: &str) -> ReviewDecision {
    ReviewDecision { approve: false, notes: Some(notes.to_string()), valid_until: None }
}

#[tokio::test]
#[serial]
async fn test_only_master_reviews_qualification_requests() {
    let ctx = context_or_skip!();
    let master = ctx.create_user(UserRole::Master, None).await;
    let staff = ctx.create_user(UserRole::Cooperativa, None).await;
    let member = ctx.create_user(UserRole::Cooperado, Some("88888888000188")).await;
    let vendor = ctx.create_user(UserRole::Fornecedor, None).await;
    let qualification = &ctx.state.services.qualification;

    let supplier = qualification
        .register_supplier(
            &vendor.ctx,
            CreateSupplierRequest {
                company_name: "Insumos Paulista".to_string(),
                cnpj: "11.222.333/0001-81".to_string(),
                contact_email: "vendas@insumos.test".to_string(),
                phone: None,
                address: None,
            },
        )
        .await
        .unwrap();
    let submission = || SubmitQualificationRequest { notes: None, documents: Vec::new() };

    let first = qualification.submit_request(&vendor.ctx, submission()).await.unwrap();
    for caller in [&staff, &member, &vendor] {
        assert_matches!(
            qualification.review_request(&caller.ctx, first.request.id, approve()).await,
            Err(CoopError::PermissionDenied(_))
        );
    }
    qualification.review_request(&master.ctx, first.request.id, approve()).await.unwrap();
    assert_eq!(qualification.eligibility(supplier.id).await.unwrap().status, EligibilityStatus::Eligible);

    // A rejected renewal overrides the still-valid qualification
    let renewal = qualification.submit_request(&vendor.ctx, submission()).await.unwrap();
    qualification
        .review_request(&master.ctx, renewal.request.id, reject("Laudo ilegível"))
        .await
        .unwrap();
    assert_eq!(qualification.eligibility(supplier.id).await.unwrap().status, EligibilityStatus::Ineligible);
}

#[tokio::test]
#[serial]
async fn test_only_master_reviews_substance_requests() {
    let ctx = context_or_skip!();
    let master = ctx.create_user(UserRole::Master, None).await;
    let staff = ctx.create_user(UserRole::Cooperativa, None).await;
    let member = ctx.create_user(UserRole::Cooperado, Some("99999999000199")).await;
    let substances = &ctx.state.services.substances;

    let request = substances
        .request_substance(
            &member.ctx,
            CreateSubstanceRequestInput {
                name: "Bakuchiol".to_string(),
                cas_number: None,
                justification: Some("Alternativa ao retinol".to_string()),
            },
        )
        .await
        .unwrap();

    for caller in [&staff, &member] {
        assert_matches!(
            substances.review_request(&caller.ctx, request.id, approve()).await,
            Err(CoopError::PermissionDenied(_))
        );
    }

    let reviewed = substances.review_request(&master.ctx, request.id, approve()).await.unwrap();
    assert!(reviewed.substance_id.is_some());
}

#[tokio::test]
#[serial]
async fn test_only_master_approves_access_requests() {
    let ctx = context_or_skip!();
    let master = ctx.create_user(UserRole::Master, None).await;
    let staff = ctx.create_user(UserRole::Cooperativa, None).await;
    let member = ctx.create_user(UserRole::Cooperado, Some("12121212000112")).await;
    let users = &ctx.state.services.users;

    let request = users
        .submit_access_request(CreateAccessRequest {
            name: "Farmácia Central".to_string(),
            email: "contato@farmaciacentral.test".to_string(),
            cnpj: Some("11222333000181".to_string()),
            company_name: Some("Farmácia Central Ltda".to_string()),
            requested_role: UserRole::Cooperado,
            message: None,
        })
        .await
        .unwrap();

    for caller in [&staff, &member] {
        assert_matches!(
            users.approve_access_request(&caller.ctx, request.id, None).await,
            Err(CoopError::PermissionDenied(_))
        );
        assert_matches!(
            users.reject_access_request(&caller.ctx, request.id, None).await,
            Err(CoopError::PermissionDenied(_))
        );
    }

    let (reviewed, user) = users.approve_access_request(&master.ctx, request.id, None).await.unwrap();
    assert_eq!(user.email, "contato@farmaciacentral.test");
    assert_eq!(user.role, UserRole::Cooperado);
    assert_eq!(reviewed.reviewed_by, Some(master.user.id));
}

#[tokio::test]
#[serial]
async fn test_notification_fan_out_survives_failed_writes() {
    let ctx = context_or_skip!();
    let a = ctx.create_user(UserRole::Cooperado, Some("13131313000113")).await;
    let b = ctx.create_user(UserRole::Cooperado, Some("14141414000114")).await;
    let notifications = &ctx.state.services.notifications;
    let audience = || Audience::Users(vec![a.user.id, b.user.id]);

    // PostgreSQL rejects NUL bytes in text, so every in-app write fails
    let broken = NotificationEvent::new("transparency.news", "Aviso\0", "Mensagem", audience());
    assert_eq!(notifications.notify(broken).await.unwrap(), 0);
    assert_eq!(ctx.database.count_records("notifications").await.unwrap(), 0);

    let event = NotificationEvent::new("transparency.news", "Aviso", "Mensagem", audience());
    assert_eq!(notifications.notify(event).await.unwrap(), 2);
    assert_eq!(ctx.database.count_records("notifications").await.unwrap(), 2);
}
