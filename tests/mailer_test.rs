//! Mail relay client tests against a mock relay

use coopfarma::config::MailConfig;
use coopfarma::services::{Mailer, OutgoingEmail};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, enabled: bool) -> MailConfig {
    MailConfig {
        enabled,
        api_url: format!("{}/api/send", server.uri()),
        api_key: "relay-key".to_string(),
        from_address: "no-reply@coopfarma.test".to_string(),
        timeout_seconds: 2,
    }
}

fn welcome() -> OutgoingEmail {
    OutgoingEmail {
        to: "farmacia@example.com".to_string(),
        subject: "Acesso aprovado".to_string(),
        text: "Sua conta foi criada.".to_string(),
    }
}

#[tokio::test]
async fn test_send_posts_payload_to_relay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/send"))
        .and(header("authorization", "Bearer relay-key"))
        .and(body_json(json!({
            "from": "no-reply@coopfarma.test",
            "to": "farmacia@example.com",
            "subject": "Acesso aprovado",
            "text": "Sua conta foi criada."
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let mailer = Mailer::new(config(&server, true)).unwrap();
    mailer.send(&welcome()).await.unwrap();
}

#[tokio::test]
async fn test_disabled_mailer_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mailer = Mailer::new(config(&server, false)).unwrap();
    assert!(!mailer.is_enabled());
    mailer.send(&welcome()).await.unwrap();
}

#[tokio::test]
async fn test_relay_failure_is_an_error_but_best_effort_swallows_it() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/send"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mailer = Mailer::new(config(&server, true)).unwrap();
    assert!(mailer.send(&welcome()).await.is_err());
    assert!(!mailer.send_best_effort(&welcome()).await);
}
