//! Token lifecycle tests against a mock SSO server

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use upgrade_risk_engine::Error;
use upgrade_risk_engine::auth::{TokenManager, build_http_client};
use upgrade_risk_engine::config::{RetryConfig, SsoConfig};
use upgrade_risk_engine::retry::RetryPolicy;

fn sso_config(issuer: &str) -> SsoConfig {
    SsoConfig {
        client_id: "risk-engine".to_string(),
        client_secret: "hunter2".to_string(),
        issuer: issuer.to_string(),
        allow_insecure: false,
    }
}

async fn mount_discovery(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_endpoint": format!("{}/token", server.uri())
        })))
        .mount(server)
        .await;
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(&RetryConfig {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    })
}

#[tokio::test]
async fn unreachable_discovery_is_a_config_error() {
    let http = build_http_client(false, Duration::from_millis(500)).unwrap();
    let result = TokenManager::connect(http, &sso_config("http://127.0.0.1:1")).await;
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn malformed_discovery_is_a_config_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"issuer": "x"})))
        .mount(&server)
        .await;

    let http = build_http_client(false, Duration::from_secs(5)).unwrap();
    let result = TokenManager::connect(http, &sso_config(&server.uri())).await;
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn non_success_discovery_is_a_config_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let http = build_http_client(false, Duration::from_secs(5)).unwrap();
    let result = TokenManager::connect(http, &sso_config(&server.uri())).await;
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn fresh_token_is_not_refetched() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=risk-engine"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "expires_in": 600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let http = build_http_client(false, Duration::from_secs(5)).unwrap();
    let manager = TokenManager::connect(http, &sso_config(&server.uri()))
        .await
        .unwrap();

    manager.ensure_fresh().await.unwrap();
    // Second call is a no-op: the token still has > 30s margin
    manager.ensure_fresh().await.unwrap();

    let request = manager.authorized_get(&server.uri()).unwrap();
    drop(request);
    assert!(manager.current_expiry().is_some());
}

#[tokio::test]
async fn near_expiry_token_is_replaced() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    // expires_in below the 30s safety margin, so every call refreshes
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-short",
            "expires_in": 5
        })))
        .expect(2)
        .mount(&server)
        .await;

    let http = build_http_client(false, Duration::from_secs(5)).unwrap();
    let manager = TokenManager::connect(http, &sso_config(&server.uri()))
        .await
        .unwrap();

    manager.ensure_fresh().await.unwrap();
    manager.ensure_fresh().await.unwrap();
}

#[tokio::test]
async fn concurrent_refreshes_collapse_into_one_handshake() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "tok-1", "expires_in": 600}))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let http = build_http_client(false, Duration::from_secs(5)).unwrap();
    let manager = Arc::new(
        TokenManager::connect(http, &sso_config(&server.uri()))
            .await
            .unwrap(),
    );

    let refreshes = (0..5).map(|_| manager.ensure_fresh());
    for result in futures::future::join_all(refreshes).await {
        result.unwrap();
    }
}

#[tokio::test]
async fn rejected_exchange_surfaces_as_token_refresh_error() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let http = build_http_client(false, Duration::from_secs(5)).unwrap();
    let manager = TokenManager::connect(http, &sso_config(&server.uri()))
        .await
        .unwrap();

    let result = manager.ensure_fresh().await;
    assert!(matches!(result, Err(Error::TokenRefresh(_))));
}

#[tokio::test]
async fn retry_wrapper_absorbs_transient_sso_outage() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    // Two failures, then success
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "expires_in": 600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let http = build_http_client(false, Duration::from_secs(5)).unwrap();
    let manager = TokenManager::connect(http, &sso_config(&server.uri()))
        .await
        .unwrap();

    fast_retry(5)
        .run("sso-token-refresh", || manager.ensure_fresh())
        .await
        .unwrap();
}

#[tokio::test]
async fn retry_exhaustion_returns_the_refresh_error() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let http = build_http_client(false, Duration::from_secs(5)).unwrap();
    let manager = TokenManager::connect(http, &sso_config(&server.uri()))
        .await
        .unwrap();

    let result = fast_retry(3)
        .run("sso-token-refresh", || manager.ensure_fresh())
        .await;
    assert!(matches!(result, Err(Error::TokenRefresh(_))));
}

#[tokio::test]
async fn authorized_get_without_token_is_an_error() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    let http = build_http_client(false, Duration::from_secs(5)).unwrap();
    let manager = TokenManager::connect(http, &sso_config(&server.uri()))
        .await
        .unwrap();

    assert!(matches!(
        manager.authorized_get("http://example.test"),
        Err(Error::TokenRefresh(_))
    ));
}
