use std::time::Duration;

use chrono::Utc;
use spark_sdk::auth::{AccessToken, AuthKind};
use spark_sdk::{AuthStrategy, Config, ConfigOverrides, OAuth, SparkClient, UriOptions};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{init_tracing, tenant_url};

const TOKEN_PATH: &str = "/auth/realms/acme/protocol/openid-connect/token";

async fn mount_token(server: &MockServer, token: &str, delay: Duration, expected: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=svc-client"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({
                    "access_token": token,
                    "token_type": "bearer",
                    "expires_in": 300
                }))
                .set_delay(delay),
        )
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_folders(server: &MockServer, token: &str, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/acme/api/v3/product/folders"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .expect(expected)
        .mount(server)
        .await;
}

fn oauth_client(server: &MockServer, oauth: OAuth) -> SparkClient {
    init_tracing();
    let config = Config::builder()
        .with_base_url(tenant_url(server))
        .with_oauth(oauth)
        .build()
        .unwrap();
    SparkClient::new(config).unwrap()
}

#[tokio::test]
async fn oauth_token_is_exchanged_once_and_reused() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", Duration::ZERO, 1).await;
    mount_folders(&server, "tok-1", 2).await;

    let client = oauth_client(&server, OAuth::new("svc-client", "svc-secret-0001"));
    assert_eq!(client.config().auth().kind(), AuthKind::OAuth);

    let url = client.uri("product/folders", &UriOptions::default());
    let _: serde_json::Value = client.get_json(&url).await.unwrap();
    let _: serde_json::Value = client.get_json(&url).await.unwrap();
}

#[tokio::test]
async fn expired_token_refreshes_single_flight() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-fresh", Duration::from_millis(100), 1).await;
    mount_folders(&server, "tok-fresh", 2).await;

    let stale = AccessToken::new("tok-stale", Utc::now() - chrono::Duration::minutes(5));
    let client = oauth_client(
        &server,
        OAuth::new("svc-client", "svc-secret-0001").with_token(stale),
    );

    let url = client.uri("product/folders", &UriOptions::default());
    let (a, b) = tokio::join!(
        client.get_json::<serde_json::Value>(&url),
        client.get_json::<serde_json::Value>(&url),
    );
    a.unwrap();
    b.unwrap();
}

#[tokio::test]
async fn rejected_credentials_fail_without_sending() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_client",
            "error_description": "bad secret"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_folders(&server, "never", 0).await;

    let client = oauth_client(&server, OAuth::new("svc-client", "wrong-secret"));
    let err = client
        .get_json::<serde_json::Value>(&client.uri("product/folders", &UriOptions::default()))
        .await
        .unwrap_err();

    assert!(err.is_auth_error());
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn bearer_and_api_key_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/acme/api/v3/product/folders"))
        .and(header("authorization", "Bearer static-token-1234"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/acme/api/v3/product/folders"))
        .and(header("x-synthetic-key", "key-5678"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    init_tracing();
    let bearer = Config::builder()
        .with_base_url(tenant_url(&server))
        .with_auth(AuthStrategy::bearer("static-token-1234").unwrap())
        .build()
        .unwrap();
    let keyed = bearer
        .copy_with(ConfigOverrides {
            api_key: Some("key-5678".to_string()),
            ..Default::default()
        })
        .unwrap();

    for config in [bearer, keyed] {
        let client = SparkClient::new(config).unwrap();
        let _: serde_json::Value = client
            .get_json(&client.uri("product/folders", &UriOptions::default()))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn retenanted_client_exchanges_its_own_token() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-acme", Duration::ZERO, 1).await;
    mount_folders(&server, "tok-acme", 1).await;

    Mock::given(method("POST"))
        .and(path("/auth/realms/beta/protocol/openid-connect/token"))
        .and(body_string_contains("client_id=svc-client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "tok-beta",
            "expires_in": 300
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/beta/api/v3/product/folders"))
        .and(header("authorization", "Bearer tok-beta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let acme = oauth_client(&server, OAuth::new("svc-client", "svc-secret-0001"));
    let beta = acme
        .with_overrides(ConfigOverrides {
            tenant: Some("beta".to_string()),
            ..Default::default()
        })
        .unwrap();

    let options = UriOptions::default();
    let _: serde_json::Value = acme.get_json(&acme.uri("product/folders", &options)).await.unwrap();
    let _: serde_json::Value = beta.get_json(&beta.uri("product/folders", &options)).await.unwrap();
}
