use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use spark_sdk::auth::AuthKind;
use spark_sdk::client::{env, ConfigBuilder};
use spark_sdk::{ConfigOverrides, SparkClient, UriOptions};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{api_key_client, tenant_url};

#[tokio::test]
async fn derived_client_leaves_original_untouched() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/acme/api/v3/product/folders"))
        .and(header("x-synthetic-key", "integration-key-9876"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"from": "acme"})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/beta/api/v3/product/folders"))
        .and(header("x-synthetic-key", "beta-key-1111"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"from": "beta"})))
        .expect(1)
        .mount(&server)
        .await;

    let original = api_key_client(&server);
    let masked_before = original.config().auth().to_string();

    let derived = original
        .with_overrides(ConfigOverrides {
            tenant: Some("beta".to_string()),
            api_key: Some("beta-key-1111".to_string()),
            max_retries: Some(0),
            ..Default::default()
        })
        .unwrap();

    let options = UriOptions::default();
    let a: serde_json::Value = original.get_json(&original.uri("product/folders", &options)).await.unwrap();
    let b: serde_json::Value = derived.get_json(&derived.uri("product/folders", &options)).await.unwrap();
    let c: serde_json::Value = original.get_json(&original.uri("product/folders", &options)).await.unwrap();

    assert_eq!(a["from"], "acme");
    assert_eq!(b["from"], "beta");
    assert_eq!(c["from"], "acme");
    assert_eq!(original.config().auth().to_string(), masked_before);
    assert!(masked_before.ends_with("9876)"));
    assert!(!masked_before.contains("integration"));
    assert_eq!(original.config().max_retries(), 2);
    assert_eq!(derived.config().max_retries(), 0);
}

#[tokio::test]
async fn environment_lookup_builds_oauth_config() {
    let server = MockServer::start().await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"clientId": "file-client", "clientSecret": "file-secret-4321"}}"#).unwrap();

    let vars: HashMap<&str, String> = HashMap::from([
        (env::BASE_URL, tenant_url(&server)),
        (env::OAUTH_PATH, file.path().display().to_string()),
        (env::TIMEOUT_MS, "5000".to_string()),
        (env::MAX_RETRIES, "4".to_string()),
        (env::RETRY_INTERVAL, "0.5".to_string()),
    ]);

    let config = ConfigBuilder::from_lookup(|name| vars.get(name).cloned())
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(config.base_url().tenant(), "acme");
    assert_eq!(config.auth().kind(), AuthKind::OAuth);
    assert_eq!(config.timeout(), Duration::from_millis(5000));
    assert_eq!(config.max_retries(), 4);
    assert_eq!(config.retry_interval(), Duration::from_millis(500));

    // The token endpoint is derived from the base URL.
    let client = SparkClient::new(config).unwrap();
    let token_url = match client.config().auth() {
        spark_sdk::AuthStrategy::OAuth(oauth) => oauth.token_url().map(str::to_string),
        _ => None,
    };
    assert_eq!(
        token_url,
        Some(format!("{}/auth/realms/acme/protocol/openid-connect/token", server.uri()))
    );
}

#[tokio::test]
async fn missing_credentials_is_a_configuration_error() {
    let server = MockServer::start().await;
    let vars: HashMap<&str, String> = HashMap::from([(env::BASE_URL, tenant_url(&server))]);

    let err = ConfigBuilder::from_lookup(|name| vars.get(name).cloned())
        .and_then(|builder| builder.build())
        .unwrap_err();

    assert!(err.is_configuration());
}
