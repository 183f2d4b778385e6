use std::time::Duration;

use spark_sdk::{Config, SparkClient};
use wiremock::MockServer;

/// Route SDK tracing output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("spark_sdk=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Base URL of the `acme` tenant on the mock platform.
pub fn tenant_url(server: &MockServer) -> String {
    format!("{}/acme", server.uri())
}

/// A client authenticated with a static API key and fast retries.
pub fn api_key_client(server: &MockServer) -> SparkClient {
    init_tracing();
    let config = Config::builder()
        .with_base_url(tenant_url(server))
        .with_api_key("integration-key-9876")
        .with_retry_interval(Duration::from_millis(1))
        .build()
        .expect("valid config");
    SparkClient::new(config).expect("client")
}
