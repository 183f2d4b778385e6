use serde::Serialize;
use spark_sdk::jobs::ChunkOutcome;
use spark_sdk::{BatchOptions, BatchRunner, ServiceUri, UriOptions};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::api_key_client;

#[derive(Serialize)]
struct Quote {
    id: u32,
    amount: f64,
}

#[tokio::test]
async fn failing_chunk_is_isolated() {
    let server = MockServer::start().await;
    let execute = "/acme/api/v3/folders/pricing/services/quote/execute";

    // The second chunk starts with record 101 and is rejected.
    Mock::given(method("POST"))
        .and(path(execute))
        .and(body_partial_json(serde_json::json!({"inputs": [{"id": 101}]})))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(serde_json::json!({"message": "amount out of range"})),
        )
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(execute))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "outputs": [{"premium": 1.0}],
            "errors": []
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    let service = ServiceUri::parse("pricing/quote").unwrap();
    let url = client.service_uri(&service, "execute", &UriOptions::default());
    let runner = BatchRunner::new(client, url);

    let records: Vec<Quote> = (1..=250).map(|id| Quote { id, amount: id as f64 * 10.0 }).collect();
    let result = runner
        .run(&records, &BatchOptions::default().with_chunk_size(100).parallel(2))
        .await
        .unwrap();

    let sizes: Vec<usize> = result.chunks.iter().map(|c| c.size).collect();
    assert_eq!(sizes, vec![100, 100, 50]);
    assert_eq!(result.succeeded_chunks(), 2);
    assert_eq!(result.failed_chunks(), 1);
    assert_eq!(result.total_submitted, 250);
    assert_eq!(result.total_failed, 100);

    match &result.chunks[1].outcome {
        ChunkOutcome::Failed(err) => {
            assert_eq!(err.status(), Some(422));
            assert!(!err.is_retryable());
        }
        other => panic!("expected chunk 1 to fail, got {:?}", other),
    }
}
