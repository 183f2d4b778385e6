use std::time::Duration;

use spark_sdk::client::Part;
use spark_sdk::jobs::{JobRequest, JobStatus};
use spark_sdk::{JobPoller, JobRoute, PollOptions};
use wiremock::matchers::{header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::api_key_client;

#[tokio::test]
async fn import_job_uploads_polls_and_downloads() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/acme/api/v4/import"))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .respond_with(
            ResponseTemplate::new(202)
                .set_body_json(serde_json::json!({"jobId": "imp-7", "status": "queued"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    // First poll reports progress, then completion.
    Mock::given(method("GET"))
        .and(path("/acme/api/v4/import/imp-7/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"id": "imp-7", "status": "in_progress"})),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/acme/api/v4/import/imp-7/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "imp-7",
            "status": "completed",
            "outputs": [{"url": "/acme/files/imp-7/summary", "fileName": "summary.json"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/acme/files/imp-7/summary"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/json")
                .set_body_json(serde_json::json!({"imported": 3})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = api_key_client(&server);
    let poller = JobPoller::new(client, JobRoute::import());

    let package = Part::file("file", "package.zip", b"PK\x03\x04".to_vec())
        .content_type("application/zip");
    let outcome = poller
        .run(
            JobRequest::multipart(vec![
                Part::text("inputs", r#"{"source": "demo"}"#),
                package,
            ]),
            &PollOptions::default().with_poll_interval(Duration::from_millis(5)),
        )
        .await
        .unwrap();

    assert_eq!(outcome.job.id, "imp-7");
    assert_eq!(outcome.job.status, JobStatus::Succeeded);
    assert_eq!(outcome.files.len(), 1);
    assert_eq!(outcome.files[0].file_name, "summary.json");
    assert_eq!(outcome.files[0].content_type.as_deref(), Some("application/json"));
    let summary: serde_json::Value = serde_json::from_slice(&outcome.files[0].body).unwrap();
    assert_eq!(summary["imported"], 3);
}

#[tokio::test]
async fn abandoned_wait_reports_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/acme/api/v4/export/exp-1/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"id": "exp-1", "status": "running"})),
        )
        .mount(&server)
        .await;

    let poller = JobPoller::new(api_key_client(&server), JobRoute::export());
    let job = serde_json::from_value(serde_json::json!({"id": "exp-1", "status": "pending"})).unwrap();
    let options = PollOptions::default()
        .with_poll_interval(Duration::from_millis(10))
        .with_max_wait(Duration::from_millis(50));

    let err = poller.await_completion(&job, &options).await.unwrap_err();
    assert!(err.is_timeout());
}
