//! Submit, poll and collect long-running jobs.

use futures::future::join_all;
use std::time::Instant;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument};

use spark_sdk_client::{Downloadable, SparkClient};

use crate::error::{Error, ErrorKind, Result};
use crate::types::{Job, JobOutcome, JobRequest, JobRoute, JobStatus, PollOptions};

/// Drives one kind of job (export, import, migration...) to completion.
///
/// Every request goes through the client's executor, so a transient poll
/// failure is retried with the client's retry policy while a 4xx aborts the
/// wait immediately.
///
/// # Example
///
/// ```rust,ignore
/// use spark_sdk_jobs::{JobPoller, JobRequest, JobRoute, PollOptions};
///
/// let poller = JobPoller::new(client, JobRoute::export());
/// let outcome = poller
///     .run(JobRequest::json(&serde_json::json!({"inputs": {"folders": ["demo"]}}))?, &PollOptions::default())
///     .await?;
/// for file in outcome.files {
///     println!("{} ({} bytes)", file.file_name, file.len());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JobPoller {
    client: SparkClient,
    route: JobRoute,
}

impl JobPoller {
    pub fn new(client: SparkClient, route: JobRoute) -> Self {
        Self { client, route }
    }

    pub fn route(&self) -> &JobRoute {
        &self.route
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start a job.
    #[instrument(skip(self, request), fields(endpoint = %self.route.endpoint()))]
    pub async fn submit(&self, request: JobRequest) -> Result<Job> {
        let url = self.route.submit_url(&self.client);
        let builder = match request {
            JobRequest::Json(body) => self.client.post(&url).json_value(body),
            JobRequest::Multipart(parts) => self.client.post(&url).multipart(parts),
        };

        let job: Job = self.client.execute(builder).await?.json().await?;
        if job.id.is_empty() {
            return Err(Error::new(ErrorKind::Job(format!(
                "Submission to '{}' returned no job id",
                self.route.endpoint()
            ))));
        }
        info!(job_id = %job.id, status = %job.status, "Job submitted");
        Ok(job)
    }

    /// Fetch the current state of a job.
    #[instrument(skip(self))]
    pub async fn status(&self, job_id: &str) -> Result<Job> {
        let url = self.route.status_url(&self.client, job_id);
        let mut job: Job = self.client.get_json(&url).await?;
        if job.id.is_empty() {
            job.id = job_id.to_string();
        }
        Ok(job)
    }

    /// Poll until the job reaches a terminal state.
    ///
    /// `max_wait` bounds the whole wait, polls and sleeps included: the last
    /// sleep is shortened to the remaining budget and an in-flight poll is
    /// abandoned when the budget runs out. On timeout the remote job is left
    /// running.
    #[instrument(skip(self, job, options), fields(job_id = %job.id))]
    pub async fn await_completion(&self, job: &Job, options: &PollOptions) -> Result<Job> {
        let start = Instant::now();
        let mut polls = 0u32;
        let timed_out = || {
            Error::new(ErrorKind::Timeout(format!(
                "Job {} did not complete within {:?}",
                job.id, options.max_wait
            )))
        };

        loop {
            let remaining = options.max_wait.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return Err(timed_out());
            }

            let current = timeout(remaining, self.status(&job.id))
                .await
                .map_err(|_| timed_out())??;
            polls += 1;

            if current.status.is_terminal() {
                info!(status = %current.status, polls, "Job finished");
                return Ok(current);
            }

            let remaining = options.max_wait.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return Err(timed_out());
            }

            debug!(status = %current.status, polls, "Job still in progress");
            sleep(options.poll_interval.min(remaining)).await;
        }
    }

    /// Download every result location of a job, in order.
    ///
    /// Downloads run concurrently; the first failure is returned.
    #[instrument(skip(self, job), fields(job_id = %job.id, files = job.result_locations.len()))]
    pub async fn download_results(&self, job: &Job) -> Result<Vec<Downloadable>> {
        let downloads = job.result_locations.iter().map(|location| {
            let url = self.client.url(&location.url);
            async move {
                let mut file = self.client.download(&url).await?;
                if let Some(name) = &location.file_name {
                    file.file_name = name.clone();
                }
                Ok::<_, spark_sdk_client::Error>(file)
            }
        });

        let results = join_all(downloads).await;
        results
            .into_iter()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Ask the platform to cancel a job.
    ///
    /// Only routes with a cancel endpoint support this. A cancelled local
    /// wait (dropping the future) does not cancel the remote job.
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    pub async fn cancel(&self, job: &Job) -> Result<()> {
        if !self.route.is_cancellable() {
            return Err(Error::new(ErrorKind::Job(format!(
                "Jobs at '{}' cannot be cancelled",
                self.route.endpoint()
            ))));
        }

        let url = self.route.job_url(&self.client, &job.id);
        self.client
            .patch_json(&url, &serde_json::json!({ "status": JobStatus::Cancelled }))
            .await?;
        info!("Job cancellation requested");
        Ok(())
    }

    /// Submit a job, wait for it and download its results.
    ///
    /// A job that ends as failed or cancelled is an error.
    pub async fn run(&self, request: JobRequest, options: &PollOptions) -> Result<JobOutcome> {
        let submitted = self.submit(request).await?;
        let job = if submitted.status.is_terminal() {
            submitted
        } else {
            self.await_completion(&submitted, options).await?
        };

        if !job.status.is_success() {
            return Err(Error::new(ErrorKind::JobFailed {
                id: job.id.clone(),
                status: job.status,
            }));
        }

        let files = self.download_results(&job).await?;
        Ok(JobOutcome { job, files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spark_sdk_client::{Config, ErrorKind as ClientErrorKind, UriOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Answers with each status in turn, repeating the last one.
    struct StatusSequence {
        statuses: Vec<&'static str>,
        outputs: serde_json::Value,
        calls: Arc<AtomicUsize>,
    }

    impl Respond for StatusSequence {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let status = self.statuses[call.min(self.statuses.len() - 1)];
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "job-1",
                "status": status,
                "outputs": self.outputs,
            }))
        }
    }

    fn client_for(server: &MockServer) -> SparkClient {
        let config = Config::builder()
            .with_base_url(format!("{}/acme", server.uri()))
            .with_api_key("key-abcd")
            .with_retry_interval(Duration::from_millis(1))
            .build()
            .unwrap();
        SparkClient::new(config).unwrap()
    }

    fn fast_polls() -> PollOptions {
        PollOptions::default().with_poll_interval(Duration::from_millis(5))
    }

    async fn mount_submit(server: &MockServer, endpoint: &str) {
        Mock::given(method("POST"))
            .and(path(format!("/acme/api/v4/{}", endpoint)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "job-1", "status": "created"})),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_run_polls_until_succeeded_and_downloads() {
        let server = MockServer::start().await;
        mount_submit(&server, "export").await;

        let calls = Arc::new(AtomicUsize::new(0));
        Mock::given(method("GET"))
            .and(path("/acme/api/v4/export/job-1/status"))
            .respond_with(StatusSequence {
                statuses: vec!["pending", "pending", "succeeded"],
                outputs: serde_json::json!([
                    "/files/package.zip",
                    {"url": format!("{}/cdn/report", server.uri()), "fileName": "report.json"}
                ]),
                calls: calls.clone(),
            })
            .expect(3)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/files/package.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cdn/report"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"{}".to_vec()))
            .mount(&server)
            .await;

        let poller = JobPoller::new(client_for(&server), JobRoute::export());
        let outcome = poller
            .run(
                JobRequest::json(&serde_json::json!({"inputs": {"folders": ["demo"]}})).unwrap(),
                &fast_polls(),
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.job.status, JobStatus::Succeeded);
        assert_eq!(outcome.files.len(), 2);
        assert_eq!(outcome.files[0].file_name, "package.zip");
        assert_eq!(&outcome.files[0].body[..], b"PK");
        assert_eq!(outcome.files[1].file_name, "report.json");
    }

    #[tokio::test]
    async fn test_wait_budget_exceeded_does_not_cancel() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/acme/api/v4/export/job-1/status"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "job-1", "status": "running"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let poller = JobPoller::new(client_for(&server), JobRoute::export());
        let job: Job = serde_json::from_value(serde_json::json!({"id": "job-1"})).unwrap();
        let options = fast_polls().with_max_wait(Duration::from_millis(30));

        let err = poller.await_completion(&job, &options).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_wait_budget_bounds_the_last_sleep() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/acme/api/v4/export/job-1/status"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "job-1", "status": "running"})),
            )
            .mount(&server)
            .await;

        let poller = JobPoller::new(client_for(&server), JobRoute::export());
        let job: Job = serde_json::from_value(serde_json::json!({"id": "job-1"})).unwrap();
        let options = PollOptions::default()
            .with_poll_interval(Duration::from_secs(3))
            .with_max_wait(Duration::from_millis(100));

        let started = Instant::now();
        let err = poller.await_completion(&job, &options).await.unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_wait_budget_bounds_a_slow_poll() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/acme/api/v4/export/job-1/status"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "job-1", "status": "running"}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let poller = JobPoller::new(client_for(&server), JobRoute::export());
        let job: Job = serde_json::from_value(serde_json::json!({"id": "job-1"})).unwrap();
        let options = fast_polls().with_max_wait(Duration::from_millis(100));

        let started = Instant::now();
        let err = poller.await_completion(&job, &options).await.unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_status_without_id_keeps_requested_id() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/acme/api/v4/export/job-7/status"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "succeeded"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let poller = JobPoller::new(client_for(&server), JobRoute::export());
        let job = poller.status("job-7").await.unwrap();

        assert_eq!(job.id, "job-7");
        assert_eq!(job.status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_submit_without_job_id_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/acme/api/v4/export"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "created"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let poller = JobPoller::new(client_for(&server), JobRoute::export());
        let err = poller
            .submit(JobRequest::json(&serde_json::json!({})).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err.kind, ErrorKind::Job(_)));
    }

    #[tokio::test]
    async fn test_client_timeout_while_polling_is_a_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/acme/api/v4/export/job-1/status"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "job-1", "status": "running"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let config = Config::builder()
            .with_base_url(format!("{}/acme", server.uri()))
            .with_api_key("key-abcd")
            .with_timeout_ms(50)
            .build()
            .unwrap();
        let poller = JobPoller::new(SparkClient::new(config).unwrap(), JobRoute::export());
        let job: Job = serde_json::from_value(serde_json::json!({"id": "job-1"})).unwrap();

        let err = poller.await_completion(&job, &fast_polls()).await.unwrap_err();

        assert!(matches!(err.kind, ErrorKind::Client(_)));
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_failed_job_is_an_error() {
        let server = MockServer::start().await;
        mount_submit(&server, "import").await;

        Mock::given(method("GET"))
            .and(path("/acme/api/v4/import/job-1/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"id": "job-1", "status": "failed", "errors": ["bad package"]}),
            ))
            .mount(&server)
            .await;

        let poller = JobPoller::new(client_for(&server), JobRoute::import());
        let err = poller
            .run(JobRequest::json(&serde_json::json!({})).unwrap(), &fast_polls())
            .await
            .unwrap_err();

        assert!(matches!(
            err.kind,
            ErrorKind::JobFailed { status: JobStatus::Failed, .. }
        ));
    }

    #[tokio::test]
    async fn test_not_found_poll_aborts_immediately() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/acme/api/v4/export/missing/status"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({"message": "no such job"})))
            .expect(1)
            .mount(&server)
            .await;

        let poller = JobPoller::new(client_for(&server), JobRoute::export());
        let job: Job = serde_json::from_value(serde_json::json!({"id": "missing"})).unwrap();

        let err = poller.await_completion(&job, &fast_polls()).await.unwrap_err();
        let client_err = err.client_error().unwrap();
        assert!(matches!(client_err.kind, ClientErrorKind::Http { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_transient_poll_failure_is_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/acme/api/v4/export/job-1/status"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/acme/api/v4/export/job-1/status"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "job-1", "status": "succeeded"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let poller = JobPoller::new(client_for(&server), JobRoute::export());
        let job: Job = serde_json::from_value(serde_json::json!({"id": "job-1"})).unwrap();

        let done = poller.await_completion(&job, &fast_polls()).await.unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_cancel_sends_patch() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/acme/api/v4/migration/job-1"))
            .and(body_json(serde_json::json!({"status": "cancelled"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let job: Job = serde_json::from_value(serde_json::json!({"id": "job-1"})).unwrap();

        JobPoller::new(client.clone(), JobRoute::migration())
            .cancel(&job)
            .await
            .unwrap();

        let route = JobRoute::custom("batch", UriOptions::default()).without_cancel();
        let err = JobPoller::new(client, route).cancel(&job).await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Job(_)));
    }
}
