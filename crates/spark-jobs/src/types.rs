//! Types for long-running jobs and chunked batches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use spark_sdk_client::{Downloadable, Part, SparkClient, UriOptions};

/// Default polling interval for job status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default maximum wait time for job completion.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(3600); // 1 hour

/// Default number of records per batch chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

// ============================================================================
// Jobs
// ============================================================================

/// Job lifecycle: `pending -> running -> succeeded | failed | cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum JobStatus {
    /// Accepted, not yet started
    #[default]
    Pending,
    /// Being processed
    Running,
    /// Completed successfully
    Succeeded,
    /// Completed with an error
    Failed,
    /// Cancelled before completion
    Cancelled,
}

impl JobStatus {
    /// Check if job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Check if job completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Succeeded)
    }
}

impl TryFrom<String> for JobStatus {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        let status = match normalized.as_str() {
            "pending" | "created" | "queued" | "submitted" => JobStatus::Pending,
            "running" | "in_progress" | "processing" => JobStatus::Running,
            "succeeded" | "success" | "completed" | "closed" => JobStatus::Succeeded,
            "failed" | "error" => JobStatus::Failed,
            "cancelled" | "canceled" | "aborted" => JobStatus::Cancelled,
            _ => return Err(format!("unknown job status '{}'", value)),
        };
        Ok(status)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// A downloadable result of a finished job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawLocation")]
pub struct ResultLocation {
    /// Absolute URL, or a path relative to the platform host.
    pub url: String,
    /// File name announced by the platform.
    pub file_name: Option<String>,
}

/// Locations arrive either as bare URLs or as objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawLocation {
    Url(String),
    Object {
        #[serde(alias = "file")]
        url: String,
        #[serde(default, alias = "fileName", alias = "name")]
        file_name: Option<String>,
    },
}

impl From<RawLocation> for ResultLocation {
    fn from(raw: RawLocation) -> Self {
        match raw {
            RawLocation::Url(url) => ResultLocation {
                url,
                file_name: None,
            },
            RawLocation::Object { url, file_name } => ResultLocation { url, file_name },
        }
    }
}

/// A server-tracked long-running operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(default, alias = "job_id", alias = "jobId")]
    pub id: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default, alias = "result_locations", alias = "outputs")]
    pub result_locations: Vec<ResultLocation>,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
}

/// Endpoints of one kind of job.
///
/// Submit: `POST {endpoint}`; status: `GET {endpoint}/{id}/status`;
/// cancel: `PATCH {endpoint}/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRoute {
    endpoint: String,
    options: UriOptions,
    cancellable: bool,
}

impl JobRoute {
    /// Folder/service export.
    pub fn export() -> Self {
        Self::custom("export", UriOptions::versioned("v4"))
    }

    /// Folder/service import.
    pub fn import() -> Self {
        Self::custom("import", UriOptions::versioned("v4"))
    }

    /// Cross-tenant migration.
    pub fn migration() -> Self {
        Self::custom("migration", UriOptions::versioned("v4"))
    }

    /// Any other job endpoint.
    pub fn custom(endpoint: impl Into<String>, options: UriOptions) -> Self {
        Self {
            endpoint: endpoint.into().trim_matches('/').to_string(),
            options,
            cancellable: true,
        }
    }

    /// Mark the route as having no cancel endpoint.
    pub fn without_cancel(mut self) -> Self {
        self.cancellable = false;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_cancellable(&self) -> bool {
        self.cancellable
    }

    pub(crate) fn submit_url(&self, client: &SparkClient) -> String {
        client.uri(&self.endpoint, &self.options)
    }

    pub(crate) fn job_url(&self, client: &SparkClient, job_id: &str) -> String {
        client.uri(&format!("{}/{}", self.endpoint, job_id), &self.options)
    }

    pub(crate) fn status_url(&self, client: &SparkClient, job_id: &str) -> String {
        client.uri(&format!("{}/{}/status", self.endpoint, job_id), &self.options)
    }
}

/// Payload that starts a job.
#[derive(Debug, Clone)]
pub enum JobRequest {
    Json(serde_json::Value),
    Multipart(Vec<Part>),
}

impl JobRequest {
    /// JSON request body.
    pub fn json<T: Serialize>(body: &T) -> crate::Result<Self> {
        Ok(JobRequest::Json(serde_json::to_value(body)?))
    }

    /// Multipart request body, e.g. for uploads of exported packages.
    pub fn multipart(parts: Vec<Part>) -> Self {
        JobRequest::Multipart(parts)
    }
}

/// Polling schedule for [`JobPoller::await_completion`](crate::JobPoller::await_completion).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub poll_interval: Duration,
    /// Total time budget across all polls.
    pub max_wait: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

impl PollOptions {
    /// Set the polling interval for job status checks.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the maximum time to wait for job completion.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }
}

/// A finished job and its downloaded results.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job: Job,
    pub files: Vec<Downloadable>,
}

// ============================================================================
// Batches
// ============================================================================

/// How chunks are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dispatch {
    /// Chunk N+1 starts only after chunk N resolves.
    #[default]
    Sequential,
    /// Up to `concurrency` chunks in flight.
    Parallel { concurrency: usize },
}

/// Options for [`BatchRunner::run`](crate::BatchRunner::run).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub chunk_size: usize,
    pub dispatch: Dispatch,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            dispatch: Dispatch::Sequential,
        }
    }
}

impl BatchOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn sequential(mut self) -> Self {
        self.dispatch = Dispatch::Sequential;
        self
    }

    pub fn parallel(mut self, concurrency: usize) -> Self {
        self.dispatch = Dispatch::Parallel { concurrency };
        self
    }
}

/// A bounded slice of the submitted records.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: usize,
    /// Position of the first record in the full record set.
    pub offset: usize,
    pub records: Vec<serde_json::Value>,
}

/// What happened to one chunk.
#[derive(Debug)]
pub enum ChunkOutcome {
    Succeeded {
        outputs: Vec<serde_json::Value>,
        errors: Vec<serde_json::Value>,
    },
    Failed(spark_sdk_client::Error),
}

/// Result of one chunk, detached from its records.
#[derive(Debug)]
pub struct ChunkResult {
    pub index: usize,
    pub offset: usize,
    pub size: usize,
    pub outcome: ChunkOutcome,
}

impl ChunkResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ChunkOutcome::Succeeded { .. })
    }

    /// Outputs of a successful chunk; empty on failure.
    pub fn outputs(&self) -> &[serde_json::Value] {
        match &self.outcome {
            ChunkOutcome::Succeeded { outputs, .. } => outputs,
            ChunkOutcome::Failed(_) => &[],
        }
    }

    /// The error of a failed chunk.
    pub fn error(&self) -> Option<&spark_sdk_client::Error> {
        match &self.outcome {
            ChunkOutcome::Failed(err) => Some(err),
            ChunkOutcome::Succeeded { .. } => None,
        }
    }
}

/// Aggregate of a batch run, ordered by chunk index.
#[derive(Debug)]
pub struct BatchResult {
    pub chunks: Vec<ChunkResult>,
    pub total_submitted: usize,
    pub total_failed: usize,
}

impl BatchResult {
    pub fn succeeded_chunks(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_success()).count()
    }

    pub fn failed_chunks(&self) -> usize {
        self.chunks.len() - self.succeeded_chunks()
    }

    /// Returns true when every chunk succeeded.
    pub fn is_success(&self) -> bool {
        self.total_failed == 0
    }

    /// Outputs of all successful chunks in record order.
    pub fn outputs(&self) -> Vec<&serde_json::Value> {
        self.chunks.iter().flat_map(|c| c.outputs()).collect()
    }
}
