//! # spark-sdk-jobs
//!
//! Long-running operations for the Spark SDK.
//!
//! ## Features
//!
//! - **Job polling** - submit export, import and migration jobs, poll them to
//!   a terminal state within a wait budget and download their results
//! - **Cancellation** - explicit remote cancel where the job route has one
//! - **Chunked batches** - split large record sets into bounded chunks,
//!   dispatched sequentially or with a concurrency cap, with per-chunk
//!   failure isolation
//!
//! ## Example - Export
//!
//! ```rust,ignore
//! use spark_sdk_client::SparkClient;
//! use spark_sdk_jobs::{JobPoller, JobRequest, JobRoute, PollOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), spark_sdk_jobs::Error> {
//!     let client = SparkClient::from_env()?;
//!     let poller = JobPoller::new(client, JobRoute::export());
//!
//!     let outcome = poller
//!         .run(
//!             JobRequest::json(&serde_json::json!({"inputs": {"folders": ["demo"]}}))?,
//!             &PollOptions::default(),
//!         )
//!         .await?;
//!
//!     println!("Downloaded {} files", outcome.files.len());
//!     Ok(())
//! }
//! ```

mod batch;
mod error;
mod poller;
mod types;

pub use batch::BatchRunner;
pub use error::{Error, ErrorKind, Result};
pub use poller::JobPoller;
pub use types::*;
