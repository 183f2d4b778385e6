//! # spark-sdk
//!
//! Client library for executing and managing services on a hosted
//! calculation platform.
//!
//! ## Security
//!
//! - API keys, tokens and client secrets are masked in Debug and Display
//!   output, showing only their last four characters
//! - Tracing spans skip credential parameters
//! - Error messages redact bearer tokens and JWTs echoed by the server
//!
//! ## Crates
//!
//! - **spark-sdk-auth** - Authentication: open, API key, bearer token and
//!   OAuth2 client credentials with a single-flight token refresh
//! - **spark-sdk-client** - Base URL resolution, configuration, interceptors,
//!   the retrying request executor
//! - **spark-sdk-jobs** - Job polling (export, import, migration) and chunked
//!   batch submission
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spark_sdk::{Config, SparkClient, UriOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads SPARK_BASE_URL, SPARK_TENANT, SPARK_API_KEY, ...
//!     let client = SparkClient::new(Config::from_env()?)?;
//!
//!     let result: serde_json::Value = client
//!         .post_json(
//!             &client.uri("folders/demo/services/pricing/execute", &UriOptions::default()),
//!             &serde_json::json!({"inputs": {"amount": 100}}),
//!         )
//!         .await?;
//!
//!     println!("{}", result["outputs"]);
//!     Ok(())
//! }
//! ```

// Re-export all crates for convenient access
#[cfg(feature = "auth")]
pub use spark_sdk_auth as auth;
#[cfg(feature = "client")]
pub use spark_sdk_client as client;
#[cfg(feature = "jobs")]
pub use spark_sdk_jobs as jobs;

// Re-export commonly used types at the top level
#[cfg(feature = "auth")]
pub use spark_sdk_auth::{AuthStrategy, OAuth};
#[cfg(feature = "client")]
pub use spark_sdk_client::{
    BaseUrl, Config, ConfigOverrides, Interceptor, ServiceUri, SparkClient, UriOptions,
};
#[cfg(feature = "jobs")]
pub use spark_sdk_jobs::{BatchOptions, BatchRunner, JobPoller, JobRoute, PollOptions};
