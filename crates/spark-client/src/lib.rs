//! # spark-sdk-client
//!
//! Core HTTP client infrastructure for the Spark SDK.
//!
//! This crate provides:
//! - Base URL and endpoint resolution, including tenant inference
//! - Immutable configuration with a builder, `SPARK_*` environment loading
//!   and derivation via `copy_with`
//! - An interceptor pipeline around every request
//! - Retry with constant, linear or exponential backoff and `Retry-After`
//! - gzip/deflate request bodies and multipart uploads
//! - Error classification with sanitized messages
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                        │
//! │  (spark-jobs, resource modules)                             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SparkClient                            │
//! │  - Resolves endpoints against the BaseUrl                   │
//! │  - Typed JSON helpers, uploads and downloads                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SparkHttpClient                          │
//! │  - Default + auth headers, interceptors                     │
//! │  - Body encoding, retry, error classification               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use spark_sdk_client::{Config, SparkClient, UriOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), spark_sdk_client::Error> {
//!     let config = Config::builder()
//!         .with_base_url("https://excel.uat.us.coherent.global/my-tenant")
//!         .with_api_key(std::env::var("SPARK_API_KEY").unwrap_or_default())
//!         .with_max_retries(3)
//!         .build()?;
//!     let client = SparkClient::new(config)?;
//!
//!     let result: serde_json::Value = client
//!         .post_json(
//!             &client.uri("folders/demo/services/pricing/execute", &UriOptions::default()),
//!             &serde_json::json!({"inputs": {"amount": 100}}),
//!         )
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

mod base_url;
mod client;
mod config;
mod error;
mod interceptor;
mod logger;
mod request;
mod response;
mod retry;
mod spark_client;

pub use base_url::{BaseUrl, ServiceUri, UriOptions, DEFAULT_API_VERSION, DEFAULT_DOMAIN, DEFAULT_ENV};
pub use client::{SparkHttpClient, REQUEST_ID_HEADER, TENANT_HEADER};
pub use config::{env, CompressionConfig, Config, ConfigBuilder, ConfigOverrides, DEFAULT_TIMEOUT};
pub use error::{Error, ErrorKind, Result};
pub use interceptor::{Interceptor, Interceptors};
pub use logger::{Logger, NoopLogger, TracingLogger};
pub use request::{ContentEncoding, Part, RequestBody, RequestBuilder, RequestMethod};
pub use response::{Downloadable, Response};
pub use retry::{BackoffStrategy, RetryConfig, RetryPolicy};
pub use spark_client::SparkClient;

/// User-Agent string for the client
pub const USER_AGENT: &str = concat!("spark-sdk/", env!("CARGO_PKG_VERSION"));
