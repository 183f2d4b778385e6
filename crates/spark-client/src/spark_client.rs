//! High-level client bound to one [`Config`].
//!
//! Resource modules (folders, services, import/export jobs) build on
//! `SparkClient`: it resolves endpoints against the base URL and exposes
//! typed JSON helpers and downloads on top of the request executor.

use serde::{de::DeserializeOwned, Serialize};
use tracing::instrument;

use crate::base_url::{BaseUrl, ServiceUri, UriOptions};
use crate::client::SparkHttpClient;
use crate::config::{Config, ConfigOverrides};
use crate::error::Result;
use crate::request::{Part, RequestBuilder};
use crate::response::{Downloadable, Response};

/// High-level platform client.
///
/// Cheap to clone; clones share the connection pool, the interceptors and
/// the OAuth token cache.
///
/// # Example
///
/// ```rust,ignore
/// use spark_sdk_client::{Config, SparkClient, UriOptions};
///
/// let client = SparkClient::new(Config::from_env()?)?;
/// let folders: serde_json::Value = client
///     .get_json(&client.uri("product/folders", &UriOptions::default()))
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct SparkClient {
    http: SparkHttpClient,
}

impl SparkClient {
    /// Create a client from a validated configuration.
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            http: SparkHttpClient::new(config)?,
        })
    }

    /// Create a client from `SPARK_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env()?)
    }

    /// A new client whose configuration is derived from this one.
    pub fn with_overrides(&self, overrides: ConfigOverrides) -> Result<Self> {
        Self::new(self.config().copy_with(overrides)?)
    }

    pub fn config(&self) -> &Config {
        self.http.config()
    }

    pub fn base_url(&self) -> &BaseUrl {
        self.config().base_url()
    }

    /// The underlying executor.
    pub fn http(&self) -> &SparkHttpClient {
        &self.http
    }

    /// Absolute URI of a platform endpoint.
    pub fn uri(&self, endpoint: &str, options: &UriOptions) -> String {
        self.base_url().concat(endpoint, options)
    }

    /// Absolute URI of an endpoint below a service, e.g. `execute`.
    pub fn service_uri(&self, service: &ServiceUri, endpoint: &str, options: &UriOptions) -> String {
        let endpoint = endpoint.trim_matches('/');
        let path = if endpoint.is_empty() {
            service.to_path()
        } else {
            format!("{}/{}", service.to_path(), endpoint)
        };
        self.uri(&path, options)
    }

    /// Resolve a URL.
    ///
    /// Absolute URLs pass through. Paths starting with `/` are resolved
    /// against the host, other paths against the tenant.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url().value(), path)
        } else {
            format!("{}/{}", self.base_url().full(), path)
        }
    }

    /// Create a GET request builder.
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.http.get(self.url(url))
    }

    /// Create a POST request builder.
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.http.post(self.url(url))
    }

    /// Create a PATCH request builder.
    pub fn patch(&self, url: &str) -> RequestBuilder {
        self.http.patch(self.url(url))
    }

    /// Create a PUT request builder.
    pub fn put(&self, url: &str) -> RequestBuilder {
        self.http.put(self.url(url))
    }

    /// Create a DELETE request builder.
    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.http.delete(self.url(url))
    }

    /// Execute a request and return the raw response.
    pub async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        self.http.execute(request).await
    }

    /// GET request with JSON response deserialization.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.execute(self.get(url)).await?.json().await
    }

    /// POST request with JSON body and response.
    #[instrument(skip(self, body), fields(url = %url))]
    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.post(url).json(body)?;
        self.execute(request).await?.json().await
    }

    /// PUT request with JSON body and response.
    #[instrument(skip(self, body), fields(url = %url))]
    pub async fn put_json<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.put(url).json(body)?;
        self.execute(request).await?.json().await
    }

    /// PATCH request with JSON body; the response body is discarded.
    #[instrument(skip(self, body), fields(url = %url))]
    pub async fn patch_json<B: Serialize>(&self, url: &str, body: &B) -> Result<()> {
        let request = self.patch(url).json(body)?;
        self.execute(request).await?;
        Ok(())
    }

    /// DELETE request.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn delete_request(&self, url: &str) -> Result<()> {
        self.execute(self.delete(url)).await?;
        Ok(())
    }

    /// Multipart upload with JSON response.
    #[instrument(skip(self, parts), fields(url = %url, parts = parts.len()))]
    pub async fn upload<T: DeserializeOwned>(&self, url: &str, parts: Vec<Part>) -> Result<T> {
        let request = self.post(url).multipart(parts);
        self.execute(request).await?.json().await
    }

    /// Download a file into memory.
    ///
    /// The file name comes from `Content-Disposition`, else from the last
    /// URL path segment.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn download(&self, url: &str) -> Result<Downloadable> {
        self.execute(self.get(url)).await?.into_downloadable().await
    }
}
