//! Request executor: default headers, auth, interceptors, compression and
//! retry.

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, ErrorKind, Result};
use crate::request::{ContentEncoding, RequestBody, RequestBuilder, RequestMethod};
use crate::response::{parse_error_response, Response};
use crate::retry::RetryPolicy;

/// Header carrying the correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Header carrying the tenant name.
pub const TENANT_HEADER: &str = "x-tenant-name";

/// Executes requests against the platform with the settings of one
/// [`Config`].
///
/// Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct SparkHttpClient {
    inner: reqwest::Client,
    config: Config,
}

impl SparkHttpClient {
    /// Create a new executor.
    pub fn new(config: Config) -> Result<Self> {
        let accept_compressed = config.compression().accept_compressed;
        let inner = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent())
            .gzip(accept_compressed)
            .deflate(accept_compressed)
            .build()
            .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))?;

        Ok(Self { inner, config })
    }

    /// Get the client configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create a GET request builder.
    pub fn get(&self, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(RequestMethod::Get, url)
    }

    /// Create a POST request builder.
    pub fn post(&self, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(RequestMethod::Post, url)
    }

    /// Create a PATCH request builder.
    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(RequestMethod::Patch, url)
    }

    /// Create a PUT request builder.
    pub fn put(&self, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(RequestMethod::Put, url)
    }

    /// Create a DELETE request builder.
    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(RequestMethod::Delete, url)
    }

    /// Execute a request.
    ///
    /// Default and auth headers are attached first, then `before_request`
    /// hooks run, then the request is sent and retried on transient
    /// failures. `after_response` hooks see the final outcome once.
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let request = self.prepare(request).await?;
        let request = self.config.interceptors().before_request(request)?;
        let outcome = self.send_with_retry(&request).await;
        self.config.interceptors().after_response(outcome)
    }

    /// Execute a request and deserialize the JSON response.
    pub async fn execute_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T> {
        self.execute(request).await?.json().await
    }

    /// Attach default headers and the auth header.
    ///
    /// Caller headers win over defaults; the auth header always wins over
    /// caller headers.
    async fn prepare(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let mut request = request
            .default_header("user-agent", self.config.user_agent())
            .default_header(REQUEST_ID_HEADER, Uuid::new_v4().to_string())
            .default_header(TENANT_HEADER, self.config.base_url().tenant());

        if let Some(auth) = self.config.auth().resolve_header().await? {
            request = request.header(auth.name, auth.value);
        }

        Ok(request)
    }

    async fn send_with_retry(&self, request: &RequestBuilder) -> Result<Response> {
        let logger = self.config.logger();
        let mut policy = RetryPolicy::new(self.config.retry().clone());

        loop {
            logger.debug(&format!(
                "{} {} (attempt {})",
                request.method,
                request.url,
                policy.attempt() + 1
            ));

            let err = match self.execute_once(request).await {
                Ok(response) => {
                    if policy.attempt() > 0 {
                        logger.log(&format!(
                            "{} {} succeeded after {} retries",
                            request.method,
                            request.url,
                            policy.attempt()
                        ));
                    }
                    return Ok(response.with_retries(policy.attempt()));
                }
                Err(err) => err,
            };

            if err.is_retryable() {
                if let Some(delay) = policy.next_delay(err.retry_after()) {
                    logger.warn(&format!(
                        "{} {} failed: {}; attempt {} of {} in {:?}",
                        request.method,
                        request.url,
                        err,
                        policy.attempt() + 1,
                        self.config.max_retries().max(1),
                        delay
                    ));
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }

            let attempts = policy.attempt();
            let err = if attempts > 0 {
                let last_status = err.status();
                Error::with_source(
                    ErrorKind::RetriesExhausted {
                        attempts,
                        last_status,
                    },
                    err,
                )
            } else {
                err
            };

            logger.error(&format!("{} {} failed: {}", request.method, request.url, err));
            return Err(err);
        }
    }

    /// Execute a single request without retry logic.
    async fn execute_once(&self, request: &RequestBuilder) -> Result<Response> {
        let mut req = self
            .inner
            .request(request.method.to_reqwest(), &request.url);

        let is_multipart = matches!(request.body, Some(RequestBody::Multipart(_)));
        for (name, value) in &request.headers {
            // reqwest sets the boundary content type for multipart bodies
            if is_multipart && name == "content-type" {
                continue;
            }
            req = req.header(name.as_str(), value.as_str());
        }

        if !request.query_params.is_empty() {
            req = req.query(&request.query_params);
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        if let Some(ref body) = request.body {
            req = match body {
                RequestBody::Multipart(parts) => {
                    let mut form = reqwest::multipart::Form::new();
                    for part in parts {
                        form = form.part(part.name().to_string(), part.to_reqwest()?);
                    }
                    req.multipart(form)
                }
                other => {
                    let payload = serialize_body(other)?;
                    match self.encoding_for(request, payload.len()) {
                        Some(encoding) => req
                            .header(reqwest::header::CONTENT_ENCODING, encoding.as_str())
                            .body(encoding.encode(&payload)?),
                        None => req.body(payload),
                    }
                }
            };
        }

        let response = req.send().await?;
        let status = response.status().as_u16();
        let content_length = response.content_length();

        if response.status().is_success() {
            debug!(status, content_length, "Response received");
            return Ok(Response::new(response));
        }

        debug!(status, content_length, "Non-success response");
        let response = Response::new(response);
        let retry_after = response.retry_after();
        let body = response.text().await.unwrap_or_default();
        Err(parse_error_response(status, &body, retry_after))
    }

    /// Request-chosen encoding, else gzip for large bodies when enabled.
    fn encoding_for(&self, request: &RequestBuilder, len: usize) -> Option<ContentEncoding> {
        let compression = self.config.compression();
        request.encoding.or_else(|| {
            (compression.compress_requests && len >= compression.min_size)
                .then_some(ContentEncoding::Gzip)
        })
    }
}

fn serialize_body(body: &RequestBody) -> Result<Vec<u8>> {
    let bytes = match body {
        RequestBody::Json(value) => serde_json::to_vec(value)?,
        RequestBody::Text(text) => text.clone().into_bytes(),
        RequestBody::Bytes(bytes) => bytes.to_vec(),
        RequestBody::Form(data) => serde_urlencoded::to_string(data)?.into_bytes(),
        RequestBody::Multipart(_) => {
            return Err(Error::new(ErrorKind::Other(
                "multipart bodies are not serialized as a single payload".to_string(),
            )))
        }
    };
    Ok(bytes)
}
