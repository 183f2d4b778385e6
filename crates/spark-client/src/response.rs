//! HTTP response handling and error classification.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{Error, ErrorKind, Result};

/// A successful response together with the retry count of the call that
/// produced it.
#[derive(Debug)]
pub struct Response {
    inner: reqwest::Response,
    retries: u32,
}

impl Response {
    pub(crate) fn new(inner: reqwest::Response) -> Self {
        Self { inner, retries: 0 }
    }

    pub(crate) fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Get the HTTP status code.
    pub fn status(&self) -> u16 {
        self.inner.status().as_u16()
    }

    /// Returns true if the response status is successful (2xx).
    pub fn is_success(&self) -> bool {
        self.inner.status().is_success()
    }

    /// Number of retries performed before this response arrived.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Final URL of the response.
    pub fn url(&self) -> &str {
        self.inner.url().as_str()
    }

    /// Get a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers().get(name)?.to_str().ok()
    }

    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Correlation id echoed by the platform.
    pub fn request_id(&self) -> Option<&str> {
        self.header("x-request-id")
    }

    /// Get the Retry-After header as a Duration.
    pub fn retry_after(&self) -> Option<Duration> {
        parse_retry_after(self.header("retry-after")?)
    }

    /// Get the response body as text.
    pub async fn text(self) -> Result<String> {
        self.inner.text().await.map_err(Into::into)
    }

    /// Get the response body as bytes.
    pub async fn bytes(self) -> Result<Bytes> {
        self.inner.bytes().await.map_err(Into::into)
    }

    /// Deserialize the response body as JSON.
    ///
    /// An empty body decodes as JSON `null`.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let body = self.inner.bytes().await?;
        if body.is_empty() {
            return serde_json::from_value(serde_json::Value::Null).map_err(Into::into);
        }
        serde_json::from_slice(&body).map_err(Into::into)
    }

    /// Stream the body in chunks, for large downloads.
    pub fn bytes_stream(self) -> impl Stream<Item = Result<Bytes>> {
        self.inner.bytes_stream().map(|chunk| chunk.map_err(Error::from))
    }

    /// Get access to the inner reqwest::Response.
    pub fn into_inner(self) -> reqwest::Response {
        self.inner
    }

    /// Buffer the body into a [`Downloadable`].
    pub async fn into_downloadable(self) -> Result<Downloadable> {
        let file_name = self
            .header("content-disposition")
            .and_then(file_name_from_disposition)
            .or_else(|| file_name_from_url(self.inner.url()))
            .unwrap_or_else(|| "download".to_string());
        let content_type = self.content_type().map(str::to_string);
        let body = self.bytes().await?;

        Ok(Downloadable {
            file_name,
            content_type,
            body,
        })
    }
}

/// A fully buffered download. The caller owns the payload.
#[derive(Debug, Clone)]
pub struct Downloadable {
    pub file_name: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl Downloadable {
    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Returns true for an empty payload.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Extract the file name from a Content-Disposition header, preferring the
/// RFC 5987 `filename*` form.
fn file_name_from_disposition(header: &str) -> Option<String> {
    let mut plain = None;

    for param in header.split(';').map(str::trim) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        if value.is_empty() {
            continue;
        }

        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = value.rsplit("''").next().unwrap_or(value);
                if let Ok(decoded) = urlencoding::decode(encoded) {
                    return Some(decoded.into_owned());
                }
            }
            "filename" => plain = Some(value.to_string()),
            _ => {}
        }
    }

    plain
}

fn file_name_from_url(url: &url::Url) -> Option<String> {
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        })
}

/// Classify a non-success response.
pub(crate) fn parse_error_response(
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
) -> Error {
    let payload = serde_json::from_str::<serde_json::Value>(body).ok();
    if status == 429 {
        return Error::new(ErrorKind::RateLimited {
            retry_after,
            body: payload,
        });
    }

    let message = payload
        .as_ref()
        .and_then(error_message_from_payload)
        .unwrap_or_else(|| body.trim().to_string());
    let message = if message.is_empty() {
        reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown status")
            .to_string()
    } else {
        sanitize_error_message(&message)
    };

    Error::new(ErrorKind::Http {
        status,
        message,
        body: payload,
    })
}

/// Pull a human-readable message out of the usual error payload shapes.
fn error_message_from_payload(payload: &serde_json::Value) -> Option<String> {
    let from_object = |value: &serde_json::Value| {
        ["message", "error_description", "error"]
            .iter()
            .find_map(|key| value.get(key).and_then(|v| v.as_str()))
            .map(str::to_string)
    };

    from_object(payload)
        .or_else(|| {
            payload
                .get("errors")
                .and_then(|errors| errors.get(0))
                .and_then(from_object)
        })
        .or_else(|| payload.get(0).and_then(from_object))
}

/// Sanitize an error message to prevent exposing sensitive data.
///
/// Bearer tokens, JWTs and `access_token` values are redacted and long
/// messages are truncated.
pub(crate) fn sanitize_error_message(message: &str) -> String {
    const MAX_LENGTH: usize = 500;

    let patterns = [
        (r"(?i)bearer\s+[A-Za-z0-9\-._~+/]+=*", "Bearer [REDACTED]"),
        (r"eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*", "[REDACTED_TOKEN]"),
        (
            r#""access_token"\s*:\s*"[^"]*""#,
            r#""access_token":"[REDACTED]""#,
        ),
    ];

    let mut sanitized = message.to_string();
    for (pattern, replacement) in patterns {
        if let Ok(re) = regex_lite::Regex::new(pattern) {
            sanitized = re.replace_all(&sanitized, replacement).into_owned();
        }
    }

    if sanitized.len() > MAX_LENGTH {
        let mut end = MAX_LENGTH;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized.truncate(end);
        sanitized.push_str("...[truncated]");
    }

    sanitized
}
