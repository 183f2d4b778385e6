//! Outgoing request description, replayable across retries.

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use bytes::Bytes;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use serde::Serialize;

use crate::error::{Error, ErrorKind, Result};

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl RequestMethod {
    /// Convert to reqwest::Method.
    pub fn to_reqwest(&self) -> reqwest::Method {
        match self {
            RequestMethod::Get => reqwest::Method::GET,
            RequestMethod::Post => reqwest::Method::POST,
            RequestMethod::Patch => reqwest::Method::PATCH,
            RequestMethod::Put => reqwest::Method::PUT,
            RequestMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_reqwest().as_str())
    }
}

/// Compression applied to a serialized request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Gzip,
    Deflate,
}

impl ContentEncoding {
    /// Value for the `Content-Encoding` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEncoding::Gzip => "gzip",
            ContentEncoding::Deflate => "deflate",
        }
    }

    /// Compress `data`.
    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let compressed = match self {
            ContentEncoding::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data).and_then(|_| encoder.finish())
            }
            ContentEncoding::Deflate => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data).and_then(|_| encoder.finish())
            }
        };

        compressed.map_err(|e| {
            Error::with_source(
                ErrorKind::Other(format!("{} compression failed", self.as_str())),
                e,
            )
        })
    }
}

/// One field of a multipart upload.
///
/// The payload is held as [`Bytes`] so the form can be rebuilt for every
/// retry attempt.
#[derive(Debug, Clone)]
pub struct Part {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

impl Part {
    /// A plain text field.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_name: None,
            content_type: None,
            data: Bytes::from(value.into()),
        }
    }

    /// A file field.
    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            file_name: Some(file_name.into()),
            content_type: Some("application/octet-stream".to_string()),
            data: data.into(),
        }
    }

    /// A JSON field.
    pub fn json<T: Serialize>(name: impl Into<String>, value: &T) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            file_name: None,
            content_type: Some("application/json".to_string()),
            data: Bytes::from(serde_json::to_vec(value)?),
        })
    }

    /// Override the part's content type.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name, for file fields.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Payload.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub(crate) fn to_reqwest(&self) -> Result<reqwest::multipart::Part> {
        let mut part = reqwest::multipart::Part::bytes(self.data.to_vec());
        if let Some(ref file_name) = self.file_name {
            part = part.file_name(file_name.clone());
        }
        if let Some(ref content_type) = self.content_type {
            part = part.mime_str(content_type).map_err(|e| {
                Error::with_source(
                    ErrorKind::Validation(format!("invalid content type '{}'", content_type)),
                    e,
                )
            })?;
        }
        Ok(part)
    }
}

/// Request body content.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    Text(String),
    Bytes(Bytes),
    Form(HashMap<String, String>),
    Multipart(Vec<Part>),
}

/// Builder for an outgoing request.
///
/// Header names are stored lower-cased, so lookups and overrides are
/// case-insensitive.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    pub(crate) method: RequestMethod,
    pub(crate) url: String,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) query_params: Vec<(String, String)>,
    pub(crate) body: Option<RequestBody>,
    pub(crate) encoding: Option<ContentEncoding>,
    pub(crate) timeout: Option<Duration>,
}

impl RequestBuilder {
    /// Create a new request builder.
    pub fn new(method: RequestMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            query_params: Vec::new(),
            body: None,
            encoding: None,
            timeout: None,
        }
    }

    /// Request method.
    pub fn method(&self) -> RequestMethod {
        self.method
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Replace the target URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// All headers, keyed by lower-cased name.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Look up a header.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Set a header, replacing any previous value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Set a header only when the caller has not supplied one.
    pub(crate) fn default_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_insert_with(|| value.into());
        self
    }

    /// Remove a header.
    pub fn remove_header(mut self, name: &str) -> Self {
        self.headers.remove(&name.to_ascii_lowercase());
        self
    }

    /// Add a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((name.into(), value.into()));
        self
    }

    /// Query parameters in insertion order.
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query_params
    }

    /// Body, if any.
    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Set JSON body.
    pub fn json<T: Serialize>(self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)?;
        Ok(self.json_value(value))
    }

    /// Set raw JSON body.
    pub fn json_value(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self.header("Content-Type", "application/json")
    }

    /// Set text body.
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self.header("Content-Type", "text/plain")
    }

    /// Set bytes body.
    pub fn bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(RequestBody::Bytes(body.into()));
        self
    }

    /// Set form body.
    pub fn form(mut self, data: HashMap<String, String>) -> Self {
        self.body = Some(RequestBody::Form(data));
        self.header("Content-Type", "application/x-www-form-urlencoded")
    }

    /// Set a multipart body. The boundary content type is set at send time.
    pub fn multipart(mut self, parts: Vec<Part>) -> Self {
        self.body = Some(RequestBody::Multipart(parts));
        self.remove_header("Content-Type")
    }

    /// Compress the serialized body before sending.
    ///
    /// Ignored for multipart bodies.
    pub fn encoding(mut self, encoding: ContentEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Requested body compression, if any.
    pub fn content_encoding(&self) -> Option<ContentEncoding> {
        self.encoding
    }

    /// Override the configured per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_request_builder() {
        let req = RequestBuilder::new(RequestMethod::Get, "https://example.com/api")
            .header("X-Custom", "value")
            .query("page", "2");

        assert_eq!(req.method(), RequestMethod::Get);
        assert_eq!(req.url(), "https://example.com/api");
        assert_eq!(req.header_value("x-custom"), Some("value"));
        assert_eq!(req.header_value("X-CUSTOM"), Some("value"));
        assert_eq!(req.query_params().len(), 1);
    }

    #[test]
    fn test_header_overrides_are_case_insensitive() {
        let req = RequestBuilder::new(RequestMethod::Get, "https://example.com")
            .header("X-Request-Id", "first")
            .header("x-request-id", "second")
            .default_header("X-REQUEST-ID", "ignored");

        assert_eq!(req.headers().len(), 1);
        assert_eq!(req.header_value("x-request-id"), Some("second"));
    }

    #[test]
    fn test_json_body() {
        let data = serde_json::json!({"inputs": [{"a": 1}]});
        let req = RequestBuilder::new(RequestMethod::Post, "https://example.com")
            .json(&data)
            .unwrap();

        assert!(matches!(req.body(), Some(RequestBody::Json(_))));
        assert_eq!(req.header_value("content-type"), Some("application/json"));
    }

    #[test]
    fn test_multipart_drops_explicit_content_type() {
        let req = RequestBuilder::new(RequestMethod::Post, "https://example.com")
            .header("Content-Type", "application/json")
            .multipart(vec![
                Part::text("request_data", "{}"),
                Part::file("file", "model.xlsx", b"PK\x03\x04".to_vec()),
            ]);

        assert!(req.header_value("content-type").is_none());
        match req.body() {
            Some(RequestBody::Multipart(parts)) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[1].file_name(), Some("model.xlsx"));
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_gzip_encoding_decodes_back() {
        let payload = br#"{"inputs":[1,2,3]}"#;
        let compressed = ContentEncoding::Gzip.encode(payload).unwrap();

        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn test_deflate_encoding_decodes_back() {
        let payload = b"hello hello hello hello";
        let compressed = ContentEncoding::Deflate.encode(payload).unwrap();

        let mut decoder = flate2::read::ZlibDecoder::new(compressed.as_slice());
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn test_part_rejects_bad_content_type() {
        let part = Part::text("x", "y").content_type("not a mime type");
        assert!(part.to_reqwest().is_err());
    }
}
