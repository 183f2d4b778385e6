//! Error types for spark-client.

use std::time::Duration;

/// Result type alias for spark-client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for spark-client operations.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional source error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Create a new error with the given kind and source.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns true if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.kind, ErrorKind::RateLimited { .. })
    }

    /// Returns true if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self.kind, ErrorKind::Authentication(_))
    }

    /// Returns true for invalid settings or malformed caller input.
    pub fn is_configuration(&self) -> bool {
        matches!(self.kind, ErrorKind::Config(_) | ErrorKind::Validation(_))
    }

    /// The HTTP status behind this error, if one was received.
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            ErrorKind::Http { status, .. } => Some(*status),
            ErrorKind::RateLimited { .. } => Some(429),
            ErrorKind::RetriesExhausted { last_status, .. } => *last_status,
            _ => None,
        }
    }

    /// The decoded error payload returned by the server, if any.
    pub fn body(&self) -> Option<&serde_json::Value> {
        match &self.kind {
            ErrorKind::Http { body, .. } | ErrorKind::RateLimited { body, .. } => body.as_ref(),
            ErrorKind::RetriesExhausted { .. } => self
                .source
                .as_ref()
                .and_then(|source| source.downcast_ref::<Error>())
                .and_then(Error::body),
            _ => None,
        }
    }

    /// Returns the retry-after duration if this is a rate limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match &self.kind {
            ErrorKind::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// The kind of error that occurred.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Invalid or missing settings. Never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed caller input, such as a non-absolute base URL.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Credential exchange failed.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Transport-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status.
    #[error("HTTP error: {status} {message}")]
    Http {
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    /// Rate limit exceeded (HTTP 429).
    #[error("Rate limited{}", retry_after.map(|d| format!(", retry after {:?}", d)).unwrap_or_default())]
    RateLimited {
        retry_after: Option<Duration>,
        body: Option<serde_json::Value>,
    },

    /// An attempt or a polling budget ran out of time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// An interceptor aborted the call.
    #[error("Interceptor error: {0}")]
    Interceptor(String),

    /// All retries exhausted; the last failure is the source.
    #[error("Request failed after {attempts} retries{}", last_status.map(|s| format!(" (last status {})", s)).unwrap_or_default())]
    RetriesExhausted {
        attempts: u32,
        last_status: Option<u16>,
    },

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ErrorKind {
    /// Returns true if this error kind is retryable.
    ///
    /// Only transport failures, 429 and 5xx qualify.
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::Network(_) => true,
            ErrorKind::RateLimited { .. } => true,
            ErrorKind::Http { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// Check if an HTTP status code is retryable.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout(err.to_string())
        } else if err.is_builder() {
            ErrorKind::Config(err.to_string())
        } else if err.is_decode() {
            ErrorKind::Json(err.to_string())
        } else if let Some(status) = err.status() {
            ErrorKind::Http {
                status: status.as_u16(),
                message: err.to_string(),
                body: None,
            }
        } else {
            ErrorKind::Network(err.to_string())
        };

        Error::with_source(kind, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}

impl From<serde_urlencoded::ser::Error> for Error {
    fn from(err: serde_urlencoded::ser::Error) -> Self {
        Error::with_source(ErrorKind::Validation(err.to_string()), err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(ErrorKind::Validation(format!("Invalid URL: {}", err)), err)
    }
}

impl From<spark_sdk_auth::Error> for Error {
    fn from(err: spark_sdk_auth::Error) -> Self {
        use spark_sdk_auth::ErrorKind as AuthErrorKind;

        let kind = match &err.kind {
            AuthErrorKind::Config(msg) => ErrorKind::Config(msg.clone()),
            AuthErrorKind::InvalidCredentials(msg) => ErrorKind::Config(msg.clone()),
            other => ErrorKind::Authentication(other.to_string()),
        };
        Error::with_source(kind, err)
    }
}
