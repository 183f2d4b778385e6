//! Error types for spark-jobs.

use crate::types::JobStatus;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    pub kind: ErrorKind,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// Returns true when a wait budget or a single request ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout(_))
            || self.client_error().is_some_and(|err| {
                matches!(err.kind, spark_sdk_client::ErrorKind::Timeout(_))
            })
    }

    /// The underlying client error, if this error came from a request.
    pub fn client_error(&self) -> Option<&spark_sdk_client::Error> {
        self.source.as_ref()?.downcast_ref()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("Client error: {0}")]
    Client(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Job error: {0}")]
    Job(String),
    #[error("Job {id} ended as {status}")]
    JobFailed { id: String, status: JobStatus },
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("{0}")]
    Other(String),
}

impl From<spark_sdk_client::Error> for Error {
    fn from(err: spark_sdk_client::Error) -> Self {
        Error::with_source(ErrorKind::Client(err.to_string()), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Other(format!("JSON error: {}", err)), err)
    }
}
