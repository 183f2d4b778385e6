//! Logger capability consumed by the request executor.
//!
//! The executor reports through it before each attempt is sent, on every
//! retry, on success after retries and on terminal failure. Formatting and
//! transport belong to the implementation.

/// Anything that can receive SDK log lines.
pub trait Logger: Send + Sync {
    /// General information.
    fn log(&self, message: &str);
    /// Diagnostic detail.
    fn debug(&self, message: &str);
    /// Recoverable problems.
    fn warn(&self, message: &str);
    /// Failures surfaced to the caller.
    fn error(&self, message: &str);
}

/// Forwards to `tracing` under the `spark_sdk` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, message: &str) {
        tracing::info!(target: "spark_sdk", "{}", message);
    }

    fn debug(&self, message: &str) {
        tracing::debug!(target: "spark_sdk", "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "spark_sdk", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "spark_sdk", "{}", message);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _message: &str) {}
    fn debug(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}
