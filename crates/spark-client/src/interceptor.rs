//! Caller-registered hooks around every executed request.
//!
//! Both hook chains run in registration order. `before_request` sees the
//! request after default and auth headers are attached and may replace it or
//! abort the call. `after_response` runs once per call, after retries, with
//! either the final response or the final error.

use std::sync::Arc;

use crate::error::Result;
use crate::request::RequestBuilder;
use crate::response::Response;

/// A pair of optional hooks. Both default to pass-through.
pub trait Interceptor: Send + Sync {
    /// Observe or replace the outgoing request. Returning an error aborts
    /// the call before anything is sent.
    fn before_request(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(request)
    }

    /// Observe or transform the outcome of a call.
    fn after_response(&self, outcome: Result<Response>) -> Result<Response> {
        outcome
    }
}

/// Append-only, ordered list of interceptors.
///
/// Cloning shares the registered hooks; adding to a clone leaves the
/// original untouched.
#[derive(Clone, Default)]
pub struct Interceptors {
    hooks: Arc<Vec<Arc<dyn Interceptor>>>,
}

impl Interceptors {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook at the end of the pipeline.
    pub fn add(&mut self, hook: impl Interceptor + 'static) {
        self.add_shared(Arc::new(hook));
    }

    /// Register an already shared hook.
    pub fn add_shared(&mut self, hook: Arc<dyn Interceptor>) {
        Arc::make_mut(&mut self.hooks).push(hook);
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns true when no hook is registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub(crate) fn before_request(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        self.hooks
            .iter()
            .try_fold(request, |request, hook| hook.before_request(request))
    }

    pub(crate) fn after_response(&self, outcome: Result<Response>) -> Result<Response> {
        self.hooks
            .iter()
            .fold(outcome, |outcome, hook| hook.after_response(outcome))
    }
}

impl std::fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptors")
            .field("len", &self.hooks.len())
            .finish()
    }
}
