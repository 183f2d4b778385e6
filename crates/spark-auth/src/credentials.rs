//! Static credentials and secret masking.
//!
//! All credential types implement custom Debug and Display to redact
//! sensitive data.

use crate::error::{Error, ErrorKind, Result};

/// Number of trailing characters left visible by [`mask`].
const VISIBLE_SUFFIX: usize = 4;

/// Redact all but the last four characters of a secret.
///
/// Secrets of four characters or fewer are fully redacted.
pub fn mask(secret: &str) -> String {
    let len = secret.chars().count();
    if len <= VISIBLE_SUFFIX {
        return "*".repeat(len.max(1));
    }

    let suffix: String = secret.chars().skip(len - VISIBLE_SUFFIX).collect();
    format!("{}{}", "*".repeat(len - VISIBLE_SUFFIX), suffix)
}

/// A static API key sent with every request.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Create a new API key. Blank keys are rejected.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(Error::new(ErrorKind::InvalidCredentials(
                "API key must not be empty".to_string(),
            )));
        }
        Ok(Self(key))
    }

    /// The raw key, for building the request header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ApiKey").field(&mask(&self.0)).finish()
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&mask(&self.0))
    }
}

/// A static bearer token. Never refreshed.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Create a new bearer token. A leading `Bearer ` prefix is stripped.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        let token = token
            .strip_prefix("Bearer ")
            .map(str::to_string)
            .unwrap_or(token);

        if token.trim().is_empty() {
            return Err(Error::new(ErrorKind::InvalidCredentials(
                "Bearer token must not be empty".to_string(),
            )));
        }
        Ok(Self(token))
    }

    /// The raw token, for building the request header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BearerToken").field(&mask(&self.0)).finish()
    }
}

impl std::fmt::Display for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&mask(&self.0))
    }
}
