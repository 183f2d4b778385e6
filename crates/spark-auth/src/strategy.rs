//! The authentication strategy attached to every outgoing request.

use crate::credentials::{mask, ApiKey, BearerToken};
use crate::error::Result;
use crate::oauth::OAuth;

/// Header carrying a static API key.
pub const API_KEY_HEADER: &str = "x-synthetic-key";

/// Header carrying bearer and OAuth tokens.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Discriminant of an [`AuthStrategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    Open,
    ApiKey,
    Bearer,
    OAuth,
}

impl std::fmt::Display for AuthKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuthKind::Open => "open",
            AuthKind::ApiKey => "apiKey",
            AuthKind::Bearer => "bearer",
            AuthKind::OAuth => "oauth",
        };
        f.write_str(name)
    }
}

/// A resolved authentication header.
///
/// The value is masked in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHeader {
    pub name: &'static str,
    pub value: String,
}

impl std::fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHeader")
            .field("name", &self.name)
            .field("value", &mask(&self.value))
            .finish()
    }
}

/// How requests authenticate against the platform.
///
/// Cloning is cheap; clones of an OAuth strategy share one token cache.
#[derive(Debug, Clone)]
pub enum AuthStrategy {
    /// No credentials; only public endpoints are reachable.
    Open,
    /// Static API key.
    ApiKey(ApiKey),
    /// Static bearer token.
    Bearer(BearerToken),
    /// OAuth2 client credentials with a cached, refreshed token.
    OAuth(OAuth),
}

impl AuthStrategy {
    /// Build an API key strategy. The literal key `"open"` selects [`AuthStrategy::Open`].
    pub fn api_key(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key == "open" {
            return Ok(AuthStrategy::Open);
        }
        Ok(AuthStrategy::ApiKey(ApiKey::new(key)?))
    }

    /// Build a static bearer token strategy.
    pub fn bearer(token: impl Into<String>) -> Result<Self> {
        Ok(AuthStrategy::Bearer(BearerToken::new(token)?))
    }

    /// Build an OAuth client-credentials strategy.
    pub fn oauth(oauth: OAuth) -> Self {
        AuthStrategy::OAuth(oauth)
    }

    /// Which variant this is.
    pub fn kind(&self) -> AuthKind {
        match self {
            AuthStrategy::Open => AuthKind::Open,
            AuthStrategy::ApiKey(_) => AuthKind::ApiKey,
            AuthStrategy::Bearer(_) => AuthKind::Bearer,
            AuthStrategy::OAuth(_) => AuthKind::OAuth,
        }
    }

    /// Returns true for the open strategy.
    pub fn is_open(&self) -> bool {
        matches!(self, AuthStrategy::Open)
    }

    /// Resolve the header to attach to a request.
    ///
    /// Static strategies never block. The OAuth strategy may perform a token
    /// exchange; see [`OAuth::access_token`].
    pub async fn resolve_header(&self) -> Result<Option<AuthHeader>> {
        let header = match self {
            AuthStrategy::Open => None,
            AuthStrategy::ApiKey(key) => Some(AuthHeader {
                name: API_KEY_HEADER,
                value: key.expose().to_string(),
            }),
            AuthStrategy::Bearer(token) => Some(AuthHeader {
                name: AUTHORIZATION_HEADER,
                value: format!("Bearer {}", token.expose()),
            }),
            AuthStrategy::OAuth(oauth) => Some(AuthHeader {
                name: AUTHORIZATION_HEADER,
                value: format!("Bearer {}", oauth.access_token().await?),
            }),
        };
        Ok(header)
    }
}

impl std::fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthStrategy::Open => f.write_str("open"),
            AuthStrategy::ApiKey(key) => write!(f, "apiKey({})", key),
            AuthStrategy::Bearer(token) => write!(f, "bearer({})", token),
            AuthStrategy::OAuth(oauth) => write!(
                f,
                "oauth(client_id={}, client_secret={})",
                oauth.client_id(),
                oauth.masked_secret()
            ),
        }
    }
}
