//! OAuth 2.0 client-credentials flow with a shared token cache.
//!
//! The cache is shared by every clone of an [`OAuth`] value, so all clients
//! derived from one configuration reuse the same access token. Refreshing
//! happens while the cache lock is held: callers that observe a stale token
//! at the same time queue on the lock and pick up the token fetched by the
//! first one instead of starting their own exchange.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::credentials::mask;
use crate::error::{Error, ErrorKind, Result};

/// Tokens are refreshed this many seconds before their advertised expiry.
pub const DEFAULT_EXPIRY_SKEW_SECS: i64 = 60;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 300;

/// Longest lifetime honoured from `expires_in` (one year).
const MAX_TOKEN_LIFETIME_SECS: i64 = 365 * 24 * 3600;

/// Default timeout for one token exchange.
pub const DEFAULT_TOKEN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

/// A cached access token and the instant it stops being usable.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &mask(&self.secret))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    /// Create a token that expires at the given instant.
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    /// The raw token value.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// When the token expires.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true while `now < expires_at - skew`.
    pub fn is_fresh(&self, skew: Duration) -> bool {
        Utc::now() < self.expires_at - skew
    }
}

/// OAuth2 client-credentials strategy.
///
/// `client_secret` and cached tokens are masked in Debug output.
#[derive(Clone)]
pub struct OAuth {
    client_id: String,
    client_secret: String,
    token_url: Option<String>,
    skew: Duration,
    cache: Arc<Mutex<Option<AccessToken>>>,
    timeout: std::time::Duration,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for OAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth")
            .field("client_id", &self.client_id)
            .field("client_secret", &mask(&self.client_secret))
            .field("token_url", &self.token_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl OAuth {
    /// Create a client-credentials strategy.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: None,
            skew: Duration::seconds(DEFAULT_EXPIRY_SKEW_SECS),
            cache: Arc::new(Mutex::new(None)),
            timeout: DEFAULT_TOKEN_TIMEOUT,
            http_client: reqwest::Client::new(),
        }
    }

    /// Load client credentials from a JSON file of the form
    /// `{"clientId": "...", "clientSecret": "..."}`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let file: OAuthFile = serde_json::from_str(&contents)?;

        if file.client_id.trim().is_empty() || file.client_secret.trim().is_empty() {
            return Err(Error::new(ErrorKind::InvalidCredentials(
                "OAuth file must contain a non-empty clientId and clientSecret".to_string(),
            )));
        }

        Ok(Self::new(file.client_id, file.client_secret))
    }

    /// Set the token endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Bound each token exchange. The cache lock is held during an
    /// exchange, so this also bounds how long concurrent callers queue.
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// A copy with the same credentials pointed at another token endpoint.
    ///
    /// The copy starts with an empty cache of its own: a token issued by
    /// one realm is never presented to another.
    pub fn for_token_url(&self, url: impl Into<String>) -> Self {
        Self {
            token_url: Some(url.into()),
            cache: Arc::new(Mutex::new(None)),
            ..self.clone()
        }
    }

    /// Set how long before expiry a token is considered stale.
    pub fn with_expiry_skew(mut self, skew: Duration) -> Self {
        self.skew = skew;
        self
    }

    /// Seed the cache with a previously issued token.
    pub fn with_token(mut self, token: AccessToken) -> Self {
        self.cache = Arc::new(Mutex::new(Some(token)));
        self
    }

    /// The client id.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The client secret, masked.
    pub fn masked_secret(&self) -> String {
        mask(&self.client_secret)
    }

    /// Timeout applied to each token exchange.
    pub fn timeout(&self) -> std::time::Duration {
        self.timeout
    }

    /// The token endpoint, if set.
    pub fn token_url(&self) -> Option<&str> {
        self.token_url.as_deref()
    }

    /// A snapshot of the cached token, if any.
    pub async fn cached_token(&self) -> Option<AccessToken> {
        self.cache.lock().await.clone()
    }

    /// Drop the cached token so the next call performs a fresh exchange.
    pub async fn invalidate(&self) {
        self.cache.lock().await.take();
    }

    /// Return a usable access token, exchanging credentials when the cached
    /// one is absent or stale.
    ///
    /// At most one exchange is in flight per cache. A transient exchange
    /// failure is retried once before surfacing.
    #[instrument(skip(self), fields(client_id = %self.client_id))]
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cache.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(self.skew) {
                return Ok(token.secret.clone());
            }
            debug!(expires_at = %token.expires_at, "Cached access token is stale");
        }

        let token = match self.exchange().await {
            Ok(token) => token,
            Err(err) if err.is_transient() => {
                warn!(error = %err, "Token exchange failed, retrying once");
                self.exchange().await?
            }
            Err(err) => return Err(err),
        };

        let secret = token.secret.clone();
        *cached = Some(token);
        Ok(secret)
    }

    /// Perform one client-credentials exchange against the token endpoint.
    async fn exchange(&self) -> Result<AccessToken> {
        let token_url = self.token_url.as_deref().ok_or_else(|| {
            Error::new(ErrorKind::Config(
                "OAuth token URL is not configured".to_string(),
            ))
        })?;

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let body = serde_urlencoded::to_string(params)?;

        debug!(token_url, "Requesting access token");

        let response = self
            .http_client
            .post(token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .timeout(self.timeout)
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            if let Ok(error) = serde_json::from_str::<OAuthErrorResponse>(&text) {
                return Err(Error::new(ErrorKind::OAuth {
                    error: error.error,
                    description: error.error_description.unwrap_or_default(),
                }));
            }
            return Err(Error::new(ErrorKind::TokenEndpoint {
                status,
                message: format!("token request rejected ({} bytes of body)", text.len()),
            }));
        }

        let token: TokenResponse = response.json().await?;
        Ok(AccessToken::new(
            token.access_token,
            expiry_from(Utc::now(), token.expires_in),
        ))
    }
}

/// Expiry instant for a token issued at `now` with the advertised lifetime.
///
/// Lifetimes are capped at [`MAX_TOKEN_LIFETIME_SECS`] so arithmetic on the
/// result cannot overflow.
fn expiry_from(now: DateTime<Utc>, expires_in: Option<u64>) -> DateTime<Utc> {
    let secs = match expires_in {
        Some(secs) => i64::try_from(secs)
            .unwrap_or(i64::MAX)
            .min(MAX_TOKEN_LIFETIME_SECS),
        None => DEFAULT_TOKEN_LIFETIME_SECS,
    };
    Duration::try_seconds(secs)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or(now)
}

/// Token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// OAuth error response.
#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// On-disk OAuth credentials.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OAuthFile {
    client_id: String,
    client_secret: String,
}
