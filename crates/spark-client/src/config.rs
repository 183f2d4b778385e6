//! Client configuration.
//!
//! A [`Config`] is immutable once built. Derive variants with
//! [`Config::copy_with`] or [`Config::with_interceptor`]; the receiver is
//! never touched.

use std::sync::Arc;
use std::time::Duration;

use spark_sdk_auth::{AuthStrategy, OAuth};

use crate::base_url::BaseUrl;
use crate::error::{Error, ErrorKind, Result};
use crate::interceptor::{Interceptor, Interceptors};
use crate::logger::{Logger, TracingLogger};
use crate::retry::RetryConfig;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Environment variables read by [`Config::from_env`].
pub mod env {
    pub const BASE_URL: &str = "SPARK_BASE_URL";
    pub const TENANT: &str = "SPARK_TENANT";
    pub const ENV: &str = "SPARK_ENV";
    pub const API_KEY: &str = "SPARK_API_KEY";
    pub const BEARER_TOKEN: &str = "SPARK_BEARER_TOKEN";
    pub const CLIENT_ID: &str = "SPARK_CLIENT_ID";
    pub const CLIENT_SECRET: &str = "SPARK_CLIENT_SECRET";
    pub const OAUTH_PATH: &str = "SPARK_OAUTH_PATH";
    pub const TIMEOUT_MS: &str = "SPARK_TIMEOUT_MS";
    pub const MAX_RETRIES: &str = "SPARK_MAX_RETRIES";
    pub const RETRY_INTERVAL: &str = "SPARK_RETRY_INTERVAL";
}

/// Immutable settings shared by every request made through one client.
#[derive(Clone)]
pub struct Config {
    base_url: BaseUrl,
    auth: AuthStrategy,
    /// The OAuth token endpoint was derived from `base_url`.
    derived_token_url: bool,
    timeout: Duration,
    connect_timeout: Duration,
    retry: RetryConfig,
    compression: CompressionConfig,
    interceptors: Interceptors,
    logger: Arc<dyn Logger>,
    user_agent: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url.to_string())
            .field("auth", &self.auth.to_string())
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("compression", &self.compression)
            .field("interceptors", &self.interceptors.len())
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Create a new config builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Build a config from `SPARK_*` environment variables.
    pub fn from_env() -> Result<Self> {
        ConfigBuilder::from_lookup(|name| std::env::var(name).ok())?.build()
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    pub fn auth(&self) -> &AuthStrategy {
        &self.auth
    }

    /// Per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn max_retries(&self) -> u32 {
        self.retry.max_retries
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry.retry_interval
    }

    pub fn compression(&self) -> &CompressionConfig {
        &self.compression
    }

    pub fn interceptors(&self) -> &Interceptors {
        &self.interceptors
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Derive a new config with the given fields replaced.
    ///
    /// A new base URL keeps its own tenant segment; the original tenant is
    /// only used when the URL has none. Interceptors and the OAuth token
    /// cache are shared with the original unless replaced. An OAuth token
    /// endpoint derived from the base URL follows a tenant or environment
    /// change, and then gets a cache of its own.
    pub fn copy_with(&self, overrides: ConfigOverrides) -> Result<Config> {
        let base_url = match (overrides.base_url, overrides.tenant) {
            (Some(url), Some(tenant)) => BaseUrl::parse(&url, Some(&tenant))?,
            (Some(url), None) => BaseUrl::parse(&url, None)
                .or_else(|_| BaseUrl::parse(&url, Some(self.base_url.tenant())))?,
            (None, Some(tenant)) => self.base_url.with_tenant(&tenant)?,
            (None, None) => self.base_url.clone(),
        };

        let timeout = overrides.timeout.unwrap_or(self.timeout);
        validate_timeout(timeout)?;

        let selected = select_auth(
            overrides.auth,
            overrides.oauth,
            overrides.bearer_token,
            overrides.api_key,
        )?;
        let (auth, derived_token_url) = match selected {
            Some(auth) => bind_oauth(auth, &base_url, timeout),
            None => match &self.auth {
                AuthStrategy::OAuth(oauth) if self.derived_token_url => {
                    let token_url = base_url.oauth_token_url();
                    let oauth = if oauth.token_url() == Some(token_url.as_str()) {
                        oauth.clone()
                    } else {
                        oauth.for_token_url(token_url)
                    };
                    (AuthStrategy::OAuth(oauth.with_timeout(timeout)), true)
                }
                AuthStrategy::OAuth(oauth) => (
                    AuthStrategy::OAuth(oauth.clone().with_timeout(timeout)),
                    false,
                ),
                other => (other.clone(), false),
            },
        };

        let mut retry = self.retry.clone();
        if let Some(max_retries) = overrides.max_retries {
            retry.max_retries = max_retries;
        }
        if let Some(interval) = overrides.retry_interval {
            retry.retry_interval = interval;
        }

        Ok(Config {
            auth,
            derived_token_url,
            base_url,
            timeout,
            connect_timeout: self.connect_timeout,
            retry,
            compression: self.compression.clone(),
            interceptors: self.interceptors.clone(),
            logger: overrides.logger.unwrap_or_else(|| self.logger.clone()),
            user_agent: overrides
                .user_agent
                .unwrap_or_else(|| self.user_agent.clone()),
        })
    }

    /// Derive a new config with one more interceptor at the end of the
    /// pipeline.
    pub fn with_interceptor(&self, hook: impl Interceptor + 'static) -> Config {
        let mut config = self.clone();
        config.interceptors.add(hook);
        config
    }
}

/// Fields to replace in [`Config::copy_with`]. `None` keeps the original.
#[derive(Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub tenant: Option<String>,
    pub auth: Option<AuthStrategy>,
    pub oauth: Option<OAuth>,
    pub bearer_token: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub retry_interval: Option<Duration>,
    pub logger: Option<Arc<dyn Logger>>,
    pub user_agent: Option<String>,
}

impl std::fmt::Debug for ConfigOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigOverrides")
            .field("base_url", &self.base_url)
            .field("tenant", &self.tenant)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_interval", &self.retry_interval)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Config`].
pub struct ConfigBuilder {
    base_url: Option<String>,
    tenant: Option<String>,
    env: Option<String>,
    auth: Option<AuthStrategy>,
    oauth: Option<OAuth>,
    bearer_token: Option<String>,
    api_key: Option<String>,
    timeout: Duration,
    connect_timeout: Duration,
    retry: RetryConfig,
    retry_interval_secs: Option<f64>,
    compression: CompressionConfig,
    interceptors: Interceptors,
    logger: Arc<dyn Logger>,
    user_agent: String,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            tenant: None,
            env: None,
            auth: None,
            oauth: None,
            bearer_token: None,
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            retry_interval_secs: None,
            compression: CompressionConfig::default(),
            interceptors: Interceptors::new(),
            logger: Arc::new(TracingLogger),
            user_agent: crate::USER_AGENT.to_string(),
        }
    }
}

impl std::fmt::Debug for ConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigBuilder")
            .field("base_url", &self.base_url)
            .field("tenant", &self.tenant)
            .field("env", &self.env)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ConfigBuilder {
    /// Seed a builder from a variable lookup, e.g. the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut builder = Self::default();

        if let Some(url) = var(env::BASE_URL) {
            builder = builder.with_base_url(url);
        }
        if let Some(tenant) = var(env::TENANT) {
            builder = builder.with_tenant(tenant);
        }
        if let Some(env_name) = var(env::ENV) {
            builder = builder.with_env(env_name);
        }
        if let Some(key) = var(env::API_KEY) {
            builder = builder.with_api_key(key);
        }
        if let Some(token) = var(env::BEARER_TOKEN) {
            builder = builder.with_bearer_token(token);
        }
        if let Some(path) = var(env::OAUTH_PATH) {
            builder = builder.with_oauth(OAuth::from_file(path)?);
        } else if let (Some(id), Some(secret)) = (var(env::CLIENT_ID), var(env::CLIENT_SECRET)) {
            builder = builder.with_oauth(OAuth::new(id, secret));
        }
        if let Some(ms) = var(env::TIMEOUT_MS) {
            builder = builder.with_timeout_ms(parse_var(env::TIMEOUT_MS, &ms)?);
        }
        if let Some(retries) = var(env::MAX_RETRIES) {
            builder = builder.with_max_retries(parse_var(env::MAX_RETRIES, &retries)?);
        }
        if let Some(secs) = var(env::RETRY_INTERVAL) {
            builder = builder.with_retry_interval_secs(parse_var(env::RETRY_INTERVAL, &secs)?);
        }

        Ok(builder)
    }

    /// Full URL, e.g. `https://excel.uat.us.coherent.global/my-tenant`, or a
    /// bare host combined with [`with_tenant`](Self::with_tenant).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Hosted environment, used when no base URL is given.
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    /// Use this strategy, ignoring any individual credentials.
    pub fn with_auth(mut self, auth: AuthStrategy) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// OAuth client credentials. Without an explicit token URL the token
    /// endpoint is derived from the base URL.
    pub fn with_oauth(mut self, oauth: OAuth) -> Self {
        self.oauth = Some(oauth);
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_timeout_ms(self, ms: u64) -> Self {
        self.with_timeout(Duration::from_millis(ms))
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Maximum attempts per request, the first included.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.retry.max_retries = retries;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry.retry_interval = interval;
        self.retry_interval_secs = None;
        self
    }

    /// Retry interval in (possibly fractional) seconds. Validated by
    /// [`build`](Self::build).
    pub fn with_retry_interval_secs(mut self, secs: f64) -> Self {
        self.retry_interval_secs = Some(secs);
        self
    }

    /// Replace the whole retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self.retry_interval_secs = None;
        self
    }

    /// Disable retries.
    pub fn without_retry(self) -> Self {
        self.with_max_retries(1)
    }

    pub fn with_compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Append an interceptor.
    pub fn with_interceptor(mut self, hook: impl Interceptor + 'static) -> Self {
        self.interceptors.add(hook);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<Config> {
        let base_url = match (self.base_url.as_deref(), self.tenant.as_deref()) {
            (Some(url), tenant) => BaseUrl::parse(url, tenant)?,
            (None, Some(tenant)) => BaseUrl::from_tenant(tenant, self.env.as_deref())?,
            (None, None) => {
                return Err(Error::new(ErrorKind::Config(
                    "either a base URL or a tenant name is required".to_string(),
                )))
            }
        };

        let auth = select_auth(self.auth, self.oauth, self.bearer_token, self.api_key)?
            .ok_or_else(|| {
                Error::new(ErrorKind::Config(
                    "no authentication configured: supply an API key, a bearer token or OAuth client credentials"
                        .to_string(),
                ))
            })?;

        validate_timeout(self.timeout)?;

        let mut retry = self.retry;
        if let Some(secs) = self.retry_interval_secs {
            if !secs.is_finite() || secs < 0.0 {
                return Err(Error::new(ErrorKind::Config(format!(
                    "retry interval must be a non-negative number of seconds, got {}",
                    secs
                ))));
            }
            retry.retry_interval = Duration::try_from_secs_f64(secs).map_err(|e| {
                Error::with_source(
                    ErrorKind::Config(format!("retry interval of {} seconds is out of range", secs)),
                    e,
                )
            })?;
        }

        let (auth, derived_token_url) = bind_oauth(auth, &base_url, self.timeout);

        Ok(Config {
            auth,
            derived_token_url,
            base_url,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            retry,
            compression: self.compression,
            interceptors: self.interceptors,
            logger: self.logger,
            user_agent: self.user_agent,
        })
    }
}

/// Configuration for request/response compression.
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Accept gzip/deflate encoded responses.
    pub accept_compressed: bool,
    /// Gzip request bodies of at least `min_size` bytes when the request does
    /// not choose an encoding itself.
    pub compress_requests: bool,
    /// Minimum body size to compress (bytes).
    pub min_size: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            accept_compressed: true,
            compress_requests: false,
            min_size: 1024,
        }
    }
}

impl CompressionConfig {
    /// Disable all compression.
    pub fn disabled() -> Self {
        Self {
            accept_compressed: false,
            compress_requests: false,
            min_size: 0,
        }
    }

    /// Compress both directions.
    pub fn full() -> Self {
        Self {
            accept_compressed: true,
            compress_requests: true,
            min_size: 512,
        }
    }
}

/// Pick a strategy: explicit > OAuth > bearer > API key.
fn select_auth(
    auth: Option<AuthStrategy>,
    oauth: Option<OAuth>,
    bearer_token: Option<String>,
    api_key: Option<String>,
) -> Result<Option<AuthStrategy>> {
    if let Some(auth) = auth {
        return Ok(Some(auth));
    }
    if let Some(oauth) = oauth {
        return Ok(Some(AuthStrategy::oauth(oauth)));
    }
    if let Some(token) = bearer_token {
        return Ok(Some(AuthStrategy::bearer(token)?));
    }
    if let Some(key) = api_key {
        return Ok(Some(AuthStrategy::api_key(key)?));
    }
    Ok(None)
}

/// Point an OAuth strategy without a token endpoint at the environment's and
/// bound its exchanges by the request timeout. Returns whether the token
/// endpoint was derived.
fn bind_oauth(auth: AuthStrategy, base_url: &BaseUrl, timeout: Duration) -> (AuthStrategy, bool) {
    match auth {
        AuthStrategy::OAuth(oauth) => {
            let derived = oauth.token_url().is_none();
            let oauth = if derived {
                oauth.with_token_url(base_url.oauth_token_url())
            } else {
                oauth
            };
            (AuthStrategy::OAuth(oauth.with_timeout(timeout)), derived)
        }
        other => (other, false),
    }
}

fn validate_timeout(timeout: Duration) -> Result<()> {
    if timeout.is_zero() {
        return Err(Error::new(ErrorKind::Config(
            "timeout must be greater than zero".to_string(),
        )));
    }
    Ok(())
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        Error::new(ErrorKind::Config(format!(
            "{} has an invalid value: '{}'",
            name, value
        )))
    })
}
