//! # spark-sdk-auth
//!
//! Authentication strategies for the Spark SDK.
//!
//! ## Security
//!
//! - API keys, tokens and client secrets are masked (all but the last four
//!   characters) in Debug and Display output
//! - Tracing spans skip credential parameters
//! - Error messages never include credential values
//!
//! ## Supported Strategies
//!
//! - **Open** - No credentials, for public endpoints
//! - **API key** - Static key sent in the `x-synthetic-key` header
//! - **Bearer token** - Static token sent as `Authorization: Bearer ...`
//! - **OAuth2 client credentials** - Token exchanged on demand, cached until
//!   shortly before expiry, refreshed single-flight
//!
//! ## Example
//!
//! ```rust,ignore
//! use spark_sdk_auth::{AuthStrategy, OAuth};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), spark_sdk_auth::Error> {
//!     let auth = AuthStrategy::oauth(
//!         OAuth::from_file("oauth.json")?
//!             .with_token_url("https://keycloak.uat.us.coherent.global/auth/realms/my-tenant/protocol/openid-connect/token"),
//!     );
//!
//!     let header = auth.resolve_header().await?;
//!     Ok(())
//! }
//! ```

mod credentials;
mod error;
mod oauth;
mod strategy;

pub use credentials::{mask, ApiKey, BearerToken};
pub use error::{Error, ErrorKind, Result};
pub use oauth::{AccessToken, OAuth, DEFAULT_EXPIRY_SKEW_SECS, DEFAULT_TOKEN_TIMEOUT};
pub use strategy::{AuthHeader, AuthKind, AuthStrategy, API_KEY_HEADER, AUTHORIZATION_HEADER};
