//! Base URL and endpoint resolution.
//!
//! A [`BaseUrl`] is the scheme/host/port of a platform environment plus the
//! tenant namespace. Request URIs are derived from it with
//! [`BaseUrl::concat`], which never mutates the receiver.

use url::Url;

use crate::error::{Error, ErrorKind, Result};

/// Environment used when only a tenant is supplied.
pub const DEFAULT_ENV: &str = "uat.us";

/// Domain of hosted environments.
pub const DEFAULT_DOMAIN: &str = "coherent.global";

/// API version used by [`UriOptions::default`].
pub const DEFAULT_API_VERSION: &str = "v3";

/// Options controlling the shape of a request URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriOptions {
    /// API version segment, e.g. `v3`. `None` omits the `api/{version}` prefix.
    pub version: Option<String>,
    /// Use the public (unauthenticated) path shape.
    pub public: bool,
}

impl Default for UriOptions {
    fn default() -> Self {
        Self {
            version: Some(DEFAULT_API_VERSION.to_string()),
            public: false,
        }
    }
}

impl UriOptions {
    /// Tenant-scoped URI for the given API version.
    pub fn versioned(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            public: false,
        }
    }

    /// URI directly under the tenant, without an API version prefix.
    pub fn unversioned() -> Self {
        Self {
            version: None,
            public: false,
        }
    }

    /// Switch to the public path shape.
    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }
}

/// Scheme, host and tenant of a platform environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl {
    value: String,
    tenant: String,
}

impl BaseUrl {
    /// Parse a URL, taking the tenant from `tenant` or, when absent, from the
    /// first path segment of the URL.
    ///
    /// A bare host (no scheme) is treated as `https://{host}`.
    pub fn parse(raw: &str, tenant: Option<&str>) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::new(ErrorKind::Validation(
                "base URL must not be empty".to_string(),
            )));
        }

        let candidate = if raw.contains("://") {
            raw.to_string()
        } else if raw.starts_with('/') {
            return Err(Error::new(ErrorKind::Validation(format!(
                "base URL must be absolute, got '{}'",
                raw
            ))));
        } else {
            format!("https://{}", raw)
        };

        let url = Url::parse(&candidate)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::new(ErrorKind::Validation(format!(
                "unsupported URL scheme '{}'",
                url.scheme()
            ))));
        }
        let host = url.host_str().ok_or_else(|| {
            Error::new(ErrorKind::Validation(format!(
                "base URL has no host: '{}'",
                raw
            )))
        })?;

        let value = match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        };

        let tenant = tenant
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| {
                url.path_segments()
                    .and_then(|mut segments| segments.find(|s| !s.is_empty()))
                    .map(str::to_string)
            })
            .ok_or_else(|| {
                Error::new(ErrorKind::Config(
                    "tenant name is required: supply one or include it in the base URL path"
                        .to_string(),
                ))
            })?;

        Ok(Self { value, tenant })
    }

    /// Parse a full URL whose first path segment is the tenant.
    pub fn from_url(raw: &str) -> Result<Self> {
        Self::parse(raw, None)
    }

    /// Combine a host (or URL) with an explicit tenant.
    pub fn new(host: &str, tenant: &str) -> Result<Self> {
        Self::parse(host, Some(tenant))
    }

    /// Build the base URL of a hosted environment, e.g. `uat.us`.
    pub fn from_tenant(tenant: &str, env: Option<&str>) -> Result<Self> {
        let env = env.map(str::trim).filter(|e| !e.is_empty()).unwrap_or(DEFAULT_ENV);
        Self::parse(&format!("https://excel.{}.{}", env, DEFAULT_DOMAIN), Some(tenant))
    }

    /// Scheme, host and port, without a trailing slash.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The tenant name.
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// `value/tenant`.
    pub fn full(&self) -> String {
        format!("{}/{}", self.value, self.tenant)
    }

    /// A copy of this base URL scoped to another tenant.
    pub fn with_tenant(&self, tenant: &str) -> Result<Self> {
        Self::parse(&self.value, Some(tenant))
    }

    /// Build the absolute URI of an endpoint.
    ///
    /// - tenant-scoped: `{value}/{tenant}/api/{version}/{endpoint}`
    /// - public: `{value}/{tenant}/api/{version}/public/{endpoint}`
    /// - unversioned: `{value}/{tenant}/{endpoint}`
    pub fn concat(&self, endpoint: &str, options: &UriOptions) -> String {
        let endpoint = endpoint.trim_matches('/');
        let mut uri = self.full();

        if let Some(version) = options.version.as_deref() {
            uri.push_str("/api/");
            uri.push_str(version.trim_matches('/'));
        }
        if options.public {
            uri.push_str("/public");
        }
        if !endpoint.is_empty() {
            uri.push('/');
            uri.push_str(endpoint);
        }
        uri
    }

    /// Client-credentials token endpoint for this environment.
    ///
    /// Hosted environments serve tokens from the `keycloak.` sibling of the
    /// `excel.` host; other hosts serve them themselves.
    pub fn oauth_token_url(&self) -> String {
        let identity = match self.value.split_once("://excel.") {
            Some((scheme, rest)) => format!("{}://keycloak.{}", scheme, rest),
            None => self.value.clone(),
        };
        format!(
            "{}/auth/realms/{}/protocol/openid-connect/token",
            identity, self.tenant
        )
    }
}

impl std::fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.value, self.tenant)
    }
}

/// Locator of a hosted service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceUri {
    /// `folder/service`, optionally pinned to a version: `folder/service[1.2.0]`.
    Named {
        folder: String,
        service: String,
        version: Option<String>,
    },
    /// `service/{id}`
    ServiceId(String),
    /// `version/{id}`
    VersionId(String),
}

impl ServiceUri {
    /// Parse a service locator.
    ///
    /// Accepts `folder/service`, `folders/{folder}/services/{service}`,
    /// either with an optional `[version]` suffix, as well as
    /// `service/{id}` and `version/{id}`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_matches('/');
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            ["service", id] => Ok(ServiceUri::ServiceId((*id).to_string())),
            ["version", id] => Ok(ServiceUri::VersionId((*id).to_string())),
            ["folders", folder, "services", service] | [folder, service] => {
                let (service, version) = split_version(service)?;
                Ok(ServiceUri::Named {
                    folder: decode(folder),
                    service: decode(service),
                    version,
                })
            }
            _ => Err(Error::new(ErrorKind::Validation(format!(
                "'{}' is not a valid service locator",
                raw
            )))),
        }
    }

    /// Build a named locator.
    pub fn named(folder: impl Into<String>, service: impl Into<String>) -> Self {
        ServiceUri::Named {
            folder: folder.into(),
            service: service.into(),
            version: None,
        }
    }

    /// The pinned version, for named locators.
    pub fn version(&self) -> Option<&str> {
        match self {
            ServiceUri::Named { version, .. } => version.as_deref(),
            _ => None,
        }
    }

    /// Relative endpoint path, percent-encoded.
    pub fn to_path(&self) -> String {
        match self {
            ServiceUri::Named {
                folder, service, ..
            } => format!(
                "folders/{}/services/{}",
                urlencoding::encode(folder),
                urlencoding::encode(service)
            ),
            ServiceUri::ServiceId(id) => format!("service/{}", urlencoding::encode(id)),
            ServiceUri::VersionId(id) => format!("version/{}", urlencoding::encode(id)),
        }
    }
}

impl std::fmt::Display for ServiceUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceUri::Named {
                folder,
                service,
                version: Some(version),
            } => write!(f, "{}/{}[{}]", folder, service, version),
            ServiceUri::Named {
                folder, service, ..
            } => write!(f, "{}/{}", folder, service),
            ServiceUri::ServiceId(id) => write!(f, "service/{}", id),
            ServiceUri::VersionId(id) => write!(f, "version/{}", id),
        }
    }
}

fn split_version(segment: &str) -> Result<(&str, Option<String>)> {
    match segment.split_once('[') {
        None => Ok((segment, None)),
        Some((name, rest)) => {
            let version = rest.strip_suffix(']').filter(|v| !v.is_empty()).ok_or_else(|| {
                Error::new(ErrorKind::Validation(format!(
                    "malformed version suffix in '{}'",
                    segment
                )))
            })?;
            Ok((name, Some(version.to_string())))
        }
    }
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}
