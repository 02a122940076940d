//! SDK configuration.
//!
//! Configuration is an immutable value built once at startup, either from
//! code via the `with_*` builders or from environment variables via
//! [`SdkConfiguration::from_env`], then shared read-only with the token
//! decoder and the cookie stores.

use crate::error::{IdentityError, IdentityResult};
use crate::store::SameSite;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default leeway (seconds) applied to time-based claim checks.
pub const DEFAULT_LEEWAY: i64 = 60;

/// Default lifetime of a cached key set.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Supported token signature algorithms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenAlgorithm {
    /// RSASSA-PKCS1-v1_5 using SHA-256, keys from the tenant JWKS
    RS256,
    /// HMAC using SHA-256, keyed with the client secret
    HS256,
}

impl TokenAlgorithm {
    /// Get the JOSE `alg` name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenAlgorithm::RS256 => "RS256",
            TokenAlgorithm::HS256 => "HS256",
        }
    }

    /// Parse a JOSE `alg` name; only allow-listed algorithms are accepted.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RS256" => Some(TokenAlgorithm::RS256),
            "HS256" => Some(TokenAlgorithm::HS256),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the authorization response is delivered back to the application.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Parameters in the redirect query string
    #[default]
    Query,
    /// Parameters in a cross-site form POST
    FormPost,
    /// Parameters in the URL fragment
    Fragment,
}

impl ResponseMode {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "query" => Some(ResponseMode::Query),
            "form_post" => Some(ResponseMode::FormPost),
            "fragment" => Some(ResponseMode::Fragment),
            _ => None,
        }
    }
}

/// Identity SDK configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SdkConfiguration {
    /// Tenant domain, e.g. `tenant.example.com`
    pub domain: Option<String>,

    /// Application client ID
    pub client_id: Option<String>,

    /// Application client secret (HS256 verification key)
    pub client_secret: Option<String>,

    /// Additional accepted audiences; the client ID is always accepted
    pub audience: Vec<String>,

    /// Allowed organizations (`org_...` IDs or names); empty disables filtering
    pub organization: Vec<String>,

    /// Required token algorithm; `None` trusts the header within the allow-list
    pub token_algorithm: Option<TokenAlgorithm>,

    /// Explicit JWKS URI; defaults to the tenant's well-known location
    pub token_jwks_uri: Option<String>,

    /// How long fetched key sets stay cached
    pub token_cache_ttl: Duration,

    /// Clock tolerance in seconds
    pub token_leeway: i64,

    /// Maximum authentication age in seconds for ID tokens
    pub token_max_age: Option<i64>,

    /// Secret used to derive the cookie encryption key
    pub cookie_secret: Option<String>,

    /// Cookie `Domain` attribute
    pub cookie_domain: Option<String>,

    /// Cookie `Path` attribute
    pub cookie_path: String,

    /// Cookie lifetime in seconds; 0 issues session cookies
    pub cookie_expires: i64,

    /// Cookie `Secure` attribute
    pub cookie_secure: bool,

    /// Authorization response delivery mode
    pub response_mode: ResponseMode,

    /// Prefix for session cookie names
    pub session_storage_id: String,

    /// Prefix for transient cookie names
    pub transient_storage_id: String,
}

impl std::fmt::Debug for SdkConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkConfiguration")
            .field("domain", &self.domain)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("audience", &self.audience)
            .field("organization", &self.organization)
            .field("token_algorithm", &self.token_algorithm)
            .field("token_jwks_uri", &self.token_jwks_uri)
            .field("token_cache_ttl", &self.token_cache_ttl)
            .field("token_leeway", &self.token_leeway)
            .field("token_max_age", &self.token_max_age)
            .field("cookie_secret", &self.cookie_secret.as_ref().map(|_| "[REDACTED]"))
            .field("cookie_domain", &self.cookie_domain)
            .field("cookie_path", &self.cookie_path)
            .field("cookie_expires", &self.cookie_expires)
            .field("cookie_secure", &self.cookie_secure)
            .field("response_mode", &self.response_mode)
            .field("session_storage_id", &self.session_storage_id)
            .field("transient_storage_id", &self.transient_storage_id)
            .finish()
    }
}

impl Default for SdkConfiguration {
    fn default() -> Self {
        Self {
            domain: None,
            client_id: None,
            client_secret: None,
            audience: Vec::new(),
            organization: Vec::new(),
            token_algorithm: None,
            token_jwks_uri: None,
            token_cache_ttl: DEFAULT_CACHE_TTL,
            token_leeway: DEFAULT_LEEWAY,
            token_max_age: None,
            cookie_secret: None,
            cookie_domain: None,
            cookie_path: "/".to_string(),
            cookie_expires: 0,
            cookie_secure: false,
            response_mode: ResponseMode::Query,
            session_storage_id: "platform_session".to_string(),
            transient_storage_id: "platform_transient".to_string(),
        }
    }
}

impl SdkConfiguration {
    /// Create a configuration for a tenant domain and client.
    pub fn new(domain: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            client_id: Some(client_id.into()),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `IDENTITY_DOMAIN`, `IDENTITY_CLIENT_ID`, `IDENTITY_CLIENT_SECRET`
    /// - `IDENTITY_AUDIENCE`, `IDENTITY_ORGANIZATION`: comma-separated lists
    /// - `IDENTITY_TOKEN_ALGORITHM`: `RS256` or `HS256`
    /// - `IDENTITY_JWKS_URI`
    /// - `IDENTITY_TOKEN_CACHE_TTL`: seconds (default: 60)
    /// - `IDENTITY_TOKEN_LEEWAY`: seconds (default: 60)
    /// - `IDENTITY_TOKEN_MAX_AGE`: seconds
    /// - `IDENTITY_COOKIE_SECRET`, `IDENTITY_COOKIE_DOMAIN`
    /// - `IDENTITY_COOKIE_PATH` (default: /)
    /// - `IDENTITY_COOKIE_EXPIRES`: seconds (default: 0, session cookies)
    /// - `IDENTITY_COOKIE_SECURE`: whether cookies are `Secure` (default: false)
    /// - `IDENTITY_RESPONSE_MODE`: `query`, `form_post` or `fragment`
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            domain: std::env::var("IDENTITY_DOMAIN").ok(),
            client_id: std::env::var("IDENTITY_CLIENT_ID").ok(),
            client_secret: std::env::var("IDENTITY_CLIENT_SECRET").ok(),
            audience: std::env::var("IDENTITY_AUDIENCE")
                .map(|s| split_list(&s))
                .unwrap_or_default(),
            organization: std::env::var("IDENTITY_ORGANIZATION")
                .map(|s| split_list(&s))
                .unwrap_or_default(),
            token_algorithm: std::env::var("IDENTITY_TOKEN_ALGORITHM")
                .ok()
                .and_then(|s| TokenAlgorithm::parse(s.trim())),
            token_jwks_uri: std::env::var("IDENTITY_JWKS_URI").ok(),
            token_cache_ttl: std::env::var("IDENTITY_TOKEN_CACHE_TTL")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.token_cache_ttl),
            token_leeway: std::env::var("IDENTITY_TOKEN_LEEWAY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.token_leeway),
            token_max_age: std::env::var("IDENTITY_TOKEN_MAX_AGE")
                .ok()
                .and_then(|s| s.parse().ok()),
            cookie_secret: std::env::var("IDENTITY_COOKIE_SECRET").ok(),
            cookie_domain: std::env::var("IDENTITY_COOKIE_DOMAIN").ok(),
            cookie_path: std::env::var("IDENTITY_COOKIE_PATH").unwrap_or(default.cookie_path),
            cookie_expires: std::env::var("IDENTITY_COOKIE_EXPIRES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.cookie_expires),
            cookie_secure: std::env::var("IDENTITY_COOKIE_SECURE")
                .map(|s| s != "false" && s != "0")
                .unwrap_or(default.cookie_secure),
            response_mode: std::env::var("IDENTITY_RESPONSE_MODE")
                .ok()
                .and_then(|s| ResponseMode::parse(&s))
                .unwrap_or(default.response_mode),
            session_storage_id: default.session_storage_id,
            transient_storage_id: default.transient_storage_id,
        }
    }

    /// Set the client secret.
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Add accepted audiences.
    pub fn with_audience(mut self, audience: Vec<String>) -> Self {
        self.audience = audience;
        self
    }

    /// Restrict tokens to the given organizations.
    pub fn with_organization(mut self, organization: Vec<String>) -> Self {
        self.organization = organization;
        self
    }

    /// Require a specific token algorithm.
    pub fn with_token_algorithm(mut self, algorithm: TokenAlgorithm) -> Self {
        self.token_algorithm = Some(algorithm);
        self
    }

    /// Override the JWKS URI.
    pub fn with_jwks_uri(mut self, uri: impl Into<String>) -> Self {
        self.token_jwks_uri = Some(uri.into());
        self
    }

    /// Set the key set cache lifetime.
    pub fn with_token_cache_ttl(mut self, ttl: Duration) -> Self {
        self.token_cache_ttl = ttl;
        self
    }

    /// Set the clock tolerance.
    pub fn with_token_leeway(mut self, leeway: i64) -> Self {
        self.token_leeway = leeway;
        self
    }

    /// Set the maximum authentication age.
    pub fn with_token_max_age(mut self, max_age: i64) -> Self {
        self.token_max_age = Some(max_age);
        self
    }

    /// Set the cookie encryption secret.
    pub fn with_cookie_secret(mut self, secret: impl Into<String>) -> Self {
        self.cookie_secret = Some(secret.into());
        self
    }

    /// Set the cookie `Domain` attribute.
    pub fn with_cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie_domain = Some(domain.into());
        self
    }

    /// Set the cookie lifetime in seconds.
    pub fn with_cookie_expires(mut self, seconds: i64) -> Self {
        self.cookie_expires = seconds;
        self
    }

    /// Set the cookie `Secure` attribute.
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    /// Set the response delivery mode.
    pub fn with_response_mode(mut self, mode: ResponseMode) -> Self {
        self.response_mode = mode;
        self
    }

    /// Tenant host without scheme or trailing slash.
    fn host(&self) -> IdentityResult<&str> {
        let domain = self
            .domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| IdentityError::configuration("Tenant domain is not configured"))?;

        let domain = domain
            .strip_prefix("https://")
            .or_else(|| domain.strip_prefix("http://"))
            .unwrap_or(domain);
        Ok(domain.trim_end_matches('/'))
    }

    /// Expected `iss` claim: `https://{domain}/`.
    pub fn issuer(&self) -> IdentityResult<String> {
        Ok(format!("https://{}/", self.host()?))
    }

    /// Key set location: the explicit URI, else the tenant's well-known path.
    pub fn jwks_uri(&self) -> IdentityResult<String> {
        if let Some(uri) = &self.token_jwks_uri {
            return Ok(uri.clone());
        }
        Ok(format!("https://{}/.well-known/jwks.json", self.host()?))
    }

    /// Accepted audiences: the client ID followed by any extra audiences.
    pub fn allowed_audiences(&self) -> Vec<String> {
        let mut audiences = Vec::with_capacity(self.audience.len() + 1);
        if let Some(client_id) = &self.client_id {
            audiences.push(client_id.clone());
        }
        for aud in &self.audience {
            if !audiences.contains(aud) {
                audiences.push(aud.clone());
            }
        }
        audiences
    }

    /// `SameSite` attribute for emitted cookies.
    ///
    /// Form-post responses arrive as cross-site POSTs, which only carry
    /// `SameSite=None` cookies.
    pub fn same_site(&self) -> SameSite {
        match self.response_mode {
            ResponseMode::FormPost => SameSite::None,
            ResponseMode::Query | ResponseMode::Fragment => SameSite::Lax,
        }
    }

    /// Validate that token verification can run with this configuration.
    pub fn validate(&self) -> IdentityResult<()> {
        self.host()?;
        if self.allowed_audiences().is_empty() {
            return Err(IdentityError::configuration(
                "Client ID or audience must be configured",
            ));
        }
        if self.token_algorithm == Some(TokenAlgorithm::HS256) && self.client_secret.is_none() {
            return Err(IdentityError::configuration(
                "Client secret is required for HS256 token verification",
            ));
        }
        Ok(())
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SdkConfiguration::default();
        assert_eq!(config.token_leeway, 60);
        assert_eq!(config.token_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.cookie_path, "/");
        assert_eq!(config.response_mode, ResponseMode::Query);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_issuer_normalization() {
        let config = SdkConfiguration::new("https://tenant.example.com/", "client");
        assert_eq!(config.issuer().unwrap(), "https://tenant.example.com/");

        let config = SdkConfiguration::new("tenant.example.com", "client");
        assert_eq!(config.issuer().unwrap(), "https://tenant.example.com/");
    }

    #[test]
    fn test_jwks_uri_defaults_to_well_known() {
        let config = SdkConfiguration::new("tenant.example.com", "client");
        assert_eq!(
            config.jwks_uri().unwrap(),
            "https://tenant.example.com/.well-known/jwks.json"
        );

        let config = config.with_jwks_uri("https://keys.example.com/jwks");
        assert_eq!(config.jwks_uri().unwrap(), "https://keys.example.com/jwks");
    }

    #[test]
    fn test_missing_domain_is_configuration_error() {
        let config = SdkConfiguration::default();
        assert!(matches!(config.issuer(), Err(IdentityError::Configuration(_))));
    }

    #[test]
    fn test_allowed_audiences_include_client_id_once() {
        let config = SdkConfiguration::new("tenant.example.com", "client")
            .with_audience(vec!["client".to_string(), "https://api".to_string()]);
        assert_eq!(config.allowed_audiences(), vec!["client", "https://api"]);
    }

    #[test]
    fn test_same_site_follows_response_mode() {
        let config = SdkConfiguration::new("tenant.example.com", "client");
        assert_eq!(config.same_site(), SameSite::Lax);

        let config = config.with_response_mode(ResponseMode::FormPost);
        assert_eq!(config.same_site(), SameSite::None);
    }

    #[test]
    fn test_hs256_requires_client_secret() {
        let config = SdkConfiguration::new("tenant.example.com", "client")
            .with_token_algorithm(TokenAlgorithm::HS256);
        assert!(config.validate().is_err());
        assert!(config.with_client_secret("secret").validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = SdkConfiguration::new("tenant.example.com", "client")
            .with_client_secret("super-secret")
            .with_cookie_secret("cookie-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("cookie-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_algorithm_allow_list() {
        assert_eq!(TokenAlgorithm::parse("RS256"), Some(TokenAlgorithm::RS256));
        assert_eq!(TokenAlgorithm::parse("HS256"), Some(TokenAlgorithm::HS256));
        assert_eq!(TokenAlgorithm::parse("none"), None);
        assert_eq!(TokenAlgorithm::parse("RS512"), None);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }
}
