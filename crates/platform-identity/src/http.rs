//! HTTP requester capability.
//!
//! The identity core only issues plain GET requests for key set documents.
//! Connection pooling, TLS and retry policy belong to the implementation
//! behind [`HttpFetcher`]; the default one is backed by `reqwest`.

use async_trait::async_trait;

/// Response from an [`HttpFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,

    /// Raw response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Check for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for fetching remote documents.
///
/// Errors are plain strings; callers fold them into their own error type.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Fetch the document at `url`.
    async fn fetch(&self, url: &str) -> Result<HttpResponse, String>;
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_fetcher::ReqwestFetcher;

#[cfg(feature = "reqwest")]
mod reqwest_fetcher {
    use super::{HttpFetcher, HttpResponse};
    use async_trait::async_trait;
    use std::time::Duration;
    use tracing::{debug, error, instrument};

    /// Default request timeout.
    const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

    /// [`HttpFetcher`] backed by a `reqwest` client.
    ///
    /// Only HTTPS URLs are fetched, except loopback HTTP for local testing.
    #[derive(Debug, Clone)]
    pub struct ReqwestFetcher {
        client: reqwest::Client,
    }

    impl ReqwestFetcher {
        /// Create a fetcher with the default 10 second timeout.
        pub fn new() -> Result<Self, String> {
            Self::with_timeout(HTTP_TIMEOUT)
        }

        /// Create a fetcher with a custom timeout.
        pub fn with_timeout(timeout: Duration) -> Result<Self, String> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
            Ok(Self { client })
        }

        /// Wrap an existing client.
        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    /// Hosts that may be fetched over plain HTTP.
    const LOOPBACK_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "[::1]"];

    pub(super) fn is_allowed_url(url: &str) -> bool {
        let Ok(url) = reqwest::Url::parse(url) else {
            return false;
        };

        match url.scheme() {
            "https" => true,
            "http" => url
                .host_str()
                .is_some_and(|host| LOOPBACK_HOSTS.contains(&host)),
            _ => false,
        }
    }

    #[async_trait]
    impl HttpFetcher for ReqwestFetcher {
        #[instrument(skip(self))]
        async fn fetch(&self, url: &str) -> Result<HttpResponse, String> {
            if !is_allowed_url(url) {
                return Err("Key set endpoint must use HTTPS (HTTP only allowed for localhost)".to_string());
            }

            let response = self.client.get(url).send().await.map_err(|e| {
                error!(error = %e, "HTTP request failed");
                format!("Request failed: {}", e)
            })?;

            let status = response.status().as_u16();
            let body = response
                .bytes()
                .await
                .map_err(|e| format!("Failed to read response body: {}", e))?;

            debug!(status, bytes = body.len(), "Fetched remote document");
            Ok(HttpResponse::new(status, body.to_vec()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_success_range() {
        assert!(HttpResponse::new(200, "{}").is_success());
        assert!(HttpResponse::new(204, Vec::new()).is_success());
        assert!(!HttpResponse::new(404, "not found").is_success());
        assert!(!HttpResponse::new(500, Vec::new()).is_success());
    }

    #[cfg(feature = "reqwest")]
    #[test]
    fn test_only_https_or_loopback_allowed() {
        use super::reqwest_fetcher::is_allowed_url;

        assert!(is_allowed_url("https://tenant.example.com/.well-known/jwks.json"));
        assert!(is_allowed_url("http://localhost:8080/jwks"));
        assert!(is_allowed_url("http://127.0.0.1:4321/jwks"));
        assert!(!is_allowed_url("http://tenant.example.com/jwks"));
        assert!(!is_allowed_url("ftp://tenant.example.com/jwks"));
    }

    #[cfg(feature = "reqwest")]
    #[test]
    fn test_loopback_lookalikes_rejected() {
        use super::reqwest_fetcher::is_allowed_url;

        assert!(is_allowed_url("http://[::1]:4321/jwks"));
        assert!(is_allowed_url("http://localhost/jwks"));
        assert!(!is_allowed_url("http://localhost.attacker.example/jwks"));
        assert!(!is_allowed_url("http://127.0.0.1.nip.io/jwks"));
        assert!(!is_allowed_url("http://localhost@evil.example/jwks"));
        assert!(!is_allowed_url("not a url"));
    }

    #[cfg(feature = "reqwest")]
    #[tokio::test]
    async fn test_plain_http_rejected_before_request() {
        let fetcher = ReqwestFetcher::new().unwrap();
        let result = fetcher.fetch("http://tenant.example.com/jwks").await;
        assert!(result.is_err());
    }
}
