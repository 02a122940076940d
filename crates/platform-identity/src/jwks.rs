//! JWKS (JSON Web Key Set) fetching and caching
//!
//! [`KeyProvider`] resolves a token's `kid` to a public key published at the
//! tenant's JWKS URI. Whole key sets are cached by URI so that tokens signed
//! by different keys of the same set share one fetch. A `kid` absent from the
//! cached set forces a single refetch before the key is declared missing,
//! which picks up rotated keys without waiting for the TTL.

use crate::cache::KeySetCache;
use crate::error::{IdentityResult, InvalidTokenError};
use crate::http::HttpFetcher;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Raw key set document; keys are decoded one by one so a single
/// unsupported entry does not hide the rest of the set.
#[derive(Debug, Deserialize)]
struct RawKeySet {
    #[serde(default)]
    keys: Vec<serde_json::Value>,
}

/// Resolves signing keys from remote key sets.
#[derive(Clone)]
pub struct KeyProvider {
    fetcher: Arc<dyn HttpFetcher>,
    cache: Arc<dyn KeySetCache>,
}

impl std::fmt::Debug for KeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyProvider").finish_non_exhaustive()
    }
}

impl KeyProvider {
    /// Create a provider from an HTTP fetcher and a shared cache.
    pub fn new(fetcher: Arc<dyn HttpFetcher>, cache: Arc<dyn KeySetCache>) -> Self {
        Self { fetcher, cache }
    }

    /// Create a provider using `reqwest` and an in-process cache.
    #[cfg(feature = "reqwest")]
    pub fn with_defaults() -> IdentityResult<Self> {
        let fetcher = crate::http::ReqwestFetcher::new().map_err(crate::IdentityError::Configuration)?;
        Ok(Self::new(
            Arc::new(fetcher),
            Arc::new(crate::cache::MemoryCache::new()),
        ))
    }

    /// Get the key identified by `key_id` from the set at `jwks_uri`.
    ///
    /// # Errors
    ///
    /// - [`InvalidTokenError::KeySetUnavailable`] if the set cannot be fetched
    ///   or decoded
    /// - [`InvalidTokenError::KeyNotFound`] if the freshly fetched set has no
    ///   matching key
    #[instrument(skip(self, ttl))]
    pub async fn get_key(&self, jwks_uri: &str, key_id: &str, ttl: Duration) -> IdentityResult<Jwk> {
        if let Some(cached) = self.cache.get(jwks_uri) {
            if let Some(jwk) = cached.find(key_id) {
                debug!("Using cached key set");
                return Ok(jwk.clone());
            }
            debug!("Key ID not in cached key set, refreshing");
        }

        let key_set = self.fetch_key_set(jwks_uri).await?;
        self.cache.set(jwks_uri, key_set.clone(), ttl);

        key_set
            .find(key_id)
            .cloned()
            .ok_or_else(|| InvalidTokenError::KeyNotFound(key_id.to_string()).into())
    }

    /// Fetch and decode the key set at `jwks_uri`, bypassing the cache.
    pub async fn fetch_key_set(&self, jwks_uri: &str) -> IdentityResult<JwkSet> {
        info!(jwks_uri = %jwks_uri, "Fetching key set");

        let response = self.fetcher.fetch(jwks_uri).await.map_err(|e| {
            warn!(jwks_uri = %jwks_uri, error = %e, "Key set fetch failed");
            InvalidTokenError::KeySetUnavailable(e)
        })?;

        if !response.is_success() {
            warn!(jwks_uri = %jwks_uri, status = response.status, "Key set endpoint returned error status");
            return Err(InvalidTokenError::KeySetUnavailable(format!(
                "endpoint returned status {}",
                response.status
            ))
            .into());
        }

        let key_set = parse_key_set(&response.body)?;
        info!(jwks_uri = %jwks_uri, key_count = key_set.keys.len(), "Fetched key set");
        Ok(key_set)
    }
}

/// Decode a key set document, skipping entries that are not usable keys.
pub fn parse_key_set(body: &[u8]) -> IdentityResult<JwkSet> {
    let raw: RawKeySet = serde_json::from_slice(body)
        .map_err(|e| InvalidTokenError::KeySetUnavailable(format!("invalid key set document: {}", e)))?;

    let keys = raw
        .keys
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Jwk>(value) {
            Ok(jwk) => Some(jwk),
            Err(e) => {
                debug!(error = %e, "Skipping unusable key set entry");
                None
            }
        })
        .collect();

    Ok(JwkSet { keys })
}
