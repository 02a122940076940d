//! Single-use login-flow values.
//!
//! The authorization-code flow stores a handful of values between the
//! redirect to the identity provider and the callback: `state`, `nonce`,
//! the PKCE `code_verifier`, and the requested `max_age`. Each is read back
//! exactly once, so [`TransientStore::get_once`] deletes what it returns.

use super::Store;
use crate::error::IdentityResult;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Length of values generated by [`TransientStore::issue`].
pub const ISSUED_VALUE_LEN: usize = 32;

/// Length of a generated PKCE code verifier.
pub const CODE_VERIFIER_LEN: usize = 64;

/// Single-use values on top of any [`Store`].
#[derive(Debug)]
pub struct TransientStore<S: Store> {
    inner: S,
    written: BTreeSet<String>,
}

impl<S: Store> TransientStore<S> {
    /// Wrap a store.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            written: BTreeSet::new(),
        }
    }

    /// Generate a random alphanumeric value, store it and return it.
    pub fn issue(&mut self, key: &str) -> IdentityResult<String> {
        let value = random_alphanumeric(ISSUED_VALUE_LEN);
        self.store(key, value.clone())?;
        Ok(value)
    }

    /// Generate and store a PKCE code verifier, returning its S256 challenge.
    pub fn issue_code_verifier(&mut self, key: &str) -> IdentityResult<String> {
        let verifier = random_alphanumeric(CODE_VERIFIER_LEN);
        self.store(key, verifier.clone())?;
        Ok(code_challenge(&verifier))
    }

    /// Store a value.
    pub fn store(&mut self, key: &str, value: impl Into<Value>) -> IdentityResult<()> {
        self.inner.set(key, value.into())?;
        self.written.insert(key.to_string());
        Ok(())
    }

    /// Read a value and delete it.
    pub fn get_once(&mut self, key: &str) -> Option<Value> {
        let value = self.inner.get(key)?;
        self.inner.delete(key);
        self.written.remove(key);
        Some(value)
    }

    /// Read a string value and delete it.
    ///
    /// A stored value of another JSON type is deleted and reported as absent.
    pub fn get_once_str(&mut self, key: &str) -> Option<String> {
        match self.get_once(key)? {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    /// Check whether a value is present.
    pub fn is_set(&self, key: &str) -> bool {
        self.inner.get(key).is_some()
    }

    /// Delete every value written through this store, plus `keys`.
    pub fn purge(&mut self, keys: &[&str]) {
        let written = std::mem::take(&mut self.written);
        for key in written.iter().map(String::as_str).chain(keys.iter().copied()) {
            self.inner.delete(key);
        }
    }

    /// Underlying store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Release the underlying store.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

/// S256 PKCE challenge: `base64url(sha256(verifier))` without padding.
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
