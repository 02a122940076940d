//! Key/value storage for session and login-flow state
//!
//! [`Store`] is the get/set/delete contract consumed by session handling.
//! Implementations:
//!
//! - [`CookieStore`]: encrypted values carried in HTTP cookies, chunked when
//!   a value outgrows a single cookie
//! - [`MemoryStore`]: in-process map, for tests and server-side state
//!
//! [`TransientStore`] layers single-use semantics on any store for values
//! such as the login nonce and PKCE verifier.

pub mod cookie;
pub mod envelope;
pub mod jar;
pub mod transient;

pub use cookie::CookieStore;
pub use jar::{Cookie, CookieJar, SameSite};
pub use transient::TransientStore;

use crate::error::IdentityResult;
use serde_json::Value;
use std::collections::HashMap;

/// Storage contract for session values.
///
/// Reads never fail: absent, unreadable or tampered values are `None`.
pub trait Store {
    /// Get a value.
    fn get(&self, key: &str) -> Option<Value>;

    /// Set a value.
    fn set(&mut self, key: &str, value: Value) -> IdentityResult<()>;

    /// Delete a value.
    fn delete(&mut self, key: &str);

    /// Get a value, falling back to `default`.
    fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Delete several values.
    fn purge(&mut self, keys: &[&str]) {
        for key in keys {
            self.delete(key);
        }
    }
}

impl<S: Store + ?Sized> Store for &mut S {
    fn get(&self, key: &str) -> Option<Value> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: Value) -> IdentityResult<()> {
        (**self).set(key, value)
    }

    fn delete(&mut self, key: &str) {
        (**self).delete(key)
    }
}

/// In-process [`Store`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, Value>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> IdentityResult<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) {
        self.values.remove(key);
    }
}
