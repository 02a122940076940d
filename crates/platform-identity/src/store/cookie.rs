//! Encrypted, chunked cookie storage.
//!
//! Each logical key maps to a cookie named `hex(sha256(prefix + "_" + key))`.
//! The value is serialized to JSON and sealed (see [`super::envelope`]). A
//! sealed value shorter than [`CHUNK_THRESHOLD`] is written under the base
//! name; anything longer is split into fragments:
//!
//! ```text
//! <name>_0  fragment count
//! <name>_1  first fragment
//! ...
//! <name>_N  last fragment
//! ```
//!
//! A value never spans more than [`MAX_FRAGMENTS`] fragments. Reads treat any
//! missing fragment, bad count or failed decryption as an absent value. Cookies are client-controlled input, so a tampered cookie
//! never turns into an error.

use super::envelope::EnvelopeKey;
use super::jar::{Cookie, CookieJar, SameSite};
use super::Store;
use crate::config::SdkConfiguration;
use crate::error::{IdentityError, IdentityResult};
use chrono::{Duration, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::borrow::BorrowMut;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Sealed values at or above this length are chunked; also the fragment size.
pub const CHUNK_THRESHOLD: usize = 3072;

/// Largest sealed value the store will write.
pub const MAX_SEALED_LEN: usize = 96 * 1024;

/// Largest fragment count a control cookie may carry.
pub const MAX_FRAGMENTS: usize = MAX_SEALED_LEN / CHUNK_THRESHOLD;

/// Separator between the prefix and the key in the hashed name.
pub const KEY_SEPARATOR: &str = "_";

/// [`Store`] backed by encrypted cookies in a [`CookieJar`].
///
/// `J` is the jar itself or a mutable borrow of one, so a store can either
/// own the request's jar or be layered over a jar shared with other stores.
pub struct CookieStore<J = CookieJar>
where
    J: BorrowMut<CookieJar>,
{
    config: Arc<SdkConfiguration>,
    prefix: String,
    key: Option<EnvelopeKey>,
    jar: J,
}

impl<J> CookieStore<J>
where
    J: BorrowMut<CookieJar>,
{
    /// Create a store whose cookie names are derived from `prefix`.
    ///
    /// A missing cookie secret does not fail here; [`Store::set`] reports it
    /// and reads return `None`.
    pub fn new(config: Arc<SdkConfiguration>, prefix: impl Into<String>, jar: J) -> Self {
        let key = config
            .cookie_secret
            .as_deref()
            .and_then(|secret| EnvelopeKey::derive(secret).ok());

        Self {
            config,
            prefix: prefix.into(),
            key,
            jar,
        }
    }

    /// Store for session state, named by `session_storage_id`.
    pub fn session(config: Arc<SdkConfiguration>, jar: J) -> Self {
        let prefix = config.session_storage_id.clone();
        Self::new(config, prefix, jar)
    }

    /// Store for login-flow state, named by `transient_storage_id`.
    pub fn transient(config: Arc<SdkConfiguration>, jar: J) -> Self {
        let prefix = config.transient_storage_id.clone();
        Self::new(config, prefix, jar)
    }

    /// Name prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Underlying jar.
    pub fn jar(&self) -> &CookieJar {
        self.jar.borrow()
    }

    /// Underlying jar, mutably.
    pub fn jar_mut(&mut self) -> &mut CookieJar {
        self.jar.borrow_mut()
    }

    /// Release the jar, e.g. to write the pending cookies to a response.
    pub fn into_jar(self) -> J {
        self.jar
    }

    /// Cookie name for a logical key.
    pub fn cookie_name(&self, key: &str) -> String {
        let digest = Sha256::digest(format!("{}{}{}", self.prefix, KEY_SEPARATOR, key.trim()).as_bytes());
        hex::encode(digest)
    }

    fn cookie(&self, name: String, value: String) -> Cookie {
        let same_site = self.config.same_site();

        Cookie {
            name,
            value,
            expires: (self.config.cookie_expires > 0)
                .then(|| Utc::now() + Duration::seconds(self.config.cookie_expires)),
            domain: self.config.cookie_domain.clone(),
            path: self.config.cookie_path.clone(),
            secure: self.config.cookie_secure || same_site == SameSite::None,
            http_only: true,
            same_site,
        }
    }

    fn remove(&mut self, name: String) {
        let cookie = self.cookie(name, String::new());
        self.jar_mut().remove(cookie);
    }

    fn layout(&self, name: &str) -> Layout {
        let Some(raw) = self.jar().get(&control_name(name)) else {
            return Layout::Single;
        };

        match raw.trim().parse::<usize>() {
            Ok(count) if (1..=MAX_FRAGMENTS).contains(&count) => Layout::Chunked(count),
            _ => Layout::Corrupt,
        }
    }

    /// Fragment names after `keep` left behind by a previous write.
    ///
    /// A corrupt control cookie says nothing about how many fragments exist,
    /// so only fragments actually present up to the cap are returned.
    fn stale_fragments(&self, name: &str, layout: Layout, keep: usize) -> Vec<String> {
        let last = match layout {
            Layout::Single => return Vec::new(),
            Layout::Chunked(count) => count,
            Layout::Corrupt => MAX_FRAGMENTS,
        };

        (keep + 1..=last)
            .map(|index| fragment_name(name, index))
            .filter(|fragment| layout != Layout::Corrupt || self.jar().contains(fragment))
            .collect()
    }

    /// Remove the control cookie and every fragment of a chunked value.
    fn remove_fragments(&mut self, name: &str, layout: Layout) {
        if layout == Layout::Single {
            return;
        }

        self.remove(control_name(name));
        for fragment in self.stale_fragments(name, layout, 0) {
            self.remove(fragment);
        }
    }

    fn read_sealed(&self, name: &str) -> Option<String> {
        let jar = self.jar();

        let count = match self.layout(name) {
            Layout::Single => return jar.get(name).map(str::to_string),
            Layout::Chunked(count) => count,
            Layout::Corrupt => {
                warn!(cookie = %name, "Discarding cookie with invalid fragment count");
                return None;
            }
        };

        let mut sealed = String::with_capacity(count * CHUNK_THRESHOLD);
        for index in 1..=count {
            let Some(fragment) = jar.get(&fragment_name(name, index)) else {
                warn!(cookie = %name, fragment = index, count, "Discarding cookie with missing fragment");
                return None;
            };
            sealed.push_str(fragment);
        }
        Some(sealed)
    }
}

impl<J> Store for CookieStore<J>
where
    J: BorrowMut<CookieJar>,
{
    fn get(&self, key: &str) -> Option<Value> {
        let encryption = self.key.as_ref()?;
        let name = self.cookie_name(key);
        let sealed = self.read_sealed(&name)?;

        let Some(plaintext) = encryption.open(name.as_bytes(), &sealed) else {
            warn!(cookie = %name, "Discarding cookie that failed decryption");
            return None;
        };

        match serde_json::from_slice(&plaintext) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(cookie = %name, error = %e, "Discarding cookie with unreadable payload");
                None
            }
        }
    }

    fn set(&mut self, key: &str, value: Value) -> IdentityResult<()> {
        let encryption = self
            .key
            .as_ref()
            .ok_or_else(|| IdentityError::configuration("Cookie secret must be configured to store values"))?;

        let name = self.cookie_name(key);
        let plaintext = serde_json::to_vec(&value)
            .map_err(|e| IdentityError::configuration(format!("Failed to serialize cookie value: {}", e)))?;
        let sealed = encryption.seal(name.as_bytes(), &plaintext)?;
        let previous = self.layout(&name);

        let Some(fragments) = chunk(&sealed) else {
            debug!(cookie = %name, size = sealed.len(), "Writing unchunked cookie");
            let cookie = self.cookie(name.clone(), sealed);
            self.jar_mut().add(cookie);
            self.remove_fragments(&name, previous);
            return Ok(());
        };

        if fragments.len() > MAX_FRAGMENTS {
            return Err(IdentityError::storage(format!(
                "Cookie value of {} bytes exceeds the {} byte limit",
                sealed.len(),
                MAX_SEALED_LEN
            )));
        }
        debug!(cookie = %name, size = sealed.len(), fragments = fragments.len(), "Writing chunked cookie");

        if self.jar().contains(&name) {
            self.remove(name.clone());
        }

        let count = fragments.len();
        let control = self.cookie(control_name(&name), count.to_string());
        self.jar_mut().add(control);
        for (offset, fragment) in fragments.into_iter().enumerate() {
            let cookie = self.cookie(fragment_name(&name, offset + 1), fragment);
            self.jar_mut().add(cookie);
        }
        for fragment in self.stale_fragments(&name, previous, count) {
            self.remove(fragment);
        }

        Ok(())
    }

    fn delete(&mut self, key: &str) {
        let name = self.cookie_name(key);

        let layout = self.layout(&name);
        self.remove_fragments(&name, layout);
        self.remove(name);
    }
}

impl<J> fmt::Debug for CookieStore<J>
where
    J: BorrowMut<CookieJar>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieStore")
            .field("prefix", &self.prefix)
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .field("pending", &self.jar().pending().len())
            .finish()
    }
}

/// How a value is laid out across the jar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// No control cookie; the value, if any, is under the base name
    Single,
    /// Control cookie with a count in `1..=MAX_FRAGMENTS`
    Chunked(usize),
    /// Control cookie with any other content
    Corrupt,
}

fn control_name(name: &str) -> String {
    fragment_name(name, 0)
}

fn fragment_name(name: &str, index: usize) -> String {
    format!("{}_{}", name, index)
}

/// Fragments for a sealed value, `None` when it fits in a single cookie.
fn chunk(sealed: &str) -> Option<Vec<String>> {
    (sealed.len() >= CHUNK_THRESHOLD).then(|| {
        split_fragments(sealed, CHUNK_THRESHOLD)
            .into_iter()
            .map(str::to_string)
            .collect()
    })
}

/// Split an ASCII string into `size`-byte fragments.
fn split_fragments(value: &str, size: usize) -> Vec<&str> {
    value
        .as_bytes()
        .chunks(size)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect()
}
