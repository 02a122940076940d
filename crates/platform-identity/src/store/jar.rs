//! Request/response cookie state.
//!
//! A [`CookieJar`] is created from the request's cookies at the start of a
//! request, accumulates outgoing cookies while the request is handled, and is
//! drained with [`CookieJar::take_pending`] when the response is written.
//! Reads see the request cookies overlaid with pending writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SameSite {
    /// Sent only on same-site requests
    Strict,
    /// Sent on same-site requests and top-level navigations
    #[default]
    Lax,
    /// Sent on all requests; requires `Secure`
    None,
}

impl SameSite {
    /// Attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// An outgoing cookie with its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name
    pub name: String,

    /// Cookie value
    pub value: String,

    /// Expiry; `None` is a session cookie
    pub expires: Option<DateTime<Utc>>,

    /// `Domain` attribute
    pub domain: Option<String>,

    /// `Path` attribute
    pub path: String,

    /// `Secure` attribute
    pub secure: bool,

    /// `HttpOnly` attribute
    pub http_only: bool,

    /// `SameSite` attribute
    pub same_site: SameSite,
}

impl Cookie {
    /// Create a session cookie with default attributes.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires: None,
            domain: None,
            path: "/".to_string(),
            secure: false,
            http_only: true,
            same_site: SameSite::Lax,
        }
    }

    /// Turn this cookie into an expired, empty overwrite.
    pub fn into_removal(mut self) -> Self {
        self.value = String::new();
        self.expires = Some(DateTime::<Utc>::from(std::time::UNIX_EPOCH));
        self
    }

    /// Check whether this cookie instructs the client to discard it.
    pub fn is_removal(&self) -> bool {
        self.expires.is_some_and(|expires| expires <= Utc::now())
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let mut header = format!("{}={}", self.name, self.value);

        if let Some(expires) = self.expires {
            header.push_str("; Expires=");
            header.push_str(&expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
        }
        if let Some(domain) = &self.domain {
            header.push_str("; Domain=");
            header.push_str(domain);
        }
        header.push_str("; Path=");
        header.push_str(&self.path);
        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        header.push_str("; SameSite=");
        header.push_str(self.same_site.as_str());

        header
    }
}

/// Cookies visible to, and emitted by, one request.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    current: HashMap<String, String>,
    pending: Vec<Cookie>,
}

impl CookieJar {
    /// Create an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a jar from request cookie pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            current: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            pending: Vec::new(),
        }
    }

    /// Create a jar from a request `Cookie` header.
    ///
    /// Pairs without `=` are ignored.
    pub fn from_header(header: &str) -> Self {
        Self::from_pairs(header.split(';').filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        }))
    }

    /// Current value of a cookie.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.current.get(name).map(String::as_str)
    }

    /// Check whether a cookie is currently present.
    pub fn contains(&self, name: &str) -> bool {
        self.current.contains_key(name)
    }

    /// Names of currently present cookies.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.current.keys().map(String::as_str)
    }

    /// Queue a cookie for the response and reflect it in reads.
    ///
    /// A later write to the same name replaces an earlier pending one.
    pub fn add(&mut self, cookie: Cookie) {
        if cookie.is_removal() {
            self.current.remove(&cookie.name);
        } else {
            self.current.insert(cookie.name.clone(), cookie.value.clone());
        }
        self.pending.retain(|queued| queued.name != cookie.name);
        self.pending.push(cookie);
    }

    /// Queue an expired overwrite for a cookie.
    pub fn remove(&mut self, cookie: Cookie) {
        self.add(cookie.into_removal());
    }

    /// Cookies queued for the response.
    pub fn pending(&self) -> &[Cookie] {
        &self.pending
    }

    /// Drain the queued cookies for writing to the response.
    pub fn take_pending(&mut self) -> Vec<Cookie> {
        std::mem::take(&mut self.pending)
    }
}
