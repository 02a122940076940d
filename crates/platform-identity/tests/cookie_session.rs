//! End-to-end tests for cookie-backed session state.
//!
//! Each test drives the stores through full request cycles: cookies are
//! rendered as `Set-Cookie` headers at the end of one request and replayed
//! as a `Cookie` header at the start of the next, the way a browser would.

use platform_identity::{
    Cookie, CookieJar, CookieStore, ResponseMode, SdkConfiguration, Store, TransientStore,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Minimal browser cookie storage.
#[derive(Default)]
struct Browser {
    cookies: BTreeMap<String, String>,
}

impl Browser {
    /// Apply the response's `Set-Cookie` headers.
    fn receive(&mut self, set_cookies: &[Cookie]) {
        for cookie in set_cookies {
            let header = cookie.to_header_value();
            let (pair, _attributes) = header.split_once(';').unwrap_or((header.as_str(), ""));
            let (name, value) = pair.split_once('=').unwrap();

            if cookie.is_removal() {
                self.cookies.remove(name);
            } else {
                self.cookies.insert(name.to_string(), value.to_string());
            }
        }
    }

    /// `Cookie` request header.
    fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Start a request.
    fn request(&self) -> CookieJar {
        CookieJar::from_header(&self.cookie_header())
    }
}

fn config() -> Arc<SdkConfiguration> {
    Arc::new(
        SdkConfiguration::new("tenant.example.com", "client-abc")
            .with_cookie_secret("integration-cookie-secret")
            .with_cookie_secure(true)
            .with_cookie_expires(86_400),
    )
}

fn profile(padding: usize) -> Value {
    json!({
        "user": {"sub": "user|42", "name": "Ada", "bio": "x".repeat(padding)},
        "idToken": "eyJhbGciOiJSUzI1NiJ9.e30.sig",
        "accessTokenScope": ["openid", "profile"],
    })
}

#[test]
fn test_session_survives_request_cycle() {
    let mut browser = Browser::default();

    for padding in [100, 4096, 10_000] {
        let mut session = CookieStore::session(config(), browser.request());
        session.set("state", profile(padding)).unwrap();
        browser.receive(&session.into_jar().take_pending());

        let session = CookieStore::session(config(), browser.request());
        assert_eq!(session.get("state"), Some(profile(padding)), "{} bytes", padding);
    }
}

#[test]
fn test_growing_and_shrinking_session_leaves_no_stale_cookies() {
    let mut browser = Browser::default();

    let mut session = CookieStore::session(config(), browser.request());
    session.set("state", profile(10_000)).unwrap();
    browser.receive(&session.into_jar().take_pending());
    let chunked = browser.cookies.len();
    assert!(chunked > 2);

    let mut session = CookieStore::session(config(), browser.request());
    session.set("state", profile(100)).unwrap();
    browser.receive(&session.into_jar().take_pending());
    assert_eq!(browser.cookies.len(), 1);

    let session = CookieStore::session(config(), browser.request());
    assert_eq!(session.get("state"), Some(profile(100)));
}

#[test]
fn test_logout_clears_chunked_session() {
    let mut browser = Browser::default();

    let mut session = CookieStore::session(config(), browser.request());
    session.set("state", profile(10_000)).unwrap();
    browser.receive(&session.into_jar().take_pending());

    let mut session = CookieStore::session(config(), browser.request());
    session.delete("state");
    browser.receive(&session.into_jar().take_pending());

    assert!(browser.cookies.is_empty());
    let session = CookieStore::session(config(), browser.request());
    assert_eq!(session.get_or("state", json!(null)), json!(null));
}

#[test]
fn test_cookie_from_other_secret_is_ignored() {
    let mut browser = Browser::default();

    let other = Arc::new(SdkConfiguration::new("tenant.example.com", "client-abc").with_cookie_secret("rotated"));
    let mut session = CookieStore::session(other, browser.request());
    session.set("state", profile(100)).unwrap();
    browser.receive(&session.into_jar().take_pending());

    let session = CookieStore::session(config(), browser.request());
    assert_eq!(session.get("state"), None);
}

#[test]
fn test_set_cookie_attributes() {
    let form_post = Arc::new(
        SdkConfiguration::new("tenant.example.com", "client-abc")
            .with_cookie_secret("integration-cookie-secret")
            .with_cookie_domain("app.example.com")
            .with_response_mode(ResponseMode::FormPost),
    );
    let mut session = CookieStore::session(form_post, CookieJar::new());
    session.set("state", json!({"sub": "user|42"})).unwrap();

    let pending = session.into_jar().take_pending();
    let header = pending[0].to_header_value();
    assert!(header.contains("; Domain=app.example.com"));
    assert!(header.contains("; Path=/"));
    assert!(header.contains("; Secure"));
    assert!(header.contains("; HttpOnly"));
    assert!(header.ends_with("; SameSite=None"));
    assert!(!header.contains("Expires="));

    let mut session = CookieStore::session(config(), CookieJar::new());
    session.set("state", json!({"sub": "user|42"})).unwrap();
    let header = session.into_jar().take_pending()[0].to_header_value();
    assert!(header.contains("; Expires="));
    assert!(header.ends_with("; SameSite=Lax"));
}

#[test]
fn test_login_flow_transient_values() {
    let mut browser = Browser::default();

    // Login redirect
    let mut jar = browser.request();
    let (nonce, challenge) = {
        let mut transient = TransientStore::new(CookieStore::transient(config(), &mut jar));
        let nonce = transient.issue("nonce").unwrap();
        transient.issue("state").unwrap();
        let challenge = transient.issue_code_verifier("code_verifier").unwrap();
        transient.store("max_age", 300).unwrap();
        (nonce, challenge)
    };
    browser.receive(&jar.take_pending());
    assert_eq!(browser.cookies.len(), 4);
    assert!(!challenge.is_empty());

    // Callback
    let mut jar = browser.request();
    {
        let mut transient = TransientStore::new(CookieStore::transient(config(), &mut jar));
        assert_eq!(transient.get_once_str("nonce"), Some(nonce));
        assert!(transient.get_once_str("code_verifier").is_some());
        assert_eq!(transient.get_once("max_age"), Some(json!(300)));
        transient.purge(&["state"]);
    }
    browser.receive(&jar.take_pending());
    assert!(browser.cookies.is_empty());
}
