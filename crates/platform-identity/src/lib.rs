//! # Platform Identity
//!
//! Client-side identity core for the Relay platform: verification of tokens
//! issued by the identity provider, and encrypted cookie storage for session
//! and login-flow state.
//!
//! ## Overview
//!
//! The platform-identity crate handles:
//! - **Tokens**: compact JWT parsing, RS256/HS256 signature verification and
//!   the claims validation chain (issuer, audience, expiry, nonce, max age,
//!   organization)
//! - **Key sets**: JWKS retrieval with a TTL cache and a single refetch when
//!   the provider rotates keys
//! - **Cookie storage**: AES-256-GCM sealed values, chunked across cookies
//!   when they outgrow the per-cookie size limit
//! - **Transient state**: single-use nonce, state and PKCE verifier values
//!
//! ## Features
//!
//! - `reqwest` (default): [`ReqwestFetcher`] for key set retrieval
//!
//! ## Usage
//!
//! ### Decoding an ID token
//!
//! ```rust,no_run
//! use platform_identity::{DecodeOptions, KeyProvider, SdkConfiguration, TokenDecoder};
//! use std::sync::Arc;
//!
//! # async fn example(id_token: &str) -> platform_identity::IdentityResult<()> {
//! let config = Arc::new(SdkConfiguration::from_env());
//! let decoder = TokenDecoder::new(config, KeyProvider::with_defaults()?)?;
//!
//! let claims = decoder
//!     .decode(id_token, &DecodeOptions::id_token().with_nonce("expected-nonce"))
//!     .await?;
//! println!("signed in: {:?}", claims.subject());
//! # Ok(())
//! # }
//! ```
//!
//! ### Session cookies
//!
//! ```rust,no_run
//! use platform_identity::{CookieJar, CookieStore, SdkConfiguration, Store};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # fn example(cookie_header: &str) -> platform_identity::IdentityResult<()> {
//! let config = Arc::new(SdkConfiguration::from_env());
//! let mut store = CookieStore::session(config, CookieJar::from_header(cookie_header));
//!
//! store.set("user", json!({"sub": "user|1"}))?;
//!
//! for cookie in store.jar_mut().take_pending() {
//!     println!("Set-Cookie: {}", cookie.to_header_value());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod decoder;
pub mod error;
pub mod http;
pub mod jwks;
pub mod store;
pub mod token;

// Re-export main types
pub use cache::{KeySetCache, MemoryCache};
pub use config::{ResponseMode, SdkConfiguration, TokenAlgorithm};
pub use decoder::{DecodeOptions, TokenDecoder};
pub use error::{IdentityError, IdentityResult, InvalidTokenError};
pub use http::{HttpFetcher, HttpResponse};
pub use jwks::KeyProvider;
pub use store::{Cookie, CookieJar, CookieStore, MemoryStore, SameSite, Store, TransientStore};
pub use token::{Claims, ClaimsValidator, Token, TokenType, ValidationOptions, VerifyOptions};

#[cfg(feature = "reqwest")]
pub use http::ReqwestFetcher;
