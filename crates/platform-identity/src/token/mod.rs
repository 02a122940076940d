//! Token parsing, verification and validation
//!
//! A [`Token`] is built per verification attempt from a compact JWT:
//!
//! 1. [`Token::parse`] decodes the header, claims and signature.
//! 2. [`Token::verify`] resolves the algorithm and key and checks the
//!    signature.
//! 3. [`Token::validate`] runs the [`ClaimsValidator`] chain.
//!
//! Every failure is an [`InvalidTokenError`] with a specific reason.
//!
//! # Example
//!
//! ```rust,no_run
//! use platform_identity::token::{Token, TokenType, ValidationOptions, VerifyOptions};
//! use platform_identity::config::TokenAlgorithm;
//! use platform_identity::jwks::KeyProvider;
//!
//! # async fn example(compact: &str) -> platform_identity::IdentityResult<()> {
//! let keys = KeyProvider::with_defaults()?;
//! let token = Token::parse(TokenType::IdToken, compact)?;
//!
//! token
//!     .verify(
//!         &keys,
//!         &VerifyOptions::new()
//!             .with_algorithm(TokenAlgorithm::RS256)
//!             .with_jwks_uri("https://tenant.example.com/.well-known/jwks.json"),
//!     )
//!     .await?;
//! token.validate(&ValidationOptions::new(
//!     "https://tenant.example.com/",
//!     vec!["client-id".to_string()],
//! ))?;
//!
//! println!("subject: {:?}", token.subject());
//! # Ok(())
//! # }
//! ```

pub mod claims;
pub mod parser;
pub mod validator;
pub mod verifier;

pub use claims::Claims;
pub use parser::ParsedToken;
pub use validator::{ClaimsValidator, ValidationOptions};
pub use verifier::{SignatureVerifier, VerificationKey};

use crate::config::{TokenAlgorithm, DEFAULT_CACHE_TTL};
use crate::error::{IdentityError, IdentityResult, InvalidTokenError};
use crate::jwks::KeyProvider;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, instrument};

/// Kind of token being checked; selects the mandatory claim rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// OpenID Connect ID token
    #[default]
    IdToken,

    /// OAuth 2.0 access token
    AccessToken,
}

/// Inputs for signature verification.
#[derive(Clone)]
pub struct VerifyOptions {
    /// Required algorithm; `None` accepts the header's allow-listed algorithm
    pub algorithm: Option<TokenAlgorithm>,

    /// Key set location for RS256
    pub jwks_uri: Option<String>,

    /// Shared secret for HS256
    pub client_secret: Option<String>,

    /// Key set cache lifetime
    pub cache_ttl: Duration,
}

impl std::fmt::Debug for VerifyOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifyOptions")
            .field("algorithm", &self.algorithm)
            .field("jwks_uri", &self.jwks_uri)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            algorithm: None,
            jwks_uri: None,
            client_secret: None,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl VerifyOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require an algorithm.
    pub fn with_algorithm(mut self, algorithm: TokenAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Set the key set location.
    pub fn with_jwks_uri(mut self, uri: impl Into<String>) -> Self {
        self.jwks_uri = Some(uri.into());
        self
    }

    /// Set the HS256 secret.
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Set the key set cache lifetime.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }
}

/// A decoded JWT.
#[derive(Debug, Clone)]
pub struct Token {
    token_type: TokenType,
    parsed: ParsedToken,
    claims: Claims,
}

impl Token {
    /// Decode a compact JWT.
    pub fn parse(token_type: TokenType, compact: &str) -> IdentityResult<Self> {
        let parsed = ParsedToken::parse(compact)?;
        let claims = Claims::new(parsed.claims().clone());
        Ok(Self {
            token_type,
            parsed,
            claims,
        })
    }

    /// Resolve the effective algorithm against the header.
    ///
    /// A required algorithm must match the header exactly; otherwise the
    /// header's algorithm is used if it is in the allow-list.
    pub fn resolve_algorithm(&self, required: Option<TokenAlgorithm>) -> Result<TokenAlgorithm, InvalidTokenError> {
        let declared = self.parsed.algorithm().unwrap_or_default();

        match required {
            Some(required) if declared == required.as_str() => Ok(required),
            Some(required) => Err(InvalidTokenError::AlgorithmMismatch {
                expected: required.to_string(),
                found: declared.to_string(),
            }),
            None => TokenAlgorithm::parse(declared)
                .ok_or_else(|| InvalidTokenError::UnsupportedAlgorithm(declared.to_string())),
        }
    }

    /// Verify the signature.
    ///
    /// RS256 keys are resolved through `keys` using the header `kid`; HS256
    /// uses `options.client_secret`.
    ///
    /// # Errors
    ///
    /// - [`IdentityError::InvalidToken`] for algorithm, key or signature
    ///   failures
    /// - [`IdentityError::Configuration`] if RS256 is used without a JWKS URI
    #[instrument(skip(self, keys, options), fields(token_type = ?self.token_type))]
    pub async fn verify(&self, keys: &KeyProvider, options: &VerifyOptions) -> IdentityResult<&Self> {
        let algorithm = self.resolve_algorithm(options.algorithm)?;
        let signing_input = self.parsed.signing_input();
        let signature = self.parsed.signature();

        match algorithm {
            TokenAlgorithm::RS256 => {
                let key_id = self.parsed.key_id().ok_or(InvalidTokenError::MissingKeyId)?;
                let jwks_uri = options
                    .jwks_uri
                    .as_deref()
                    .ok_or_else(|| IdentityError::configuration("JWKS URI is required for RS256 verification"))?;

                let jwk = keys.get_key(jwks_uri, key_id, options.cache_ttl).await?;
                SignatureVerifier::verify(signing_input, signature, algorithm, VerificationKey::Jwk(&jwk))?;
            }
            TokenAlgorithm::HS256 => {
                let secret = options
                    .client_secret
                    .as_deref()
                    .ok_or(InvalidTokenError::MissingClientSecret)?;
                SignatureVerifier::verify(signing_input, signature, algorithm, VerificationKey::Secret(secret.as_bytes()))?;
            }
        }

        debug!(algorithm = %algorithm, "Token signature verified");
        Ok(self)
    }

    /// Run the claim validation chain for this token's type.
    pub fn validate(&self, options: &ValidationOptions) -> IdentityResult<&Self> {
        ClaimsValidator::for_token(self.token_type, options).validate(&self.claims, options)?;
        Ok(self)
    }

    /// Token type.
    pub fn token_type(&self) -> TokenType {
        self.token_type
    }

    /// JOSE header fields.
    pub fn headers(&self) -> &Map<String, Value> {
        self.parsed.header()
    }

    /// Decoded claims.
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Audience, normalized to a list.
    pub fn audience(&self) -> Option<Vec<String>> {
        self.claims.audience()
    }

    /// Authorized party (`azp`).
    pub fn authorized_party(&self) -> Option<&str> {
        self.claims.authorized_party()
    }

    /// Authentication time (`auth_time`).
    pub fn auth_time(&self) -> Option<i64> {
        self.claims.auth_time()
    }

    /// Expiration (`exp`).
    pub fn expiration(&self) -> Option<i64> {
        self.claims.expiration()
    }

    /// Issued at (`iat`).
    pub fn issued_at(&self) -> Option<i64> {
        self.claims.issued_at()
    }

    /// Issuer (`iss`).
    pub fn issuer(&self) -> Option<&str> {
        self.claims.issuer()
    }

    /// Nonce (`nonce`).
    pub fn nonce(&self) -> Option<&str> {
        self.claims.nonce()
    }

    /// Organization ID (`org_id`).
    pub fn organization_id(&self) -> Option<&str> {
        self.claims.organization_id()
    }

    /// Organization name (`org_name`).
    pub fn organization_name(&self) -> Option<&str> {
        self.claims.organization_name()
    }

    /// Subject (`sub`).
    pub fn subject(&self) -> Option<&str> {
        self.claims.subject()
    }

    /// Export the claims map.
    pub fn to_map(&self) -> Map<String, Value> {
        self.claims.to_map()
    }

    /// Export the claims as JSON.
    pub fn to_json(&self) -> String {
        self.claims.to_json()
    }

    /// Consume the token, keeping only its claims.
    pub fn into_claims(self) -> Claims {
        self.claims
    }
}
