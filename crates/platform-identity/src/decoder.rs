//! Configured token decoding.
//!
//! [`TokenDecoder`] binds an [`SdkConfiguration`] to a [`KeyProvider`] and
//! runs parse, verify and validate in one call, returning the validated
//! claims.

use crate::config::{SdkConfiguration, TokenAlgorithm};
use crate::error::IdentityResult;
use crate::jwks::KeyProvider;
use crate::token::{Claims, Token, TokenType, ValidationOptions, VerifyOptions};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Per-call decoding options.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Token type; selects the mandatory claims
    pub token_type: TokenType,

    /// Algorithm override, taking precedence over the configuration
    pub algorithm: Option<TokenAlgorithm>,

    /// Expected nonce from the login transaction
    pub nonce: Option<String>,

    /// Max-age override, taking precedence over the configuration
    pub max_age: Option<i64>,

    /// Leeway override in seconds
    pub leeway: Option<i64>,

    /// Validation clock (Unix seconds); `None` uses the current time
    pub now: Option<i64>,
}

impl DecodeOptions {
    /// Options for an ID token.
    pub fn id_token() -> Self {
        Self {
            token_type: TokenType::IdToken,
            ..Default::default()
        }
    }

    /// Options for an access token.
    pub fn access_token() -> Self {
        Self {
            token_type: TokenType::AccessToken,
            ..Default::default()
        }
    }

    /// Require an algorithm.
    pub fn with_algorithm(mut self, algorithm: TokenAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Require a nonce.
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Require a recent authentication.
    pub fn with_max_age(mut self, max_age: i64) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Override the leeway.
    pub fn with_leeway(mut self, leeway: i64) -> Self {
        self.leeway = Some(leeway);
        self
    }

    /// Pin the validation clock.
    pub fn with_now(mut self, now: i64) -> Self {
        self.now = Some(now);
        self
    }
}

/// Decodes and validates tokens for one configured tenant and client.
#[derive(Debug, Clone)]
pub struct TokenDecoder {
    config: Arc<SdkConfiguration>,
    keys: KeyProvider,
}

impl TokenDecoder {
    /// Create a decoder.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the tenant domain or audience is
    /// missing, or HS256 is required without a client secret.
    pub fn new(config: Arc<SdkConfiguration>, keys: KeyProvider) -> IdentityResult<Self> {
        config.validate()?;
        Ok(Self { config, keys })
    }

    /// Get the configuration.
    pub fn config(&self) -> &SdkConfiguration {
        &self.config
    }

    /// Build signature verification inputs for a call.
    pub fn verify_options(&self, options: &DecodeOptions) -> IdentityResult<VerifyOptions> {
        let mut verify = VerifyOptions::new().with_cache_ttl(self.config.token_cache_ttl);
        verify.algorithm = options.algorithm.or(self.config.token_algorithm);
        verify.client_secret = self.config.client_secret.clone();
        if verify.algorithm != Some(TokenAlgorithm::HS256) {
            verify.jwks_uri = Some(self.config.jwks_uri()?);
        }
        Ok(verify)
    }

    /// Build claim validation inputs for a call.
    pub fn validation_options(&self, options: &DecodeOptions) -> IdentityResult<ValidationOptions> {
        let mut validation = ValidationOptions::new(self.config.issuer()?, self.config.allowed_audiences())
            .with_organization(self.config.organization.clone())
            .with_leeway(options.leeway.unwrap_or(self.config.token_leeway));

        validation.nonce = options.nonce.clone();
        validation.now = options.now;
        if options.token_type == TokenType::IdToken {
            validation.max_age = options.max_age.or(self.config.token_max_age);
        }
        Ok(validation)
    }

    /// Parse, verify and validate a compact token.
    ///
    /// # Errors
    ///
    /// Any [`crate::InvalidTokenError`] from parsing, signature verification
    /// or claim validation, stopping at the first failure.
    #[instrument(skip(self, compact, options), fields(token_type = ?options.token_type))]
    pub async fn decode(&self, compact: &str, options: &DecodeOptions) -> IdentityResult<Claims> {
        let token = Token::parse(options.token_type, compact)?;
        token.verify(&self.keys, &self.verify_options(options)?).await?;
        token.validate(&self.validation_options(options)?)?;

        debug!(subject = ?token.subject(), "Token accepted");
        Ok(token.into_claims())
    }
}
