//! Error types for token verification and SDK configuration
//!
//! This module defines the errors surfaced by the identity core. Token
//! failures carry a distinguishable [`InvalidTokenError`] reason so callers
//! and tests can tell an expired token from an audience mismatch. Cookie
//! reads never produce errors; see [`crate::store::CookieStore`].

use thiserror::Error;

/// Identity core error types.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Token is malformed, unverifiable, or failed a claim check
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] InvalidTokenError),

    /// Required configuration is missing or unusable
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Value cannot be persisted by the store
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;

impl IdentityError {
    /// Shorthand for a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        IdentityError::Configuration(message.into())
    }

    /// Shorthand for a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        IdentityError::Storage(message.into())
    }

    /// Check if this error should be logged at error level.
    ///
    /// Rejected tokens are expected traffic; configuration and storage
    /// errors are defects on our side.
    pub fn is_server_error(&self) -> bool {
        matches!(self, IdentityError::Configuration(_) | IdentityError::Storage(_))
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            IdentityError::InvalidToken(_) => 401,
            IdentityError::Configuration(_) | IdentityError::Storage(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            IdentityError::InvalidToken(reason) => reason.error_code(),
            IdentityError::Configuration(_) => "CONFIG_ERROR",
            IdentityError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Borrow the token failure reason, if this is a token error.
    pub fn invalid_token(&self) -> Option<&InvalidTokenError> {
        match self {
            IdentityError::InvalidToken(reason) => Some(reason),
            IdentityError::Configuration(_) | IdentityError::Storage(_) => None,
        }
    }
}

/// Reason a token was rejected.
///
/// Every structural, cryptographic and claim check fails with its own
/// variant. Validation stops at the first failing check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTokenError {
    /// Compact serialization could not be decoded
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Algorithm is not in the allow-list
    #[error("Signature algorithm \"{0}\" is not supported")]
    UnsupportedAlgorithm(String),

    /// Header algorithm differs from the one required by configuration
    #[error("Signature algorithm mismatch; expected \"{expected}\", found \"{found}\"")]
    AlgorithmMismatch {
        /// Algorithm required by the verifier
        expected: String,
        /// Algorithm declared by the token header
        found: String,
    },

    /// RS256 token without a `kid` header
    #[error("Key ID (kid) header must be present for asymmetric tokens")]
    MissingKeyId,

    /// HS256 token with no client secret configured
    #[error("Client secret must be configured to verify HS256 tokens")]
    MissingClientSecret,

    /// Key set does not contain the requested key ID
    #[error("Signing key \"{0}\" not found in key set")]
    KeyNotFound(String),

    /// Key set could not be fetched or decoded
    #[error("Key set unavailable: {0}")]
    KeySetUnavailable(String),

    /// Signature did not verify
    #[error("Token signature could not be verified")]
    InvalidSignature,

    /// `iss` claim absent
    #[error("Issuer (iss) claim must be a string present in the token")]
    MissingIssuer,

    /// `iss` claim differs from the expected issuer
    #[error("Issuer (iss) claim mismatch; expected \"{expected}\", found \"{found}\"")]
    IssuerMismatch {
        /// Configured issuer
        expected: String,
        /// Issuer claimed by the token
        found: String,
    },

    /// `aud` claim absent
    #[error("Audience (aud) claim must be a string or array of strings present in the token")]
    MissingAudience,

    /// No overlap between presented and allowed audiences
    #[error("Audience (aud) claim mismatch; expected one of \"{expected}\", found \"{found}\"")]
    AudienceMismatch {
        /// Allowed audiences, comma separated
        expected: String,
        /// Audiences in the token, comma separated
        found: String,
    },

    /// `exp` claim absent
    #[error("Expiration (exp) claim must be a number present in the token")]
    MissingExpiration,

    /// Token lifetime has elapsed
    #[error("Expiration (exp) claim error; current time ({now}) is after expiration time ({expires}) with {leeway}s leeway")]
    Expired {
        /// Validation clock
        now: i64,
        /// `exp` claim
        expires: i64,
        /// Tolerance applied
        leeway: i64,
    },

    /// `sub` claim absent
    #[error("Subject (sub) claim must be a string present in the token")]
    MissingSubject,

    /// `iat` claim absent
    #[error("Issued At (iat) claim must be a number present in the token")]
    MissingIssuedAt,

    /// Multi-audience token without `azp`
    #[error("Authorized Party (azp) claim must be a string present in the token when Audience (aud) claim has multiple values")]
    MissingAuthorizedParty,

    /// `azp` is not one of the allowed audiences
    #[error("Authorized Party (azp) claim mismatch; expected one of \"{expected}\", found \"{found}\"")]
    AuthorizedPartyMismatch {
        /// Allowed audiences, comma separated
        expected: String,
        /// `azp` claim
        found: String,
    },

    /// `nonce` expected but absent
    #[error("Nonce (nonce) claim must be a string present in the token")]
    MissingNonce,

    /// `nonce` differs from the expected value
    #[error("Nonce (nonce) claim mismatch; expected \"{expected}\", found \"{found}\"")]
    NonceMismatch {
        /// Nonce issued for this login
        expected: String,
        /// Nonce claimed by the token
        found: String,
    },

    /// `auth_time` required by max-age but absent
    #[error("Authentication Time (auth_time) claim must be a number present in the token when Max Age is specified")]
    MissingAuthTime,

    /// End-user authentication is too old
    #[error("Authentication Time (auth_time) claim indicates that too much time has passed since the last end-user authentication; current time ({now}) is after last auth at ({valid_until})")]
    AuthTimeExceeded {
        /// Validation clock
        now: i64,
        /// `auth_time + max_age + leeway`
        valid_until: i64,
    },

    /// Organization filtering requested but neither `org_id` nor `org_name` present
    #[error("Organization (org_id or org_name) claim must be a string present in the token")]
    MissingOrganization,

    /// Organization claim not in the allowed set
    #[error("Organization claim mismatch; expected one of \"{expected}\", found \"{found}\"")]
    OrganizationMismatch {
        /// Allowed organizations, comma separated
        expected: String,
        /// Organization claimed by the token
        found: String,
    },
}

impl InvalidTokenError {
    /// Stable machine-readable code for each rejection reason.
    pub fn error_code(&self) -> &'static str {
        match self {
            InvalidTokenError::Malformed(_) => "MALFORMED_TOKEN",
            InvalidTokenError::UnsupportedAlgorithm(_) => "UNSUPPORTED_ALGORITHM",
            InvalidTokenError::AlgorithmMismatch { .. } => "ALGORITHM_MISMATCH",
            InvalidTokenError::MissingKeyId => "MISSING_KEY_ID",
            InvalidTokenError::MissingClientSecret => "MISSING_CLIENT_SECRET",
            InvalidTokenError::KeyNotFound(_) => "KEY_NOT_FOUND",
            InvalidTokenError::KeySetUnavailable(_) => "KEY_SET_UNAVAILABLE",
            InvalidTokenError::InvalidSignature => "INVALID_SIGNATURE",
            InvalidTokenError::MissingIssuer => "MISSING_ISSUER",
            InvalidTokenError::IssuerMismatch { .. } => "ISSUER_MISMATCH",
            InvalidTokenError::MissingAudience => "MISSING_AUDIENCE",
            InvalidTokenError::AudienceMismatch { .. } => "AUDIENCE_MISMATCH",
            InvalidTokenError::MissingExpiration => "MISSING_EXPIRATION",
            InvalidTokenError::Expired { .. } => "TOKEN_EXPIRED",
            InvalidTokenError::MissingSubject => "MISSING_SUBJECT",
            InvalidTokenError::MissingIssuedAt => "MISSING_ISSUED_AT",
            InvalidTokenError::MissingAuthorizedParty => "MISSING_AUTHORIZED_PARTY",
            InvalidTokenError::AuthorizedPartyMismatch { .. } => "AUTHORIZED_PARTY_MISMATCH",
            InvalidTokenError::MissingNonce => "MISSING_NONCE",
            InvalidTokenError::NonceMismatch { .. } => "NONCE_MISMATCH",
            InvalidTokenError::MissingAuthTime => "MISSING_AUTH_TIME",
            InvalidTokenError::AuthTimeExceeded { .. } => "AUTH_TIME_EXCEEDED",
            InvalidTokenError::MissingOrganization => "MISSING_ORGANIZATION",
            InvalidTokenError::OrganizationMismatch { .. } => "ORGANIZATION_MISMATCH",
        }
    }
}
