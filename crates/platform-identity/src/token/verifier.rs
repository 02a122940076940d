//! Token signature verification.
//!
//! RS256 signatures are checked with `jsonwebtoken` against a public key
//! taken from the tenant key set. HS256 signatures are recomputed with the
//! client secret and compared in constant time.

use super::parser::encode_segment;
use crate::config::TokenAlgorithm;
use crate::error::InvalidTokenError;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk};
use jsonwebtoken::{Algorithm, DecodingKey};
use ring::hmac;

/// Key material for a verification.
#[derive(Clone, Copy)]
pub enum VerificationKey<'a> {
    /// Public key from a key set
    Jwk(&'a Jwk),
    /// Shared secret
    Secret(&'a [u8]),
}

impl std::fmt::Debug for VerificationKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationKey::Jwk(jwk) => f.debug_tuple("Jwk").field(&jwk.common.key_id).finish(),
            VerificationKey::Secret(_) => f.debug_tuple("Secret").field(&"[REDACTED]").finish(),
        }
    }
}

/// Verifies token signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Verify `signature` over `signing_input`.
    ///
    /// # Errors
    ///
    /// [`InvalidTokenError::InvalidSignature`] when the signature does not
    /// verify or the key cannot be used with `algorithm`.
    pub fn verify(
        signing_input: &[u8],
        signature: &[u8],
        algorithm: TokenAlgorithm,
        key: VerificationKey<'_>,
    ) -> Result<(), InvalidTokenError> {
        match (algorithm, key) {
            (TokenAlgorithm::RS256, VerificationKey::Jwk(jwk)) => verify_rs256(signing_input, signature, jwk),
            (TokenAlgorithm::HS256, VerificationKey::Secret(secret)) => {
                let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
                hmac::verify(&key, signing_input, signature).map_err(|_| InvalidTokenError::InvalidSignature)
            }
            _ => Err(InvalidTokenError::InvalidSignature),
        }
    }
}

fn verify_rs256(signing_input: &[u8], signature: &[u8], jwk: &Jwk) -> Result<(), InvalidTokenError> {
    if !matches!(jwk.algorithm, AlgorithmParameters::RSA(_)) {
        return Err(InvalidTokenError::InvalidSignature);
    }

    let key = DecodingKey::from_jwk(jwk).map_err(|_| InvalidTokenError::InvalidSignature)?;
    match jsonwebtoken::crypto::verify(&encode_segment(signature), signing_input, &key, Algorithm::RS256) {
        Ok(true) => Ok(()),
        Ok(false) | Err(_) => Err(InvalidTokenError::InvalidSignature),
    }
}
