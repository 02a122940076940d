//! Authenticated encryption of stored values.
//!
//! Values are sealed with AES-256-GCM under a key derived from the cookie
//! secret. The cookie name is bound as associated data so a ciphertext cannot
//! be replayed under a different name. The sealed form is
//! `base64(json({"iv", "tag", "data"}))` with each field base64 encoded.

use crate::error::{IdentityError, IdentityResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Sealed value as stored.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    iv: String,
    tag: String,
    data: String,
}

/// AES-256-GCM key derived from a secret.
pub struct EnvelopeKey {
    key: LessSafeKey,
}

impl EnvelopeKey {
    /// Derive a key as `SHA-256(secret)`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the secret is empty.
    pub fn derive(secret: &str) -> IdentityResult<Self> {
        if secret.is_empty() {
            return Err(IdentityError::configuration("cookie secret must not be empty"));
        }

        let digest = Sha256::digest(secret.as_bytes());
        let unbound = UnboundKey::new(&AES_256_GCM, &digest)
            .map_err(|_| IdentityError::configuration("failed to initialize cookie encryption key"))?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
        })
    }

    /// Encrypt `plaintext`, binding `aad`.
    pub fn seal(&self, aad: &[u8], plaintext: &[u8]) -> IdentityResult<String> {
        let mut iv = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let mut data = plaintext.to_vec();
        let tag = self
            .key
            .seal_in_place_separate_tag(Nonce::assume_unique_for_key(iv), Aad::from(aad), &mut data)
            .map_err(|_| IdentityError::configuration("failed to encrypt cookie value"))?;

        let envelope = Envelope {
            iv: STANDARD.encode(iv),
            tag: STANDARD.encode(tag.as_ref()),
            data: STANDARD.encode(&data),
        };
        let json = serde_json::to_vec(&envelope)
            .map_err(|e| IdentityError::configuration(format!("failed to encode cookie value: {}", e)))?;

        Ok(STANDARD.encode(json))
    }

    /// Decrypt a sealed value.
    ///
    /// Returns `None` for anything that does not decode or authenticate.
    pub fn open(&self, aad: &[u8], sealed: &str) -> Option<Vec<u8>> {
        let json = STANDARD.decode(sealed.trim()).ok()?;
        let envelope: Envelope = serde_json::from_slice(&json).ok()?;

        let iv = STANDARD.decode(&envelope.iv).ok()?;
        let nonce = Nonce::try_assume_unique_for_key(&iv).ok()?;

        let mut in_out = STANDARD.decode(&envelope.data).ok()?;
        in_out.extend_from_slice(&STANDARD.decode(&envelope.tag).ok()?);

        let plaintext = self.key.open_in_place(nonce, Aad::from(aad), &mut in_out).ok()?;
        Some(plaintext.to_vec())
    }
}

impl fmt::Debug for EnvelopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeKey")
            .field("algorithm", &"AES-256-GCM")
            .field("key", &"[REDACTED]")
            .finish()
    }
}
