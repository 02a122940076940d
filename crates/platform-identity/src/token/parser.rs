//! Compact JWT decoding.
//!
//! Splits `header.claims.signature`, decodes each segment from URL-safe
//! base64 and parses the JSON objects. No signature or claim checks happen
//! here.

use crate::error::InvalidTokenError;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde_json::{Map, Value};

/// URL-safe base64 that accepts segments with or without padding.
const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A decoded, not yet verified, compact JWT.
#[derive(Debug, Clone)]
pub struct ParsedToken {
    header: Map<String, Value>,
    claims: Map<String, Value>,
    signature: Vec<u8>,
    signing_input: String,
}

impl ParsedToken {
    /// Parse a compact serialization.
    ///
    /// # Errors
    ///
    /// [`InvalidTokenError::Malformed`] if the token does not have exactly
    /// three segments, a segment is not valid base64url, or the header or
    /// claims are not JSON objects.
    pub fn parse(compact: &str) -> Result<Self, InvalidTokenError> {
        let compact = compact.trim();
        let segments: Vec<&str> = compact.split('.').collect();

        let [header_b64, claims_b64, signature_b64] = segments.as_slice() else {
            return Err(InvalidTokenError::Malformed(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        };

        let header = decode_object(header_b64, "header")?;
        let claims = decode_object(claims_b64, "claims")?;
        let signature = SEGMENT_ENGINE
            .decode(signature_b64)
            .map_err(|e| InvalidTokenError::Malformed(format!("signature is not valid base64url: {}", e)))?;

        Ok(Self {
            header,
            claims,
            signature,
            signing_input: format!("{}.{}", header_b64, claims_b64),
        })
    }

    /// JOSE header fields.
    pub fn header(&self) -> &Map<String, Value> {
        &self.header
    }

    /// Claims payload.
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Raw signature bytes.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// `base64url(header) "." base64url(claims)`, the bytes that were signed.
    pub fn signing_input(&self) -> &[u8] {
        self.signing_input.as_bytes()
    }

    /// Header `alg`, if it is a string.
    pub fn algorithm(&self) -> Option<&str> {
        self.header.get("alg").and_then(Value::as_str)
    }

    /// Header `kid`, if it is a string.
    pub fn key_id(&self) -> Option<&str> {
        self.header.get("kid").and_then(Value::as_str)
    }
}

fn decode_object(segment: &str, name: &str) -> Result<Map<String, Value>, InvalidTokenError> {
    let bytes = SEGMENT_ENGINE
        .decode(segment)
        .map_err(|e| InvalidTokenError::Malformed(format!("{} is not valid base64url: {}", name, e)))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(InvalidTokenError::Malformed(format!("{} is not a JSON object", name))),
        Err(e) => Err(InvalidTokenError::Malformed(format!("{} is not valid JSON: {}", name, e))),
    }
}

/// Encode bytes as an unpadded base64url segment.
pub(crate) fn encode_segment(bytes: &[u8]) -> String {
    SEGMENT_ENGINE.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(json: &str) -> String {
        encode_segment(json.as_bytes())
    }

    #[test]
    fn test_parse_valid_token() {
        let compact = format!(
            "{}.{}.{}",
            segment(r#"{"alg":"RS256","kid":"k1","typ":"JWT"}"#),
            segment(r#"{"sub":"user|1","aud":"client"}"#),
            encode_segment(b"signature-bytes")
        );

        let parsed = ParsedToken::parse(&compact).unwrap();
        assert_eq!(parsed.algorithm(), Some("RS256"));
        assert_eq!(parsed.key_id(), Some("k1"));
        assert_eq!(parsed.claims()["sub"], "user|1");
        assert_eq!(parsed.signature(), b"signature-bytes");

        let (expected_input, _) = compact.rsplit_once('.').unwrap();
        assert_eq!(parsed.signing_input(), expected_input.as_bytes());
    }

    #[test]
    fn test_wrong_segment_count() {
        for compact in ["", "a.b", "a.b.c.d", "a.b.c.d.e"] {
            assert!(matches!(
                ParsedToken::parse(compact),
                Err(InvalidTokenError::Malformed(_))
            ));
        }
    }

    #[test]
    fn test_invalid_base64() {
        let compact = format!("{}.!!!.{}", segment(r#"{"alg":"HS256"}"#), encode_segment(b"sig"));
        assert!(matches!(
            ParsedToken::parse(&compact),
            Err(InvalidTokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_invalid_json() {
        let compact = format!("{}.{}.{}", segment("{not json"), segment("{}"), encode_segment(b"sig"));
        assert!(matches!(
            ParsedToken::parse(&compact),
            Err(InvalidTokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_claims_must_be_object() {
        let compact = format!("{}.{}.{}", segment(r#"{"alg":"HS256"}"#), segment("[1,2]"), encode_segment(b"sig"));
        assert!(matches!(
            ParsedToken::parse(&compact),
            Err(InvalidTokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_padded_segments_accepted() {
        let header = base64::engine::general_purpose::URL_SAFE.encode(br#"{"alg":"HS256"}"#);
        let claims = base64::engine::general_purpose::URL_SAFE.encode(br#"{"sub":"a"}"#);
        let compact = format!("{}.{}.{}", header, claims, encode_segment(b"sig"));

        assert!(ParsedToken::parse(&compact).is_ok());
    }
}
