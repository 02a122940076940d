//! End-to-end tests for token decoding against a remote key set.
//!
//! A wiremock server publishes the fixture JWKS and tokens are minted with the
//! matching RSA key, so every test runs the real `ReqwestFetcher`, the
//! in-memory key set cache and the full validation chain.
//!
//! Scenarios:
//! 1. Valid ID and access tokens decode, with one key set fetch per TTL
//! 2. Rotated keys are picked up by a single refetch
//! 3. Unreachable or failing key set endpoints reject the token
//! 4. Signature, algorithm and claim failures report their reason

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use platform_identity::{
    DecodeOptions, IdentityError, InvalidTokenError, KeyProvider, SdkConfiguration, TokenAlgorithm,
    TokenDecoder,
};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRIVATE_KEY: &[u8] = include_bytes!("fixtures/rsa_private.pem");
const JWKS: &str = include_str!("fixtures/jwks.json");
const KEY_ID: &str = "test-key-1";
const JWKS_PATH: &str = "/.well-known/jwks.json";
const ISSUER: &str = "https://tenant.example.com/";
const CLIENT_ID: &str = "client-abc";

/// Test fixture providing a key set server and a configured decoder.
struct TestFixture {
    /// Mock key set server.
    server: MockServer,
    /// Decoder pointed at the mock server.
    decoder: TokenDecoder,
}

impl TestFixture {
    /// Create a fixture without any mounted mocks.
    async fn new() -> Self {
        let server = MockServer::start().await;

        let config = SdkConfiguration::new("tenant.example.com", CLIENT_ID)
            .with_token_algorithm(TokenAlgorithm::RS256)
            .with_jwks_uri(format!("{}{}", server.uri(), JWKS_PATH));
        let decoder = TokenDecoder::new(Arc::new(config), KeyProvider::with_defaults().unwrap()).unwrap();

        Self { server, decoder }
    }

    /// Create a fixture serving the fixture key set.
    async fn serving_jwks() -> Self {
        let fixture = Self::new().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(JWKS))
            .mount(&fixture.server)
            .await;
        fixture
    }

    /// Number of key set requests received so far.
    async fn fetch_count(&self) -> usize {
        self.server.received_requests().await.map(|r| r.len()).unwrap_or(0)
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn sign_rs256(claims: &Value, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    jsonwebtoken::encode(&header, claims, &EncodingKey::from_rsa_pem(PRIVATE_KEY).unwrap()).unwrap()
}

fn id_token_claims() -> Value {
    json!({
        "iss": ISSUER,
        "aud": CLIENT_ID,
        "sub": "user|42",
        "exp": now() + 3600,
        "iat": now(),
        "nonce": "nonce-1",
        "auth_time": now() - 30,
    })
}

fn access_token_claims() -> Value {
    json!({
        "iss": ISSUER,
        "aud": [CLIENT_ID, "https://api.example.com/"],
        "sub": "user|42",
        "exp": now() + 3600,
        "scope": "openid profile",
    })
}

fn expect_invalid(result: Result<platform_identity::Claims, IdentityError>) -> InvalidTokenError {
    match result {
        Err(IdentityError::InvalidToken(reason)) => reason,
        other => panic!("expected invalid token, got {:?}", other),
    }
}

// ============================================================================
// Successful decoding
// ============================================================================

#[tokio::test]
async fn test_decode_id_token() {
    let fixture = TestFixture::serving_jwks().await;
    let token = sign_rs256(&id_token_claims(), Some(KEY_ID));

    let claims = fixture
        .decoder
        .decode(&token, &DecodeOptions::id_token().with_nonce("nonce-1").with_max_age(300))
        .await
        .unwrap();

    assert_eq!(claims.subject(), Some("user|42"));
    assert_eq!(claims.nonce(), Some("nonce-1"));
    assert_eq!(claims.issuer(), Some(ISSUER));
}

#[tokio::test]
async fn test_decode_access_token_with_multiple_audiences() {
    let fixture = TestFixture::serving_jwks().await;
    let token = sign_rs256(&access_token_claims(), Some(KEY_ID));

    let claims = fixture
        .decoder
        .decode(&token, &DecodeOptions::access_token())
        .await
        .unwrap();

    assert_eq!(claims.get("scope"), Some(&json!("openid profile")));
    assert_eq!(claims.audience().unwrap().len(), 2);
}

#[tokio::test]
async fn test_key_set_fetched_once_within_ttl() {
    let fixture = TestFixture::serving_jwks().await;

    for _ in 0..3 {
        let token = sign_rs256(&id_token_claims(), Some(KEY_ID));
        fixture.decoder.decode(&token, &DecodeOptions::id_token()).await.unwrap();
    }

    assert_eq!(fixture.fetch_count().await, 1);
}

// ============================================================================
// Key rotation
// ============================================================================

#[tokio::test]
async fn test_rotated_key_picked_up_by_refetch() {
    let fixture = TestFixture::new().await;
    let stale = JWKS.replace(KEY_ID, "retired-key");

    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(stale))
        .up_to_n_times(1)
        .mount(&fixture.server)
        .await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(JWKS))
        .mount(&fixture.server)
        .await;

    let token = sign_rs256(&id_token_claims(), Some(KEY_ID));

    let first = fixture.decoder.decode(&token, &DecodeOptions::id_token()).await;
    assert_eq!(expect_invalid(first), InvalidTokenError::KeyNotFound(KEY_ID.to_string()));

    let second = fixture.decoder.decode(&token, &DecodeOptions::id_token()).await;
    assert!(second.is_ok());
    assert_eq!(fixture.fetch_count().await, 2);
}

#[tokio::test]
async fn test_unknown_key_id_refetches_once_per_attempt() {
    let fixture = TestFixture::serving_jwks().await;
    let token = sign_rs256(&id_token_claims(), Some("unknown-key"));

    for attempt in 1..=2 {
        let result = fixture.decoder.decode(&token, &DecodeOptions::id_token()).await;
        assert_eq!(
            expect_invalid(result),
            InvalidTokenError::KeyNotFound("unknown-key".to_string())
        );
        assert_eq!(fixture.fetch_count().await, attempt);
    }
}

// ============================================================================
// Key set endpoint failures
// ============================================================================

#[tokio::test]
async fn test_key_set_endpoint_error_status() {
    let fixture = TestFixture::new().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&fixture.server)
        .await;

    let token = sign_rs256(&id_token_claims(), Some(KEY_ID));
    let result = fixture.decoder.decode(&token, &DecodeOptions::id_token()).await;

    assert!(matches!(expect_invalid(result), InvalidTokenError::KeySetUnavailable(_)));
}

#[tokio::test]
async fn test_key_set_endpoint_invalid_document() {
    let fixture = TestFixture::new().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&fixture.server)
        .await;

    let token = sign_rs256(&id_token_claims(), Some(KEY_ID));
    let result = fixture.decoder.decode(&token, &DecodeOptions::id_token()).await;

    assert!(matches!(expect_invalid(result), InvalidTokenError::KeySetUnavailable(_)));
}

// ============================================================================
// Rejected tokens
// ============================================================================

#[tokio::test]
async fn test_tampered_claims_rejected() {
    let fixture = TestFixture::serving_jwks().await;
    let token = sign_rs256(&id_token_claims(), Some(KEY_ID));
    let other = sign_rs256(&json!({"iss": ISSUER, "aud": CLIENT_ID, "sub": "admin"}), Some(KEY_ID));

    let parts: Vec<&str> = token.split('.').collect();
    let other_parts: Vec<&str> = other.split('.').collect();
    let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

    let result = fixture.decoder.decode(&forged, &DecodeOptions::id_token()).await;
    assert_eq!(expect_invalid(result), InvalidTokenError::InvalidSignature);
}

#[tokio::test]
async fn test_missing_key_id_rejected() {
    let fixture = TestFixture::serving_jwks().await;
    let token = sign_rs256(&id_token_claims(), None);

    let result = fixture.decoder.decode(&token, &DecodeOptions::id_token()).await;
    assert_eq!(expect_invalid(result), InvalidTokenError::MissingKeyId);
    assert_eq!(fixture.fetch_count().await, 0);
}

#[tokio::test]
async fn test_hs256_token_rejected_when_rs256_required() {
    let fixture = TestFixture::serving_jwks().await;
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &id_token_claims(),
        &EncodingKey::from_secret(b"attacker-controlled-secret"),
    )
    .unwrap();

    let result = fixture.decoder.decode(&token, &DecodeOptions::id_token()).await;
    assert!(matches!(
        expect_invalid(result),
        InvalidTokenError::AlgorithmMismatch { .. }
    ));
    assert_eq!(fixture.fetch_count().await, 0);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let fixture = TestFixture::serving_jwks().await;
    let mut claims = id_token_claims();
    claims["exp"] = json!(now() - 3600);

    let result = fixture
        .decoder
        .decode(&sign_rs256(&claims, Some(KEY_ID)), &DecodeOptions::id_token())
        .await;
    assert!(matches!(expect_invalid(result), InvalidTokenError::Expired { .. }));
}

#[tokio::test]
async fn test_wrong_issuer_rejected() {
    let fixture = TestFixture::serving_jwks().await;
    let mut claims = id_token_claims();
    claims["iss"] = json!("https://evil.example.com/");

    let result = fixture
        .decoder
        .decode(&sign_rs256(&claims, Some(KEY_ID)), &DecodeOptions::id_token())
        .await;
    assert!(matches!(
        expect_invalid(result),
        InvalidTokenError::IssuerMismatch { .. }
    ));
}

#[tokio::test]
async fn test_nonce_mismatch_rejected() {
    let fixture = TestFixture::serving_jwks().await;
    let token = sign_rs256(&id_token_claims(), Some(KEY_ID));

    let result = fixture
        .decoder
        .decode(&token, &DecodeOptions::id_token().with_nonce("nonce-2"))
        .await;
    assert!(matches!(
        expect_invalid(result),
        InvalidTokenError::NonceMismatch { .. }
    ));
}

#[tokio::test]
async fn test_stale_authentication_rejected() {
    let fixture = TestFixture::serving_jwks().await;
    let mut claims = id_token_claims();
    claims["auth_time"] = json!(now() - 7200);

    let result = fixture
        .decoder
        .decode(
            &sign_rs256(&claims, Some(KEY_ID)),
            &DecodeOptions::id_token().with_max_age(600),
        )
        .await;
    assert!(matches!(
        expect_invalid(result),
        InvalidTokenError::AuthTimeExceeded { .. }
    ));
}
