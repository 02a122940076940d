//! Decoded token claims.
//!
//! [`Claims`] keeps the payload as the identity provider sent it and offers
//! typed, read-only accessors for the registered and OIDC claims the
//! validator inspects. Custom claims are reachable through [`Claims::get`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claims payload of a token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    /// Wrap a claims map.
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Raw claim value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Check whether a claim is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    fn string(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    fn timestamp(&self, name: &str) -> Option<i64> {
        let value = self.0.get(name)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
    }

    /// Audience (`aud`), normalized to a list.
    ///
    /// A single-string audience becomes a one-element list. Non-string
    /// array members are ignored.
    pub fn audience(&self) -> Option<Vec<String>> {
        match self.0.get("aud")? {
            Value::String(aud) => Some(vec![aud.clone()]),
            Value::Array(values) => Some(
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Authorized party (`azp`).
    pub fn authorized_party(&self) -> Option<&str> {
        self.string("azp")
    }

    /// Time of end-user authentication (`auth_time`).
    pub fn auth_time(&self) -> Option<i64> {
        self.timestamp("auth_time")
    }

    /// Expiration (`exp`).
    pub fn expiration(&self) -> Option<i64> {
        self.timestamp("exp")
    }

    /// Issued at (`iat`).
    pub fn issued_at(&self) -> Option<i64> {
        self.timestamp("iat")
    }

    /// Issuer (`iss`).
    pub fn issuer(&self) -> Option<&str> {
        self.string("iss")
    }

    /// Nonce (`nonce`).
    pub fn nonce(&self) -> Option<&str> {
        self.string("nonce")
    }

    /// Organization ID (`org_id`).
    pub fn organization_id(&self) -> Option<&str> {
        self.string("org_id")
    }

    /// Organization name (`org_name`).
    pub fn organization_name(&self) -> Option<&str> {
        self.string("org_name")
    }

    /// Subject (`sub`).
    pub fn subject(&self) -> Option<&str> {
        self.string("sub")
    }

    /// Borrow the full claims map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Export the full claims map.
    pub fn to_map(&self) -> Map<String, Value> {
        self.0.clone()
    }

    /// Export the claims as a JSON string.
    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    /// Consume into the claims map.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
