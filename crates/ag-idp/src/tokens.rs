//! Token endpoint response and ID token claim handling
//!
//! The ID token arrives on the confidential back channel over TLS, so its
//! claims are decoded without signature verification; expiry and nonce are
//! still checked. Callers that need cryptographic verification should sit
//! behind the provider's JWKS, which is out of scope here.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Response from the provider token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Audience can be a string or array
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrVec {
    String(String),
    Vec(Vec<String>),
}

impl StringOrVec {
    pub fn contains(&self, value: &str) -> bool {
        match self {
            StringOrVec::String(s) => s == value,
            StringOrVec::Vec(v) => v.iter().any(|s| s == value),
        }
    }
}

/// Standard OIDC ID token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer
    pub iss: String,
    /// Subject (unique user ID at the provider)
    pub sub: String,
    /// Audience (client ID)
    pub aud: StringOrVec,
    /// Expiration (unix seconds)
    pub exp: i64,
    /// Issued at
    pub iat: i64,
    /// Nonce from the authorization request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Username at the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Picture URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

impl IdTokenClaims {
    /// Decode claims from the payload segment of a compact JWT.
    pub fn decode(id_token: &str) -> Result<Self> {
        let mut parts = id_token.split('.');
        let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(_header), Some(payload), Some(_signature), None) => payload,
            _ => return Err(Error::protocol("ID token is not a compact JWT")),
        };

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| Error::protocol(format!("failed to decode ID token payload: {e}")))?;

        let claims: IdTokenClaims = serde_json::from_slice(&payload_bytes)
            .map_err(|e| Error::protocol(format!("failed to parse ID token claims: {e}")))?;

        Ok(claims)
    }

    /// Check the `exp` claim against the current clock.
    pub fn is_expired(&self) -> bool {
        self.exp < Utc::now().timestamp()
    }

    /// Verify the nonce claim matches the one persisted at sign-in.
    pub fn verify_nonce(&self, expected: &str) -> Result<()> {
        if self.nonce.as_deref() != Some(expected) {
            return Err(Error::authentication("nonce mismatch"));
        }
        Ok(())
    }
}

/// Build an unsigned compact JWT around the given claims. Test helper.
#[cfg(test)]
pub(crate) fn encode_unsigned_jwt(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{header}.{payload}.sig")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims_json(exp: i64) -> serde_json::Value {
        json!({
            "iss": "https://auth.test/oidc",
            "sub": "user-42",
            "aud": "web-app",
            "exp": exp,
            "iat": exp - 3600,
            "nonce": "nonce-value",
            "name": "Test User",
        })
    }

    #[test]
    fn decode_extracts_standard_claims() {
        let exp = Utc::now().timestamp() + 3600;
        let token = encode_unsigned_jwt(&claims_json(exp));
        let claims = IdTokenClaims::decode(&token).unwrap();
        assert_eq!(claims.sub, "user-42");
        assert!(claims.aud.contains("web-app"));
        assert!(!claims.is_expired());
    }

    #[test]
    fn decode_rejects_malformed_token() {
        assert!(matches!(
            IdTokenClaims::decode("not-a-jwt"),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            IdTokenClaims::decode("a.b.c.d"),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn expired_token_is_detected() {
        let token = encode_unsigned_jwt(&claims_json(Utc::now().timestamp() - 60));
        let claims = IdTokenClaims::decode(&token).unwrap();
        assert!(claims.is_expired());
    }

    #[test]
    fn nonce_mismatch_is_an_authentication_error() {
        let exp = Utc::now().timestamp() + 3600;
        let claims = IdTokenClaims::decode(&encode_unsigned_jwt(&claims_json(exp))).unwrap();
        assert!(claims.verify_nonce("nonce-value").is_ok());
        assert!(matches!(
            claims.verify_nonce("other"),
            Err(Error::Authentication(_))
        ));
    }

    #[test]
    fn audience_matches_string_or_array() {
        let single: StringOrVec = serde_json::from_str("\"client123\"").unwrap();
        assert!(single.contains("client123"));
        assert!(!single.contains("other"));

        let multi: StringOrVec = serde_json::from_str("[\"client1\", \"client2\"]").unwrap();
        assert!(multi.contains("client2"));
        assert!(!multi.contains("client3"));
    }
}
