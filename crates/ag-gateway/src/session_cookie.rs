//! Signed Session Cookie
//!
//! The browser session is a small string map serialized to JSON and carried
//! in a single cookie as `base64url(payload).hex(hmac_sha256(payload))`.
//! The signature stops clients from editing their own session; the content
//! is not encrypted, so nothing in it may be more sensitive than the tokens
//! the browser already holds.

use std::collections::BTreeMap;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use ag_config::SessionConfig;
use ag_idp::SessionStore;

type HmacSha256 = Hmac<Sha256>;

/// One browser session's key/value map.
///
/// Decoded from the session cookie at the start of a request, mutated by the
/// sign-in flow, and written back by [`SessionCodec::write`] afterwards.
#[derive(Debug, Clone, Default)]
pub struct CookieSession {
    values: BTreeMap<String, String>,
}

impl CookieSession {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SessionStore for CookieSession {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    fn clear(&mut self) {
        self.values.clear();
    }
}

/// Encodes/decodes [`CookieSession`]s to the signed session cookie.
#[derive(Debug, Clone)]
pub struct SessionCodec {
    cookie_name: String,
    secret: Vec<u8>,
    secure: bool,
    max_age_secs: i64,
}

impl SessionCodec {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            secret: config.secret.as_bytes().to_vec(),
            secure: config.cookie_secure,
            max_age_secs: config.max_age_secs,
        }
    }

    /// Decode the session from the request's cookie jar.
    ///
    /// A missing cookie or one that fails validation reads as a fresh empty
    /// session — a tampered cookie must not crash the request.
    pub fn read(&self, jar: &CookieJar) -> CookieSession {
        let Some(cookie) = jar.get(&self.cookie_name) else {
            return CookieSession::default();
        };

        match self.decode(cookie.value()) {
            Some(values) => CookieSession { values },
            None => {
                warn!("Discarding invalid session cookie");
                CookieSession::default()
            }
        }
    }

    /// Write the session back into the jar, re-signing it.
    ///
    /// An empty session removes the cookie instead of storing an empty map.
    pub fn write(&self, jar: CookieJar, session: &CookieSession) -> CookieJar {
        if session.is_empty() {
            return jar.remove(
                Cookie::build((self.cookie_name.clone(), ""))
                    .path("/")
                    .build(),
            );
        }

        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&session.values).expect("string map always serializes"),
        );
        let value = format!("{payload}.{}", self.sign(&payload));

        let cookie = Cookie::build((self.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(self.max_age_secs))
            .build();

        jar.add(cookie)
    }

    fn decode(&self, value: &str) -> Option<BTreeMap<String, String>> {
        let (payload, signature) = value.rsplit_once('.')?;
        if !constant_time_compare(&self.sign(payload), signature) {
            return None;
        }
        let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use ag_idp::store::keys;

    fn codec() -> SessionCodec {
        SessionCodec::new(&SessionConfig {
            cookie_name: "AG_SESSION".to_string(),
            cookie_secure: false,
            secret: "0123456789abcdef0123456789abcdef".to_string(),
            max_age_secs: 3600,
        })
    }

    #[test]
    fn round_trip_preserves_the_session_map() {
        let codec = codec();
        let mut session = CookieSession::default();
        session.put(keys::STATE, "state-1".to_string());
        session.put(keys::CODE_VERIFIER, "verifier-1".to_string());

        let jar = codec.write(CookieJar::new(), &session);
        let restored = codec.read(&jar);

        assert_eq!(restored.get(keys::STATE).as_deref(), Some("state-1"));
        assert_eq!(
            restored.get(keys::CODE_VERIFIER).as_deref(),
            Some("verifier-1")
        );
    }

    #[test]
    fn missing_cookie_reads_as_empty_session() {
        let session = codec().read(&CookieJar::new());
        assert!(session.is_empty());
    }

    #[test]
    fn tampered_payload_is_discarded() {
        let codec = codec();
        let mut session = CookieSession::default();
        session.put(keys::ID_TOKEN, "jwt".to_string());

        let jar = codec.write(CookieJar::new(), &session);
        let cookie = jar.get("AG_SESSION").unwrap();

        // Flip the payload while keeping the signature
        let (_, signature) = cookie.value().rsplit_once('.').unwrap();
        let forged_payload =
            URL_SAFE_NO_PAD.encode(br#"{"id_token":"forged"}"#);
        let forged = CookieJar::new().add(Cookie::new(
            "AG_SESSION",
            format!("{forged_payload}.{signature}"),
        ));

        assert!(codec.read(&forged).is_empty());
    }

    #[test]
    fn wrong_key_is_discarded() {
        let codec_a = codec();
        let codec_b = SessionCodec::new(&SessionConfig {
            cookie_name: "AG_SESSION".to_string(),
            cookie_secure: false,
            secret: "another-secret-another-secret-32".to_string(),
            max_age_secs: 3600,
        });

        let mut session = CookieSession::default();
        session.put(keys::ID_TOKEN, "jwt".to_string());
        let jar = codec_a.write(CookieJar::new(), &session);

        assert!(codec_b.read(&jar).is_empty());
    }

    #[test]
    fn empty_session_removes_the_cookie() {
        let codec = codec();
        let mut session = CookieSession::default();
        session.put(keys::ID_TOKEN, "jwt".to_string());
        let jar = codec.write(CookieJar::new(), &session);
        assert!(jar.get("AG_SESSION").is_some());

        session.clear();
        let jar = codec.write(jar, &session);
        // The remaining cookie, if any, is a removal cookie with no value
        let live = jar.get("AG_SESSION").map(|c| c.value().to_string());
        assert!(live.map_or(true, |v| v.is_empty()));
    }
}
