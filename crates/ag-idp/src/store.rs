//! Browser Session Store Adapter
//!
//! The sign-in flow has to survive two redirects (out to the provider and
//! back), so its ephemeral state lives in a per-browser-session key/value
//! store. This module defines the adapter contract; the gateway supplies the
//! cookie-backed implementation, tests use [`MemorySession`].

use std::collections::HashMap;

/// Well-known session keys written by the sign-in flow.
///
/// Everything under these keys is session-scoped secret material: it never
/// appears in logs or user-facing responses.
pub mod keys {
    /// CSRF state bound to the pending authorization request
    pub const STATE: &str = "state";
    /// Nonce echoed back inside the ID token
    pub const NONCE: &str = "nonce";
    /// PKCE code verifier (the challenge goes to the provider, this stays here)
    pub const CODE_VERIFIER: &str = "code_verifier";
    /// Redirect URI the pending authorization was issued for
    pub const REDIRECT_URI: &str = "redirect_uri";
    /// ID token from the last successful code exchange
    pub const ID_TOKEN: &str = "id_token";
    /// Access token for the userinfo endpoint
    pub const ACCESS_TOKEN: &str = "access_token";
    /// Refresh token, stored but never used silently
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// Access token expiry as unix seconds
    pub const EXPIRES_AT: &str = "expires_at";
}

/// Key/value store scoped to one browser session.
///
/// All operations are infallible from the caller's perspective: a missing
/// key reads as `None`, never an error. Implementations mutate an in-memory
/// session object; persisting it (e.g. re-issuing the cookie) is the
/// framework layer's job after the request completes.
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str);
    fn clear(&mut self);
}

/// In-memory session store, primarily for tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    values: HashMap<String, String>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SessionStore for MemorySession {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_reads_as_none() {
        let session = MemorySession::new();
        assert_eq!(session.get("absent"), None);
    }

    #[test]
    fn put_get_remove_round_trip() {
        let mut session = MemorySession::new();
        session.put(keys::STATE, "abc123".to_string());
        assert_eq!(session.get(keys::STATE).as_deref(), Some("abc123"));

        session.remove(keys::STATE);
        assert_eq!(session.get(keys::STATE), None);
        // Removing again is a no-op, not an error
        session.remove(keys::STATE);
    }

    #[test]
    fn clear_empties_the_session() {
        let mut session = MemorySession::new();
        session.put(keys::ID_TOKEN, "jwt".to_string());
        session.put(keys::ACCESS_TOKEN, "at".to_string());
        session.clear();
        assert!(session.is_empty());
    }
}
