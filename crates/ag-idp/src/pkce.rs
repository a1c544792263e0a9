//! PKCE and state/nonce generation for the authorization code flow

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;
use sha2::{Digest, Sha256};

fn random_urlsafe(bytes: usize) -> String {
    let bytes: Vec<u8> = (0..bytes).map(|_| rand::thread_rng().gen()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Random CSRF state parameter binding an authorization request to its callback.
pub fn generate_state() -> String {
    random_urlsafe(32)
}

/// Random nonce echoed back inside the ID token.
pub fn generate_nonce() -> String {
    random_urlsafe(32)
}

/// Random PKCE code verifier.
///
/// 48 random bytes encode to 64 URL-safe characters, inside the 43-128
/// range RFC 7636 requires.
pub fn generate_code_verifier() -> String {
    random_urlsafe(48)
}

/// S256 code challenge for a verifier: `BASE64URL(SHA256(verifier))`.
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}
