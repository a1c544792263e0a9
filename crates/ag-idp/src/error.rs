//! Error types for provider interactions

use thiserror::Error;

/// Result type alias for provider operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for everything that talks to the identity provider.
///
/// Upstream business outcomes (password mismatch, invalid verification code)
/// are NOT errors — they are enum values on the management client so callers
/// can pattern-match exhaustively.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or empty credential/endpoint. Fatal at startup or first use.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No session, expired session, state mismatch, or the provider denied
    /// the request. Maps to an unauthenticated response, not a crash.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Malformed provider response or an unexpected wire exchange.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Timeout or connection failure. Surfaced as-is; no automatic retry.
    #[error("Network error: {0}")]
    Network(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// True for failures where a caller may reasonably try again later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::Protocol(format!("malformed provider response: {err}"))
        } else {
            // Timeouts, connect failures and everything else transport-level.
            Error::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_are_transient() {
        assert!(Error::Network("timed out".into()).is_transient());
        assert!(!Error::Authentication("state mismatch".into()).is_transient());
        assert!(!Error::Configuration("empty secret".into()).is_transient());
    }
}
