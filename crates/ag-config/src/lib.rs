//! AuthGate Configuration System
//!
//! TOML-based configuration with environment variable override support.
//! All settings are read once at startup; credentials for the identity
//! provider never leave this struct except into outbound requests.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub provider: ProviderConfig,
    pub m2m: M2mConfig,
    pub session: SessionConfig,

    /// Enable development mode (relaxes cookie security for plain-HTTP local runs)
    pub dev_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            provider: ProviderConfig::default(),
            m2m: M2mConfig::default(),
            session: SessionConfig::default(),
            dev_mode: false,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            cors_origins: vec!["http://localhost:4200".to_string()],
        }
    }
}

/// Identity provider configuration for the browser-facing sign-in flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider base endpoint, e.g. "https://auth.example.com"
    pub endpoint: String,
    /// Application ID registered with the provider
    pub app_id: String,
    /// Application secret for the confidential code exchange
    pub app_secret: String,
    /// Default redirect URI for the sign-in callback
    pub redirect_uri: String,
    /// Where the provider should send the browser after sign-out
    pub post_logout_redirect_uri: String,
    /// Scopes requested during sign-in
    pub scopes: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            app_id: String::new(),
            app_secret: String::new(),
            redirect_uri: "http://127.0.0.1:8080/callback".to_string(),
            post_logout_redirect_uri: "http://127.0.0.1:8080/".to_string(),
            scopes: vec![
                "openid".to_string(),
                "profile".to_string(),
                "offline_access".to_string(),
            ],
        }
    }
}

/// Machine-to-machine credentials for the provider's management API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct M2mConfig {
    /// M2M application ID
    pub app_id: String,
    /// M2M application secret
    pub app_secret: String,
    /// Resource indicator for the management API audience.
    /// Must match the API resource configured at the provider, otherwise the
    /// token endpoint answers "resource indicator is missing, or unknown".
    pub resource: String,
    /// Scope requested with the client credentials grant
    pub scope: String,
    /// Outbound request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for M2mConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            resource: "https://default.logto.app/api".to_string(),
            scope: "all".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Browser session cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub cookie_secure: bool,
    /// HMAC key protecting the session cookie from tampering
    pub secret: String,
    pub max_age_secs: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "AG_SESSION".to_string(),
            cookie_secure: true,
            secret: String::new(),
            max_age_secs: 86400, // 24 hours
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load() -> Result<Self, ConfigError> {
        let loader = ConfigLoader::new();
        loader.load()
    }

    /// Check the invariants a running server depends on.
    ///
    /// Credential and endpoint problems are fatal here rather than surfacing
    /// as confusing provider errors on the first request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.endpoint.is_empty() {
            return Err(ConfigError::ValidationError(
                "provider.endpoint must be set".into(),
            ));
        }
        if self.provider.app_id.is_empty() || self.provider.app_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "provider.app_id and provider.app_secret must be set".into(),
            ));
        }
        if self.session.secret.len() < 32 {
            return Err(ConfigError::ValidationError(
                "session.secret must be at least 32 characters".into(),
            ));
        }
        if self.m2m.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "m2m.timeout_secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# AuthGate Configuration
# Environment variables (AUTHGATE_*) override these settings

[http]
port = 8080
host = "0.0.0.0"
cors_origins = ["http://localhost:4200"]

[provider]
endpoint = "https://auth.example.com"
app_id = ""
app_secret = ""
redirect_uri = "http://127.0.0.1:8080/callback"
post_logout_redirect_uri = "http://127.0.0.1:8080/"
scopes = ["openid", "profile", "offline_access"]

[m2m]
app_id = ""
app_secret = ""
resource = "https://default.logto.app/api"
scope = "all"
timeout_secs = 60

[session]
cookie_name = "AG_SESSION"
cookie_secure = true
secret = ""  # at least 32 characters
max_age_secs = 86400

dev_mode = false
"#
        .to_string()
    }
}
