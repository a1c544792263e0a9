//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "authgate.toml",
    "./config/config.toml",
    "/etc/authgate/config.toml",
];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        // Start with defaults
        let mut config = AppConfig::default();

        // Try to load from file
        if let Some(path) = self.find_config_file() {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        // Apply environment variable overrides
        self.apply_env_overrides(&mut config);

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(&self) -> Option<PathBuf> {
        // Check explicit path first
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        // Check AUTHGATE_CONFIG env var
        if let Ok(path) = env::var("AUTHGATE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // Search standard paths
        for path in CONFIG_PATHS {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, config: &mut AppConfig) {
        // HTTP
        if let Ok(val) = env::var("AUTHGATE_HTTP_PORT") {
            if let Ok(port) = val.parse() {
                config.http.port = port;
            }
        }
        if let Ok(val) = env::var("AUTHGATE_HTTP_HOST") {
            config.http.host = val;
        }
        if let Ok(val) = env::var("AUTHGATE_CORS_ORIGINS") {
            config.http.cors_origins = val.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Provider (browser-facing application)
        if let Ok(val) = env::var("AUTHGATE_PROVIDER_ENDPOINT") {
            config.provider.endpoint = val;
        }
        if let Ok(val) = env::var("AUTHGATE_PROVIDER_APP_ID") {
            config.provider.app_id = val;
        }
        if let Ok(val) = env::var("AUTHGATE_PROVIDER_APP_SECRET") {
            config.provider.app_secret = val;
        }
        if let Ok(val) = env::var("AUTHGATE_PROVIDER_REDIRECT_URI") {
            config.provider.redirect_uri = val;
        }
        if let Ok(val) = env::var("AUTHGATE_PROVIDER_POST_LOGOUT_REDIRECT_URI") {
            config.provider.post_logout_redirect_uri = val;
        }
        if let Ok(val) = env::var("AUTHGATE_PROVIDER_SCOPES") {
            config.provider.scopes = val.split(',').map(|s| s.trim().to_string()).collect();
        }

        // M2M (management API application)
        if let Ok(val) = env::var("AUTHGATE_M2M_APP_ID") {
            config.m2m.app_id = val;
        }
        if let Ok(val) = env::var("AUTHGATE_M2M_APP_SECRET") {
            config.m2m.app_secret = val;
        }
        if let Ok(val) = env::var("AUTHGATE_M2M_RESOURCE") {
            config.m2m.resource = val;
        }
        if let Ok(val) = env::var("AUTHGATE_M2M_SCOPE") {
            config.m2m.scope = val;
        }
        if let Ok(val) = env::var("AUTHGATE_M2M_TIMEOUT_SECS") {
            if let Ok(timeout) = val.parse() {
                config.m2m.timeout_secs = timeout;
            }
        }

        // Session
        if let Ok(val) = env::var("AUTHGATE_SESSION_COOKIE_NAME") {
            config.session.cookie_name = val;
        }
        if let Ok(val) = env::var("AUTHGATE_SESSION_COOKIE_SECURE") {
            config.session.cookie_secure = val.parse().unwrap_or(true);
        }
        if let Ok(val) = env::var("AUTHGATE_SESSION_SECRET") {
            config.session.secret = val;
        }
        if let Ok(val) = env::var("AUTHGATE_SESSION_MAX_AGE_SECS") {
            if let Ok(age) = val.parse() {
                config.session.max_age_secs = age;
            }
        }

        // General
        if let Ok(val) = env::var("AUTHGATE_DEV_MODE") {
            config.dev_mode = val.parse().unwrap_or(false);
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
