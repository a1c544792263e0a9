//! Machine-to-Machine Token Broker
//!
//! Exchanges client credentials for a short-lived bearer token scoped to the
//! provider's management API. The base broker is deliberately stateless:
//! every call is a fresh network round trip. [`CachedTokenBroker`] layers an
//! expiry-aware cache on top for callers that want to amortize exchanges.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use std::time::Duration as StdDuration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};

/// Client credentials and target audience for the management API grant.
#[derive(Debug, Clone)]
pub struct BrokerOptions {
    /// Provider base endpoint, e.g. "https://auth.example.com"
    pub endpoint: String,
    /// M2M application ID
    pub app_id: String,
    /// M2M application secret
    pub app_secret: String,
    /// Resource indicator for the management API audience
    pub resource: String,
    /// Requested scope, normally "all"
    pub scope: String,
    /// Outbound request timeout
    pub timeout: StdDuration,
}

impl BrokerOptions {
    pub fn token_endpoint(&self) -> String {
        format!("{}/oidc/token", self.endpoint.trim_end_matches('/'))
    }
}

/// Result of one client-credentials exchange.
///
/// A non-2xx answer from the provider is NOT an error here: the decoded body
/// is surfaced in `raw` so callers can branch on provider-specific error
/// shapes (e.g. "resource indicator is missing, or unknown").
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// Bearer token, present when the provider granted the request
    pub access_token: Option<String>,
    /// Expiry instant derived from `expires_in`, when granted
    pub expires_at: Option<DateTime<Utc>>,
    /// Decoded response body, verbatim
    pub raw: serde_json::Value,
}

impl TokenGrant {
    /// The bearer token, or an authentication error carrying the provider's
    /// refusal body.
    pub fn bearer(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .ok_or_else(|| Error::authentication(format!("token grant refused: {}", self.raw)))
    }
}

/// Stateless client-credentials broker.
pub struct TokenBroker {
    options: BrokerOptions,
    http: reqwest::Client,
}

impl TokenBroker {
    pub fn new(options: BrokerOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { options, http })
    }

    /// Exchange client credentials for a management API token.
    ///
    /// Fails fast with a configuration error when either credential is empty,
    /// before any network traffic.
    pub async fn fetch_access_token(&self) -> Result<TokenGrant> {
        if self.options.app_id.is_empty() || self.options.app_secret.is_empty() {
            return Err(Error::configuration(
                "m2m app_id and app_secret must be set",
            ));
        }

        let credential = STANDARD.encode(format!(
            "{}:{}",
            self.options.app_id, self.options.app_secret
        ));

        let params = [
            ("grant_type", "client_credentials"),
            ("resource", self.options.resource.as_str()),
            ("scope", self.options.scope.as_str()),
        ];

        let response = self
            .http
            .post(self.options.token_endpoint())
            .header(reqwest::header::AUTHORIZATION, format!("Basic {credential}"))
            .form(&params)
            .send()
            .await?;

        let raw: serde_json::Value = response.json().await?;

        let access_token = raw
            .get("access_token")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .map(String::from);
        let expires_at = access_token.as_ref().map(|_| {
            let expires_in = raw.get("expires_in").and_then(|v| v.as_i64()).unwrap_or(3600);
            Utc::now() + Duration::seconds(expires_in)
        });

        debug!(granted = access_token.is_some(), "Client credentials exchange completed");

        Ok(TokenGrant {
            access_token,
            expires_at,
            raw,
        })
    }
}

/// Safety margin subtracted from a cached token's expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedGrant {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedGrant {
    fn is_valid(&self) -> bool {
        self.expires_at > Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS)
    }
}

/// Expiry-aware cache over [`TokenBroker`].
///
/// Keyed implicitly by the broker's credential identity (one cache per
/// broker). Only successful grants are cached; refusals surface as errors.
pub struct CachedTokenBroker {
    inner: TokenBroker,
    cached: RwLock<Option<CachedGrant>>,
}

impl CachedTokenBroker {
    pub fn new(inner: TokenBroker) -> Self {
        Self {
            inner,
            cached: RwLock::new(None),
        }
    }

    /// Get a valid bearer token, performing a fresh exchange when the cached
    /// one is missing or inside the expiry margin.
    pub async fn bearer_token(&self) -> Result<String> {
        {
            let cached = self.cached.read().await;
            if let Some(ref grant) = *cached {
                if grant.is_valid() {
                    return Ok(grant.access_token.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;

        // Another task may have refreshed while we waited for the write lock
        if let Some(ref grant) = *cached {
            if grant.is_valid() {
                return Ok(grant.access_token.clone());
            }
        }

        let grant = self.inner.fetch_access_token().await?;
        let access_token = grant.bearer()?.to_string();
        let expires_at = grant
            .expires_at
            .unwrap_or_else(|| Utc::now() + Duration::seconds(3600));

        *cached = Some(CachedGrant {
            access_token: access_token.clone(),
            expires_at,
        });

        Ok(access_token)
    }

    /// Drop the cached token, forcing a fresh exchange on the next call.
    pub async fn invalidate(&self) {
        let mut cached = self.cached.write().await;
        *cached = None;
    }
}
