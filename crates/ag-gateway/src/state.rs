//! Shared gateway state

use std::sync::Arc;
use std::time::Duration;

use ag_config::AppConfig;
use ag_idp::{ManagementClient, ProviderOptions, Result, TokenBroker};

use crate::session_cookie::SessionCodec;

/// Everything the route handlers need, built once at startup.
///
/// Per-request state (the browser session) is NOT here: a fresh
/// session-scoped client is constructed inside each handler from this shared
/// configuration plus the request's own cookie.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<AppConfig>,
    pub provider: Arc<ProviderOptions>,
    pub http: reqwest::Client,
    pub broker: Arc<TokenBroker>,
    pub management: Arc<ManagementClient>,
    pub sessions: Arc<SessionCodec>,
}

impl GatewayState {
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.m2m.timeout_secs);

        let provider = ProviderOptions {
            endpoint: config.provider.endpoint.clone(),
            app_id: config.provider.app_id.clone(),
            app_secret: config.provider.app_secret.clone(),
            scopes: config.provider.scopes.clone(),
        };

        let broker = TokenBroker::new(ag_idp::BrokerOptions {
            endpoint: config.provider.endpoint.clone(),
            app_id: config.m2m.app_id.clone(),
            app_secret: config.m2m.app_secret.clone(),
            resource: config.m2m.resource.clone(),
            scope: config.m2m.scope.clone(),
            timeout,
        })?;

        let management = ManagementClient::new(&config.provider.endpoint, timeout)?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ag_idp::Error::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        // Dev mode runs over plain HTTP, where a Secure cookie would vanish
        let mut session_config = config.session.clone();
        if config.dev_mode {
            session_config.cookie_secure = false;
        }
        let sessions = SessionCodec::new(&session_config);

        Ok(Self {
            config: Arc::new(config),
            provider: Arc::new(provider),
            http,
            broker: Arc::new(broker),
            management: Arc::new(management),
            sessions: Arc::new(sessions),
        })
    }
}
