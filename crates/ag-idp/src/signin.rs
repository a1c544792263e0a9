//! User-Facing OIDC Sign-In Session
//!
//! Drives the authorization code flow for a single browser session:
//! build the sign-in redirect, complete the callback (code exchange + token
//! persistence), answer "is this session authenticated", fetch the user
//! projection, and sign out.
//!
//! Flow:
//! 1. `sign_in` - persist state/nonce/verifier, redirect browser to the provider
//! 2. User authenticates at the provider
//! 3. `handle_callback` - validate state, exchange code, persist tokens
//! 4. `fetch_user_info` / `is_authenticated` on later requests
//! 5. `sign_out` - clear the session, redirect to the provider end-session page

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::pkce;
use crate::store::{keys, SessionStore};
use crate::tokens::{IdTokenClaims, TokenResponse};

/// Provider settings for the browser-facing application.
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// Provider base endpoint, e.g. "https://auth.example.com"
    pub endpoint: String,
    /// Application ID
    pub app_id: String,
    /// Application secret (confidential client)
    pub app_secret: String,
    /// Scopes requested at sign-in
    pub scopes: Vec<String>,
}

impl ProviderOptions {
    fn base(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    pub fn authorization_endpoint(&self) -> String {
        format!("{}/oidc/auth", self.base())
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/oidc/token", self.base())
    }

    pub fn userinfo_endpoint(&self) -> String {
        format!("{}/oidc/me", self.base())
    }

    pub fn end_session_endpoint(&self) -> String {
        format!("{}/oidc/session/end", self.base())
    }
}

/// User projection returned by the provider userinfo endpoint.
///
/// Provider-defined claims beyond the standard set are passed through in
/// `claims` rather than dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    /// Subject: the user's unique ID at the provider
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number_verified: Option<bool>,
    /// Remaining provider-defined claims
    #[serde(flatten)]
    pub claims: HashMap<String, serde_json::Value>,
}

/// Session-scoped OIDC client handle.
///
/// Built fresh per request from shared configuration, a shared HTTP client,
/// and the request's own session store. Holds no process-wide state, so two
/// browser sessions never see each other's tokens.
///
/// Note: the state read/match sequence is not guarded against concurrent
/// requests within the same session. Two tabs racing `sign_in` leave only the
/// later tab's pending request valid; the earlier callback fails closed.
pub struct SignInSession<'a, S: SessionStore> {
    options: &'a ProviderOptions,
    http: &'a reqwest::Client,
    store: &'a mut S,
}

impl<'a, S: SessionStore> SignInSession<'a, S> {
    pub fn new(options: &'a ProviderOptions, http: &'a reqwest::Client, store: &'a mut S) -> Self {
        Self {
            options,
            http,
            store,
        }
    }

    /// Begin a sign-in attempt and return the provider authorization URL.
    ///
    /// Always generates a fresh state/nonce/verifier triple, so calling this
    /// again invalidates any earlier pending attempt in the same session.
    pub fn sign_in(&mut self, redirect_uri: &str) -> String {
        let state = pkce::generate_state();
        let nonce = pkce::generate_nonce();
        let code_verifier = pkce::generate_code_verifier();
        let code_challenge = pkce::generate_code_challenge(&code_verifier);

        self.store.put(keys::STATE, state.clone());
        self.store.put(keys::NONCE, nonce.clone());
        self.store.put(keys::CODE_VERIFIER, code_verifier);
        self.store.put(keys::REDIRECT_URI, redirect_uri.to_string());

        let scope = self.options.scopes.join(" ");
        let url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&nonce={}&code_challenge={}&code_challenge_method=S256&prompt=consent",
            self.options.authorization_endpoint(),
            urlencoding::encode(&self.options.app_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&state),
            urlencoding::encode(&nonce),
            urlencoding::encode(&code_challenge),
        );

        debug!(redirect_uri = %redirect_uri, "Prepared sign-in authorization request");
        url
    }

    /// Complete the callback leg: validate state, exchange the code, persist
    /// tokens, and clear the pending authorization request.
    pub async fn handle_callback(&mut self, callback_url: &str) -> Result<()> {
        let url = reqwest::Url::parse(callback_url)
            .map_err(|e| Error::protocol(format!("invalid callback URL: {e}")))?;

        let params: HashMap<String, String> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if let Some(error) = params.get("error") {
            let description = params
                .get("error_description")
                .map(String::as_str)
                .unwrap_or("");
            warn!(error = %error, description = %description, "Provider returned an error on callback");
            return Err(Error::authentication(format!(
                "provider returned {error}: {description}"
            )));
        }

        let code = params
            .get("code")
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::protocol("no authorization code in callback"))?;

        let callback_state = params
            .get("state")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::authentication("no state parameter in callback"))?;

        let expected_state = self
            .store
            .get(keys::STATE)
            .ok_or_else(|| Error::authentication("no pending sign-in for this session"))?;

        if *callback_state != expected_state {
            warn!("Callback state does not match the pending sign-in");
            return Err(Error::authentication("state mismatch"));
        }

        let code_verifier = self
            .store
            .get(keys::CODE_VERIFIER)
            .ok_or_else(|| Error::authentication("no code verifier for this session"))?;
        let redirect_uri = self
            .store
            .get(keys::REDIRECT_URI)
            .ok_or_else(|| Error::authentication("no redirect URI for this session"))?;

        let tokens = self.exchange_code(code, &code_verifier, &redirect_uri).await?;

        let id_token = tokens
            .id_token
            .as_deref()
            .ok_or_else(|| Error::protocol("no ID token in token response"))?;

        let claims = IdTokenClaims::decode(id_token)?;
        if claims.is_expired() {
            return Err(Error::authentication("ID token is already expired"));
        }
        if let Some(nonce) = self.store.get(keys::NONCE) {
            claims.verify_nonce(&nonce)?;
        }

        let expires_at = Utc::now().timestamp() + tokens.expires_in.unwrap_or(3600);

        self.store.put(keys::ID_TOKEN, id_token.to_string());
        self.store.put(keys::ACCESS_TOKEN, tokens.access_token);
        if let Some(refresh_token) = tokens.refresh_token {
            self.store.put(keys::REFRESH_TOKEN, refresh_token);
        }
        self.store.put(keys::EXPIRES_AT, expires_at.to_string());

        self.store.remove(keys::STATE);
        self.store.remove(keys::NONCE);
        self.store.remove(keys::CODE_VERIFIER);
        self.store.remove(keys::REDIRECT_URI);

        info!(sub = %claims.sub, "Sign-in completed");
        Ok(())
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", &self.options.app_id),
            ("client_secret", &self.options.app_secret),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .http
            .post(self.options.token_endpoint())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.is_client_error() {
                return Err(Error::authentication(format!(
                    "token endpoint refused the code exchange ({status}): {body}"
                )));
            }
            return Err(Error::protocol(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        Ok(response.json().await?)
    }

    /// True iff the session holds an ID token whose recorded expiry is still
    /// in the future. Expired tokens are not refreshed here.
    pub fn is_authenticated(&self) -> bool {
        if self.store.get(keys::ID_TOKEN).is_none() {
            return false;
        }
        match self.store.get(keys::EXPIRES_AT).and_then(|v| v.parse::<i64>().ok()) {
            Some(expires_at) => expires_at > Utc::now().timestamp(),
            None => false,
        }
    }

    /// Fetch the user projection from the provider userinfo endpoint.
    ///
    /// Fails with an authentication error when the session is not signed in;
    /// callers treat that as "no current user", not a hard failure.
    pub async fn fetch_user_info(&self) -> Result<UserInfo> {
        if !self.is_authenticated() {
            return Err(Error::authentication("session is not signed in"));
        }

        let access_token = self
            .store
            .get(keys::ACCESS_TOKEN)
            .ok_or_else(|| Error::authentication("no access token in session"))?;

        let response = self
            .http
            .get(self.options.userinfo_endpoint())
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(Error::authentication(format!(
                    "provider rejected the access token: {body}"
                )));
            }
            return Err(Error::protocol(format!(
                "userinfo endpoint returned {status}: {body}"
            )));
        }

        Ok(response.json().await?)
    }

    /// Clear every session key and return the provider end-session URL for
    /// the caller to redirect to.
    pub fn sign_out(&mut self, post_logout_redirect_uri: Option<&str>) -> String {
        self.store.clear();

        let mut url = format!(
            "{}?client_id={}",
            self.options.end_session_endpoint(),
            urlencoding::encode(&self.options.app_id),
        );
        if let Some(redirect) = post_logout_redirect_uri {
            url.push_str(&format!(
                "&post_logout_redirect_uri={}",
                urlencoding::encode(redirect)
            ));
        }

        info!("Session signed out");
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySession;

    fn options() -> ProviderOptions {
        ProviderOptions {
            endpoint: "https://auth.test/".to_string(),
            app_id: "web-app".to_string(),
            app_secret: "web-secret".to_string(),
            scopes: vec!["openid".to_string(), "profile".to_string()],
        }
    }

    #[test]
    fn endpoints_derive_from_base() {
        let options = options();
        assert_eq!(options.authorization_endpoint(), "https://auth.test/oidc/auth");
        assert_eq!(options.token_endpoint(), "https://auth.test/oidc/token");
        assert_eq!(options.userinfo_endpoint(), "https://auth.test/oidc/me");
        assert_eq!(
            options.end_session_endpoint(),
            "https://auth.test/oidc/session/end"
        );
    }

    #[test]
    fn sign_in_persists_the_authorization_request() {
        let options = options();
        let http = reqwest::Client::new();
        let mut session = MemorySession::new();
        let mut client = SignInSession::new(&options, &http, &mut session);

        let url = client.sign_in("http://127.0.0.1:8080/callback");

        let state = session.get(keys::STATE).unwrap();
        assert!(session.get(keys::NONCE).is_some());
        assert!(session.get(keys::CODE_VERIFIER).is_some());
        assert_eq!(
            session.get(keys::REDIRECT_URI).as_deref(),
            Some("http://127.0.0.1:8080/callback")
        );

        assert!(url.starts_with("https://auth.test/oidc/auth?response_type=code"));
        assert!(url.contains(&format!("state={}", urlencoding::encode(&state))));
        assert!(url.contains("code_challenge_method=S256"));
        // The verifier itself must never appear in the URL
        let verifier = session.get(keys::CODE_VERIFIER).unwrap();
        assert!(!url.contains(&verifier));
    }

    #[test]
    fn repeated_sign_in_invalidates_the_previous_attempt() {
        let options = options();
        let http = reqwest::Client::new();
        let mut session = MemorySession::new();
        let mut client = SignInSession::new(&options, &http, &mut session);

        client.sign_in("http://127.0.0.1:8080/callback");
        let first_state = session.get(keys::STATE).unwrap();

        let mut client = SignInSession::new(&options, &http, &mut session);
        client.sign_in("http://127.0.0.1:8080/callback");
        let second_state = session.get(keys::STATE).unwrap();

        assert_ne!(first_state, second_state);
    }

    #[tokio::test]
    async fn callback_with_provider_error_fails_authentication() {
        let options = options();
        let http = reqwest::Client::new();
        let mut session = MemorySession::new();
        let mut client = SignInSession::new(&options, &http, &mut session);
        client.sign_in("http://127.0.0.1:8080/callback");

        let result = client
            .handle_callback(
                "http://127.0.0.1:8080/callback?error=access_denied&error_description=user+cancelled",
            )
            .await;
        assert!(matches!(result, Err(Error::Authentication(_))));
    }

    #[tokio::test]
    async fn callback_without_pending_sign_in_fails_authentication() {
        let options = options();
        let http = reqwest::Client::new();
        let mut session = MemorySession::new();
        let mut client = SignInSession::new(&options, &http, &mut session);

        let result = client
            .handle_callback("http://127.0.0.1:8080/callback?code=abc&state=xyz")
            .await;
        assert!(matches!(result, Err(Error::Authentication(_))));
    }

    #[tokio::test]
    async fn callback_with_mismatched_state_fails_before_any_exchange() {
        let options = options();
        let http = reqwest::Client::new();
        let mut session = MemorySession::new();
        let mut client = SignInSession::new(&options, &http, &mut session);
        client.sign_in("http://127.0.0.1:8080/callback");

        // No mock provider is running: reaching the exchange would error as
        // a network failure, so an Authentication error proves we failed on
        // the state check first.
        let result = client
            .handle_callback("http://127.0.0.1:8080/callback?code=abc&state=tampered")
            .await;
        assert!(matches!(result, Err(Error::Authentication(_))));
        assert!(!client.is_authenticated());
    }

    #[test]
    fn fresh_session_is_not_authenticated() {
        let options = options();
        let http = reqwest::Client::new();
        let mut session = MemorySession::new();
        let client = SignInSession::new(&options, &http, &mut session);
        assert!(!client.is_authenticated());
    }

    #[test]
    fn expired_session_is_not_authenticated() {
        let options = options();
        let http = reqwest::Client::new();
        let mut session = MemorySession::new();
        session.put(keys::ID_TOKEN, "jwt".to_string());
        session.put(
            keys::EXPIRES_AT,
            (Utc::now().timestamp() - 10).to_string(),
        );
        let client = SignInSession::new(&options, &http, &mut session);
        assert!(!client.is_authenticated());
    }

    #[test]
    fn sign_out_clears_the_session_and_builds_the_end_session_url() {
        let options = options();
        let http = reqwest::Client::new();
        let mut session = MemorySession::new();
        session.put(keys::ID_TOKEN, "jwt".to_string());
        session.put(keys::ACCESS_TOKEN, "at".to_string());

        let mut client = SignInSession::new(&options, &http, &mut session);
        let url = client.sign_out(Some("http://127.0.0.1:8080/"));

        assert!(!client.is_authenticated());
        assert!(url.starts_with("https://auth.test/oidc/session/end?client_id=web-app"));
        assert!(url.contains("post_logout_redirect_uri="));
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn fetch_user_info_requires_authentication() {
        let options = options();
        let http = reqwest::Client::new();
        let mut session = MemorySession::new();
        let client = SignInSession::new(&options, &http, &mut session);
        let result = client.fetch_user_info().await;
        assert!(matches!(result, Err(Error::Authentication(_))));
    }
}
