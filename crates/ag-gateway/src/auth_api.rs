//! Browser Sign-In Endpoints
//!
//! Binds the OIDC session flow to user-visible routes:
//! 1. GET /login - persist a fresh authorization request, redirect to the provider
//! 2. User authenticates at the provider
//! 3. GET /callback?code=...&state=... - validate and exchange, set the session cookie
//! 4. GET /user-info, /protected - answer from the authenticated session
//! 5. GET /logout - clear the session, redirect to the provider end-session page

use axum::{
    extract::{RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use ag_idp::{SignInSession, UserInfo};

use crate::error::GatewayError;
use crate::state::GatewayState;

/// Home page response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HomeResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub user: Option<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_url: Option<&'static str>,
}

/// Protected resource response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProtectedResponse {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Home: report whether this browser session is signed in.
#[utoipa::path(
    get,
    path = "/",
    tag = "auth",
    responses(
        (status = 200, description = "Session status", body = HomeResponse)
    )
)]
pub async fn home(State(state): State<GatewayState>, jar: CookieJar) -> Response {
    let mut session = state.sessions.read(&jar);
    let client = SignInSession::new(&state.provider, &state.http, &mut session);

    // An expired or rejected session reads as "not signed in", never a failure
    let user = match client.fetch_user_info().await {
        Ok(user) => Some(user),
        Err(err) => {
            if !matches!(err, ag_idp::Error::Authentication(_)) {
                warn!(error = %err, "Failed to fetch user info for home page");
            }
            None
        }
    };

    let authenticated = user.is_some();
    Json(HomeResponse {
        authenticated,
        user,
        login_url: (!authenticated).then_some("/login"),
    })
    .into_response()
}

/// Begin sign-in: redirect the browser to the provider authorization page.
#[utoipa::path(
    get,
    path = "/login",
    tag = "auth",
    responses(
        (status = 303, description = "Redirect to the identity provider")
    )
)]
pub async fn login(State(state): State<GatewayState>, jar: CookieJar) -> Response {
    let mut session = state.sessions.read(&jar);
    let mut client = SignInSession::new(&state.provider, &state.http, &mut session);

    let auth_url = client.sign_in(&state.config.provider.redirect_uri);
    let jar = state.sessions.write(jar, &session);

    info!("Redirecting browser to the identity provider");
    (jar, (StatusCode::SEE_OTHER, [(header::LOCATION, auth_url)])).into_response()
}

/// Authorization callback: exchange the code and establish the session.
#[utoipa::path(
    get,
    path = "/callback",
    tag = "auth",
    responses(
        (status = 303, description = "Redirect to the home page, or to /?error= on failure")
    )
)]
pub async fn callback(
    State(state): State<GatewayState>,
    RawQuery(query): RawQuery,
    jar: CookieJar,
) -> Response {
    let callback_url = format!(
        "{}?{}",
        state.config.provider.redirect_uri,
        query.unwrap_or_default()
    );

    let mut session = state.sessions.read(&jar);
    let mut client = SignInSession::new(&state.provider, &state.http, &mut session);

    match client.handle_callback(&callback_url).await {
        Ok(()) => {
            let jar = state.sessions.write(jar, &session);
            (jar, (StatusCode::SEE_OTHER, [(header::LOCATION, "/".to_string())])).into_response()
        }
        Err(err) => {
            warn!(error = %err, "Sign-in callback failed");
            error_redirect("sign-in failed")
        }
    }
}

/// Sign out: clear the session and redirect to the provider end-session page.
#[utoipa::path(
    get,
    path = "/logout",
    tag = "auth",
    responses(
        (status = 303, description = "Redirect to the provider end-session page")
    )
)]
pub async fn logout(State(state): State<GatewayState>, jar: CookieJar) -> Response {
    let mut session = state.sessions.read(&jar);
    let mut client = SignInSession::new(&state.provider, &state.http, &mut session);

    let end_session_url =
        client.sign_out(Some(&state.config.provider.post_logout_redirect_uri));
    let jar = state.sessions.write(jar, &session);

    (
        jar,
        (StatusCode::SEE_OTHER, [(header::LOCATION, end_session_url)]),
    )
        .into_response()
}

/// Current user projection from the provider userinfo endpoint.
#[utoipa::path(
    get,
    path = "/user-info",
    tag = "auth",
    responses(
        (status = 200, description = "Current user info"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn user_info(
    State(state): State<GatewayState>,
    jar: CookieJar,
) -> Result<Json<UserInfo>, GatewayError> {
    let mut session = state.sessions.read(&jar);
    let client = SignInSession::new(&state.provider, &state.http, &mut session);
    let user = client.fetch_user_info().await?;
    Ok(Json(user))
}

/// Example resource that requires an authenticated session.
#[utoipa::path(
    get,
    path = "/protected",
    tag = "auth",
    responses(
        (status = 200, description = "Protected resource", body = ProtectedResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn protected(
    State(state): State<GatewayState>,
    jar: CookieJar,
) -> Result<Json<ProtectedResponse>, GatewayError> {
    let mut session = state.sessions.read(&jar);
    let client = SignInSession::new(&state.provider, &state.http, &mut session);
    let user = client.fetch_user_info().await?;
    Ok(Json(ProtectedResponse {
        user_id: user.sub,
        username: user.username,
    }))
}

fn error_redirect(message: &str) -> Response {
    let error_url = format!("/?error={}", urlencoding::encode(message));
    (StatusCode::SEE_OTHER, [(header::LOCATION, error_url)]).into_response()
}

/// Create the browser-facing auth router
pub fn auth_router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/logout", get(logout))
        .route("/user-info", get(user_info))
        .route("/protected", get(protected))
        .with_state(state)
}
