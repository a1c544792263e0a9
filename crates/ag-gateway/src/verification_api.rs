//! Phone Verification Endpoints
//!
//! Forwards verification-code operations to the provider's management API
//! using a machine-to-machine token — no user session is involved. Upstream
//! business outcomes pass through as status codes so clients can branch
//! precisely; a resent code always reaches the provider (and the user's
//! phone) again.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use ag_idp::{CodeCheck, CodeDelivery};

use crate::error::{ErrorResponse, GatewayError};
use crate::state::GatewayState;

/// Request to send a verification code
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeRequest {
    /// Phone number in E.164 format
    pub phone: String,
}

/// Request to verify a previously sent code
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest {
    pub phone: String,
    pub code: String,
}

async fn management_token(state: &GatewayState) -> Result<String, GatewayError> {
    let grant = state.broker.fetch_access_token().await?;
    Ok(grant.bearer()?.to_string())
}

/// Send an SMS verification code to a phone number.
#[utoipa::path(
    post,
    path = "/send-code",
    tag = "verification",
    request_body = SendCodeRequest,
    responses(
        (status = 204, description = "Code sent"),
        (status = 400, description = "Invalid phone number"),
        (status = 501, description = "Provider has no SMS connector"),
        (status = 502, description = "Provider unreachable")
    )
)]
pub async fn send_code(
    State(state): State<GatewayState>,
    Json(body): Json<SendCodeRequest>,
) -> Result<Response, GatewayError> {
    let token = management_token(&state).await?;
    let outcome = state.management.send_phone_code(&token, &body.phone).await?;

    info!(outcome = ?outcome, "Verification code requested");
    Ok(delivery_response(outcome))
}

/// Check an SMS verification code.
#[utoipa::path(
    post,
    path = "/verify-code",
    tag = "verification",
    request_body = VerifyCodeRequest,
    responses(
        (status = 204, description = "Code is valid"),
        (status = 400, description = "Wrong or expired code"),
        (status = 502, description = "Provider unreachable")
    )
)]
pub async fn verify_code(
    State(state): State<GatewayState>,
    Json(body): Json<VerifyCodeRequest>,
) -> Result<Response, GatewayError> {
    let token = management_token(&state).await?;
    let outcome = state
        .management
        .verify_phone_code(&token, &body.phone, &body.code)
        .await?;

    info!(outcome = ?outcome, "Verification code checked");
    Ok(check_response(outcome))
}

fn delivery_response(outcome: CodeDelivery) -> Response {
    let (status, error) = match outcome {
        CodeDelivery::Sent => return StatusCode::NO_CONTENT.into_response(),
        CodeDelivery::BadRequest => (StatusCode::BAD_REQUEST, "INVALID_PHONE"),
        CodeDelivery::Unauthorized => (StatusCode::UNAUTHORIZED, "UPSTREAM_REJECTED"),
        CodeDelivery::Forbidden => (StatusCode::FORBIDDEN, "UPSTREAM_REJECTED"),
        CodeDelivery::NotImplemented => (StatusCode::NOT_IMPLEMENTED, "NO_SMS_CONNECTOR"),
        CodeDelivery::Unexpected(status) => {
            warn!(status, "Unexpected status from verification-code send");
            (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR")
        }
    };

    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: "verification code was not sent".to_string(),
        }),
    )
        .into_response()
}

fn check_response(outcome: CodeCheck) -> Response {
    let (status, error) = match outcome {
        CodeCheck::Verified => return StatusCode::NO_CONTENT.into_response(),
        CodeCheck::Invalid => (StatusCode::BAD_REQUEST, "INVALID_CODE"),
        CodeCheck::Unauthorized => (StatusCode::UNAUTHORIZED, "UPSTREAM_REJECTED"),
        CodeCheck::Forbidden => (StatusCode::FORBIDDEN, "UPSTREAM_REJECTED"),
        CodeCheck::NotImplemented => (StatusCode::NOT_IMPLEMENTED, "NO_SMS_CONNECTOR"),
        CodeCheck::Unexpected(status) => {
            warn!(status, "Unexpected status from verification-code check");
            (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR")
        }
    };

    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: "verification code was not accepted".to_string(),
        }),
    )
        .into_response()
}

/// Create the verification router
pub fn verification_router(state: GatewayState) -> Router {
    Router::new()
        .route("/send-code", post(send_code))
        .route("/verify-code", post(verify_code))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_outcomes_pass_through_as_statuses() {
        assert_eq!(
            delivery_response(CodeDelivery::Sent).status(),
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            delivery_response(CodeDelivery::BadRequest).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            delivery_response(CodeDelivery::NotImplemented).status(),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            delivery_response(CodeDelivery::Unexpected(500)).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn check_outcomes_pass_through_as_statuses() {
        assert_eq!(
            check_response(CodeCheck::Verified).status(),
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            check_response(CodeCheck::Invalid).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
