//! Management API Client
//!
//! Typed wrapper over the provider's management REST endpoints. Every call
//! takes a bearer token from the M2M broker, performs exactly one request,
//! and does no retrying — retry policy belongs to the caller. Two operations
//! are NOT safe to repeat: `send_phone_code` triggers a new SMS each time and
//! `create_user` creates a duplicate on re-post.
//!
//! Endpoints whose success response carries a body return the decoded JSON
//! verbatim, provider error bodies included, so callers can branch on
//! provider-specific shapes. Endpoints that answer with a bare status code
//! return an exhaustive outcome enum instead of a raw integer.

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::{Error, Result};

/// Outcome of a password verification call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordVerdict {
    /// 204 - the password matches
    Match,
    /// 422 - the password does not match
    Mismatch,
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404 - unknown user
    NotFound,
    /// Anything the provider contract does not document
    Unexpected(u16),
}

impl PasswordVerdict {
    fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            204 => Self::Match,
            422 => Self::Mismatch,
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            other => Self::Unexpected(other),
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Outcome of requesting a phone verification code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeDelivery {
    /// 204 - code requested and sent
    Sent,
    /// 400 - invalid payload
    BadRequest,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 501 - no SMS connector configured at the provider
    NotImplemented,
    Unexpected(u16),
}

impl CodeDelivery {
    fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            204 => Self::Sent,
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            501 => Self::NotImplemented,
            other => Self::Unexpected(other),
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Outcome of checking a phone verification code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    /// 204 - the code is valid
    Verified,
    /// 400 - wrong or expired code
    Invalid,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 501
    NotImplemented,
    Unexpected(u16),
}

impl CodeCheck {
    fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            204 => Self::Verified,
            400 => Self::Invalid,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            501 => Self::NotImplemented,
            other => Self::Unexpected(other),
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// Pagination parameters for list endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

/// Nested profile for user creation, following the provider's user schema.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// Request body for user creation.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyCodeRequest<'a> {
    phone: &'a str,
    verification_code: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePatRequest<'a> {
    name: &'a str,
    expires_at: Option<i64>,
}

/// Client for the provider's management API.
pub struct ManagementClient {
    base: String,
    http: reqwest::Client,
}

impl ManagementClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        if endpoint.is_empty() {
            return Err(Error::configuration("provider endpoint must be set"));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base: endpoint.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn user_url(&self, user_id: &str, suffix: &str) -> String {
        self.url(&format!(
            "/api/users/{}{}",
            urlencoding::encode(user_id),
            suffix
        ))
    }

    /// List applications registered at the provider.
    pub async fn list_applications(&self, token: &str) -> Result<Value> {
        let response = self
            .http
            .get(self.url("/api/applications"))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(response.json().await?)
    }

    /// Check a user's password without changing anything.
    ///
    /// Both outcomes leave the stored credential untouched.
    pub async fn verify_user_password(
        &self,
        token: &str,
        user_id: &str,
        password: &str,
    ) -> Result<PasswordVerdict> {
        let response = self
            .http
            .post(self.user_url(user_id, "/password/verify"))
            .bearer_auth(token)
            .form(&[("password", password)])
            .send()
            .await?;
        Ok(PasswordVerdict::from_status(response.status()))
    }

    /// Replace a user's password.
    pub async fn update_user_password(
        &self,
        token: &str,
        user_id: &str,
        password: &str,
    ) -> Result<Value> {
        let response = self
            .http
            .patch(self.user_url(user_id, "/password"))
            .bearer_auth(token)
            .form(&[("password", password)])
            .send()
            .await?;
        Ok(response.json().await?)
    }

    /// Create a user. Not idempotent: re-posting creates a duplicate.
    pub async fn create_user(&self, token: &str, user: &CreateUser) -> Result<Value> {
        let response = self
            .http
            .post(self.url("/api/users"))
            .bearer_auth(token)
            .json(user)
            .send()
            .await?;
        Ok(response.json().await?)
    }

    /// List users with pagination.
    pub async fn list_users(&self, token: &str, page: Page) -> Result<Value> {
        let response = self
            .http
            .get(self.url("/api/users"))
            .bearer_auth(token)
            .query(&[("page", page.page), ("page_size", page.page_size)])
            .send()
            .await?;
        Ok(response.json().await?)
    }

    /// Total number of users at the provider.
    pub async fn total_user_count(&self, token: &str) -> Result<Value> {
        let response = self
            .http
            .get(self.url("/api/dashboard/users/total"))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(response.json().await?)
    }

    /// List the roles assigned to a user, paginated.
    pub async fn list_user_roles(&self, token: &str, user_id: &str, page: Page) -> Result<Value> {
        let response = self
            .http
            .get(self.user_url(user_id, "/roles"))
            .bearer_auth(token)
            .query(&[("page", page.page), ("page_size", page.page_size)])
            .send()
            .await?;
        Ok(response.json().await?)
    }

    /// Request an SMS verification code for a phone number.
    ///
    /// Every call sends a new SMS; there is no dedup or suppression here.
    pub async fn send_phone_code(&self, token: &str, phone: &str) -> Result<CodeDelivery> {
        let response = self
            .http
            .post(self.url("/api/verification-codes"))
            .bearer_auth(token)
            .form(&[("phone", phone)])
            .send()
            .await?;
        Ok(CodeDelivery::from_status(response.status()))
    }

    /// Check an SMS verification code against a phone number.
    pub async fn verify_phone_code(
        &self,
        token: &str,
        phone: &str,
        code: &str,
    ) -> Result<CodeCheck> {
        let response = self
            .http
            .post(self.url("/api/verification-codes"))
            .bearer_auth(token)
            .json(&VerifyCodeRequest {
                phone,
                verification_code: code,
            })
            .send()
            .await?;
        Ok(CodeCheck::from_status(response.status()))
    }

    /// Create a personal access token for a user.
    pub async fn create_personal_access_token(
        &self,
        token: &str,
        user_id: &str,
        name: &str,
        expires_at: Option<i64>,
    ) -> Result<Value> {
        let response = self
            .http
            .post(self.user_url(user_id, "/personal-access-tokens"))
            .bearer_auth(token)
            .json(&CreatePatRequest { name, expires_at })
            .send()
            .await?;
        Ok(response.json().await?)
    }

    /// List a user's personal access tokens.
    pub async fn list_personal_access_tokens(&self, token: &str, user_id: &str) -> Result<Value> {
        let response = self
            .http
            .get(self.user_url(user_id, "/personal-access-tokens"))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(response.json().await?)
    }
}
