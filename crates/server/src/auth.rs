//! Caller identity verification.
//!
//! The engine receives identities already verified; this module is the
//! boundary that does the verifying. Two providers: an HTTP client for a
//! real identity service, and a shared-token provider for development and
//! tests where the caller is asserted via headers.

use async_trait::async_trait;
use axum::http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use helply_core::CallerIdentity;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(
        &self,
        bearer_token: &str,
        headers: &HeaderMap,
    ) -> Result<CallerIdentity, AuthError>;
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::MissingToken)?;
    let token = value.strip_prefix("Bearer ").ok_or(AuthError::MissingToken)?.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Verifies tokens against an external identity service.
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    verify_url: String,
}

impl HttpIdentityProvider {
    pub fn new(client: reqwest::Client, verify_url: impl Into<String>) -> Self {
        Self { client, verify_url: verify_url.into() }
    }
}

#[derive(Debug, Deserialize)]
struct VerifiedPayload {
    #[serde(alias = "sub")]
    subject_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, alias = "name")]
    display_name: Option<String>,
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verify(
        &self,
        bearer_token: &str,
        _headers: &HeaderMap,
    ) -> Result<CallerIdentity, AuthError> {
        let response = self
            .client
            .post(&self.verify_url)
            .json(&json!({ "token": bearer_token }))
            .send()
            .await
            .map_err(|error| AuthError::Unavailable(error.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(AuthError::InvalidToken);
        }
        if !status.is_success() {
            return Err(AuthError::Unavailable(format!("verifier returned status {status}")));
        }

        let payload: VerifiedPayload = response
            .json()
            .await
            .map_err(|error| AuthError::Unavailable(format!("malformed response: {error}")))?;

        Ok(CallerIdentity {
            subject_id: payload.subject_id,
            email: payload.email,
            display_name: payload.display_name,
        })
    }
}

pub const CALLER_SUBJECT_HEADER: &str = "x-caller-subject";
pub const CALLER_EMAIL_HEADER: &str = "x-caller-email";
pub const CALLER_NAME_HEADER: &str = "x-caller-name";

/// Shared-token verification: the bearer token must match the configured
/// secret, and the caller asserts who they are via `x-caller-*` headers.
/// Development and tests only; never expose this mode publicly.
pub struct TrustedTokenProvider {
    token: SecretString,
}

impl TrustedTokenProvider {
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl IdentityProvider for TrustedTokenProvider {
    async fn verify(
        &self,
        bearer_token: &str,
        headers: &HeaderMap,
    ) -> Result<CallerIdentity, AuthError> {
        if bearer_token != self.token.expose_secret() {
            return Err(AuthError::InvalidToken);
        }

        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let subject_id = header(CALLER_SUBJECT_HEADER).ok_or(AuthError::InvalidToken)?;
        Ok(CallerIdentity {
            subject_id,
            email: header(CALLER_EMAIL_HEADER),
            display_name: header(CALLER_NAME_HEADER),
        })
    }
}
