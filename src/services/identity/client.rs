//! Identity backend (Supabase auth) HTTP client.
//!
//! Two calls are needed by this service:
//! - `GET  /auth/v1/user` to resolve a bearer token to a user (privileged key)
//! - `POST /auth/v1/token?grant_type=refresh_token` to refresh a cookie session (public key)
//!
//! Every call is a single round trip. No retries.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::config::IdentityConfig;
use crate::services::identity::types::{Session, User};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity backend request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("identity backend returned {status}: {body}")]
    Backend { status: u16, body: String },
}

/// The operations this service needs from the identity backend.
///
/// - `Ok(None)`: the backend says the credential is not valid
/// - `Err(_)`: transport failure or unexpected backend status
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    async fn get_user(&self, access_token: &str) -> Result<Option<User>, IdentityError>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<Option<Session>, IdentityError>;
}

#[derive(Clone)]
pub struct IdentityClient {
    http: Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

impl std::fmt::Debug for IdentityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print keys
        f.debug_struct("IdentityClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl IdentityClient {
    pub fn new(http: Client, config: &IdentityConfig) -> Self {
        Self {
            http,
            base_url: config.url.as_str().trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            service_role_key: config.service_role_key.clone(),
        }
    }

    async fn backend_error(response: reqwest::Response) -> IdentityError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        IdentityError::Backend { status, body }
    }
}

// Statuses GoTrue uses to reject a token (as opposed to failing).
fn rejects_token(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::NOT_FOUND
            | StatusCode::UNPROCESSABLE_ENTITY
    )
}

#[async_trait]
impl IdentityBackend for IdentityClient {
    async fn get_user(&self, access_token: &str) -> Result<Option<User>, IdentityError> {
        if access_token.trim().is_empty() {
            return Ok(None);
        }

        let url = format!("{}/auth/v1/user", self.base_url);
        tracing::debug!(%url, "verifying bearer token with identity backend");

        let response = self
            .http
            .get(&url)
            .header("apikey", &self.service_role_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if rejects_token(status) {
            tracing::debug!(status = status.as_u16(), "identity backend rejected token");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::backend_error(response).await);
        }

        let user: User = response.json().await?;
        Ok(Some(user))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Option<Session>, IdentityError> {
        if refresh_token.trim().is_empty() {
            return Ok(None);
        }

        let url = format!("{}/auth/v1/token?grant_type=refresh_token", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || rejects_token(status) {
            tracing::debug!(status = status.as_u16(), "identity backend rejected refresh token");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::backend_error(response).await);
        }

        let session: Session = response.json().await?;
        Ok(Some(session))
    }
}
