//! Consent decision handling.
//!
//! The user-visible outcome (redirect or error) never depends on whether the consent
//! row could be stored; the storage result is reported next to it in `ConsentOutcome`.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use url::Url;

use crate::repos::consent_repo::{ConsentRecord, ConsentStore};
use crate::repos::error::RepoError;
use crate::services::auth::TokenVerifier;
use crate::services::consent::authorization::AuthorizationRequest;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsentError {
    #[error("Missing authorization ID")]
    MissingAuthorization,
    #[error("Invalid session")]
    InvalidSession,
    #[error("User denied consent")]
    Denied,
}

/// Best-effort side effect of an approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persistence {
    Recorded,
    /// `oauth_consents` does not exist in this deployment.
    Skipped,
    /// Logged where it happened; the redirect is unaffected.
    Failed,
}

#[derive(Debug, Clone)]
pub struct ConsentOutcome {
    pub redirect_url: Url,
    pub persistence: Persistence,
}

pub struct ConsentRecorder {
    verifier: TokenVerifier,
    store: Arc<dyn ConsentStore>,
    callback_url: Url,
}

impl ConsentRecorder {
    pub fn new(
        verifier: TokenVerifier,
        store: Arc<dyn ConsentStore>,
        public_app_url: &Url,
    ) -> Result<Self, url::ParseError> {
        // Keep any base path of the app URL: <app>/auth/callback
        let mut base = public_app_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let callback_url = base.join("auth/callback")?;

        Ok(Self {
            verifier,
            store,
            callback_url,
        })
    }

    /// The authorization request shown on the consent screen, or `None` if the token is invalid.
    pub async fn authorization(
        &self,
        authorization_id: &str,
        access_token: &str,
    ) -> Option<AuthorizationRequest> {
        let user = self.verifier.verify_or_invalid(access_token).await?;
        Some(AuthorizationRequest::synthesize(authorization_id, user.id))
    }

    pub async fn record(
        &self,
        authorization_id: &str,
        access_token: &str,
        approved: bool,
    ) -> Result<ConsentOutcome, ConsentError> {
        let authorization_id = authorization_id.trim();
        if authorization_id.is_empty() {
            return Err(ConsentError::MissingAuthorization);
        }

        let user = self
            .verifier
            .verify_or_invalid(access_token)
            .await
            .ok_or(ConsentError::InvalidSession)?;

        if !approved {
            tracing::info!(authorization_id, user_id = %user.id, "consent denied");
            return Err(ConsentError::Denied);
        }

        let request = AuthorizationRequest::synthesize(authorization_id, user.id);
        let record = ConsentRecord {
            authorization_id: request.id,
            user_id: user.id,
            approved: true,
            scopes: request.scopes,
            approved_at: Utc::now(),
        };

        let persistence = match self.store.insert(&record).await {
            Ok(()) => Persistence::Recorded,
            Err(RepoError::MissingTable) => {
                tracing::debug!(authorization_id, "oauth_consents table missing; consent not stored");
                Persistence::Skipped
            }
            Err(err) => {
                tracing::warn!(error = ?err, authorization_id, "failed to store consent");
                Persistence::Failed
            }
        };

        Ok(ConsentOutcome {
            redirect_url: self.redirect_for(authorization_id),
            persistence,
        })
    }

    // The authorization id stands in for an authorization code.
    fn redirect_for(&self, authorization_id: &str) -> Url {
        let mut url = self.callback_url.clone();
        url.query_pairs_mut()
            .append_pair("code", authorization_id)
            .append_pair("state", "success");
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        FailingConsentStore, MemoryConsentStore, identity_backend, mock_user, user_json,
    };
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const USER_ID: &str = "6f1c3f5e-2b55-4b8e-9a51-0c2a5f7e8d10";

    async fn recorder_with(store: Arc<dyn ConsentStore>) -> (ConsentRecorder, MockServer) {
        let server = MockServer::start().await;
        mock_user(&server, "valid", user_json(USER_ID, json!(["profile:read"]))).await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let verifier = TokenVerifier::new(identity_backend(&server));
        let app_url = Url::parse("https://app.example.com").unwrap();
        let recorder = ConsentRecorder::new(verifier, store, &app_url).unwrap();
        (recorder, server)
    }

    #[tokio::test]
    async fn approval_records_and_redirects_with_code() {
        let store = Arc::new(MemoryConsentStore::default());
        let (recorder, _server) = recorder_with(store.clone()).await;

        let outcome = recorder.record("auth-123", "valid", true).await.unwrap();

        assert_eq!(
            outcome.redirect_url.as_str(),
            "https://app.example.com/auth/callback?code=auth-123&state=success"
        );
        assert_eq!(outcome.persistence, Persistence::Recorded);

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].authorization_id, "auth-123");
        assert_eq!(records[0].user_id.to_string(), USER_ID);
        assert!(records[0].approved);
        assert_eq!(records[0].scopes, vec!["profile:read", "app:access"]);
    }

    #[tokio::test]
    async fn authorization_id_is_trimmed_everywhere() {
        let store = Arc::new(MemoryConsentStore::default());
        let (recorder, _server) = recorder_with(store.clone()).await;

        let outcome = recorder.record("  auth-123 ", "valid", true).await.unwrap();

        assert_eq!(
            outcome.redirect_url.as_str(),
            "https://app.example.com/auth/callback?code=auth-123&state=success"
        );
        assert_eq!(store.records()[0].authorization_id, "auth-123");
    }

    #[tokio::test]
    async fn denial_writes_nothing() {
        let store = Arc::new(MemoryConsentStore::default());
        let (recorder, _server) = recorder_with(store.clone()).await;

        let err = recorder.record("auth-123", "valid", false).await.unwrap_err();

        assert_eq!(err, ConsentError::Denied);
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn invalid_session_is_rejected_before_anything_else() {
        let store = Arc::new(MemoryConsentStore::default());
        let (recorder, _server) = recorder_with(store.clone()).await;

        let err = recorder.record("auth-123", "expired", true).await.unwrap_err();

        assert_eq!(err, ConsentError::InvalidSession);
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_does_not_change_redirect() {
        let store = Arc::new(FailingConsentStore::db_error());
        let (recorder, _server) = recorder_with(store.clone()).await;

        let outcome = recorder.record("auth-9", "valid", true).await.unwrap();

        assert!(outcome.redirect_url.as_str().contains("code=auth-9"));
        assert!(matches!(outcome.persistence, Persistence::Failed));
        assert_eq!(store.attempts(), 1);
    }

    #[tokio::test]
    async fn missing_table_is_skipped() {
        let store = Arc::new(FailingConsentStore::missing_table());
        let (recorder, _server) = recorder_with(store).await;

        let outcome = recorder.record("auth-9", "valid", true).await.unwrap();
        assert_eq!(outcome.persistence, Persistence::Skipped);
    }

    #[tokio::test]
    async fn blank_authorization_id_is_rejected() {
        let store = Arc::new(MemoryConsentStore::default());
        let (recorder, server) = recorder_with(store).await;

        let err = recorder.record("  ", "valid", true).await.unwrap_err();
        assert_eq!(err, ConsentError::MissingAuthorization);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn callback_keeps_base_path_and_encodes_code() {
        let store = Arc::new(MemoryConsentStore::default());
        let server = MockServer::start().await;
        mock_user(&server, "valid", user_json(USER_ID, json!([]))).await;

        let verifier = TokenVerifier::new(identity_backend(&server));
        let app_url = Url::parse("https://example.com/apps/widgets").unwrap();
        let recorder = ConsentRecorder::new(verifier, store, &app_url).unwrap();

        let outcome = recorder.record("a b&c", "valid", true).await.unwrap();
        assert_eq!(
            outcome.redirect_url.as_str(),
            "https://example.com/apps/widgets/auth/callback?code=a+b%26c&state=success"
        );
    }

    #[tokio::test]
    async fn authorization_is_synthesized_for_valid_token() {
        let store = Arc::new(MemoryConsentStore::default());
        let (recorder, _server) = recorder_with(store).await;

        let request = recorder.authorization("auth-1", "valid").await.unwrap();
        assert_eq!(request.id, "auth-1");
        assert_eq!(request.client.name, "ChatGPT App");
        assert_eq!(request.user_id.to_string(), USER_ID);

        assert!(recorder.authorization("auth-1", "expired").await.is_none());
    }
}
