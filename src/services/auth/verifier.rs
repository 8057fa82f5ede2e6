use std::sync::Arc;

use crate::services::auth::scopes::Scopes;
use crate::services::identity::{IdentityBackend, IdentityError, User};

/// Resolves bearer tokens to users through the identity backend's privileged client.
///
/// - `verify` keeps backend failures distinguishable from "invalid token"
/// - `extract_scopes` / `validate_scopes` collapse every failure into "no scopes"
#[derive(Clone)]
pub struct TokenVerifier {
    backend: Arc<dyn IdentityBackend>,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(backend: Arc<dyn IdentityBackend>) -> Self {
        Self { backend }
    }

    /// `Ok(None)` when the backend reports the token invalid (or returns no user).
    pub async fn verify(&self, token: &str) -> Result<Option<User>, IdentityError> {
        self.backend.get_user(token).await
    }

    /// Like `verify`, but a backend failure is logged and treated as an invalid token.
    pub async fn verify_or_invalid(&self, token: &str) -> Option<User> {
        match self.verify(token).await {
            Ok(user) => user,
            Err(err) => {
                tracing::warn!(error = %err, "token verification failed; treating as invalid");
                None
            }
        }
    }

    /// Scopes granted to the token's user. Never fails: an invalid token has no scopes.
    pub async fn extract_scopes(&self, token: &str) -> Scopes {
        self.verify_or_invalid(token)
            .await
            .map(|user| Scopes::from_user(&user))
            .unwrap_or_default()
    }

    /// True iff every entry of `required` is granted to the token.
    pub async fn validate_scopes<S: AsRef<str>>(&self, token: &str, required: &[S]) -> bool {
        if required.is_empty() {
            return true;
        }
        self.extract_scopes(token).await.contains_all(required)
    }
}
