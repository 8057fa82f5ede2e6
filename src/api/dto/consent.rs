/*
 * Responsibility
 * - /api/oauth/... の request/response DTO
 */
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::auth::scopes;
use crate::services::consent::AuthorizationRequest;
use crate::services::consent::authorization::ClientDescriptor;

#[derive(Debug, Deserialize)]
pub struct AuthorizationQuery {
    #[serde(default)]
    pub authorization_id: Option<String>,
}

impl AuthorizationQuery {
    pub fn authorization_id(&self) -> Result<&str, &'static str> {
        self.authorization_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or("Missing authorization ID")
    }
}

#[derive(Debug, Deserialize)]
pub struct ConsentForm {
    #[serde(default)]
    pub authorization_id: String,
    #[serde(default)]
    pub approved: bool,
}

#[derive(Debug, Serialize)]
pub struct ScopeView {
    pub scope: String,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AuthorizationResponse {
    pub id: String,
    pub client: ClientDescriptor,
    pub scopes: Vec<ScopeView>,
    pub user_id: Uuid,
}

impl From<AuthorizationRequest> for AuthorizationResponse {
    fn from(request: AuthorizationRequest) -> Self {
        Self {
            id: request.id,
            client: request.client,
            scopes: request
                .scopes
                .into_iter()
                .map(|scope| ScopeView {
                    description: scopes::describe(&scope),
                    scope,
                })
                .collect(),
            user_id: request.user_id,
        }
    }
}
