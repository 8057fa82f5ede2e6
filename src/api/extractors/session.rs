/*
 * Responsibility
 * - route gate が request extensions に入れたセッション情報 (SessionCtx) の型
 * - handler 用 extractor。見つからない場合は 401 (gate を通っていない)
 */
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::identity::Session;
use crate::state::AppState;

/// What handlers may know about the cookie session of the current request.
#[derive(Debug, Clone)]
pub struct SessionCtx {
    pub access_token: String,
    pub user_id: Option<Uuid>,
}

impl From<&Session> for SessionCtx {
    fn from(session: &Session) -> Self {
        Self {
            access_token: session.access_token.clone(),
            user_id: session.user_id(),
        }
    }
}

pub struct SessionCtxExtractor(pub SessionCtx);

impl FromRequestParts<AppState> for SessionCtxExtractor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionCtx>()
            .cloned()
            .map(SessionCtxExtractor)
            .ok_or(AppError::Unauthorized("Invalid session"))
    }
}
