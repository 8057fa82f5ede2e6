/*
 * Responsibility
 * - GET  /api/oauth/authorization: 同意画面に出す authorization request
 * - POST /api/oauth/consent: 同意 / 拒否の記録と redirect
 * - どちらも route gate の session 前提 (SessionCtxExtractor)
 */
use axum::{
    Form, Json,
    extract::{Query, State},
    response::Redirect,
};

use crate::{
    api::{
        dto::consent::{AuthorizationQuery, AuthorizationResponse, ConsentForm},
        extractors::SessionCtxExtractor,
    },
    error::AppError,
    services::consent::ConsentError,
    state::AppState,
};

pub const DENIED_LOCATION: &str = "/auth/login?error=access_denied";

pub async fn get_authorization(
    State(state): State<AppState>,
    SessionCtxExtractor(session): SessionCtxExtractor,
    Query(query): Query<AuthorizationQuery>,
) -> Result<Json<AuthorizationResponse>, AppError> {
    let authorization_id = query.authorization_id().map_err(AppError::bad_request)?;

    let request = state
        .consent
        .authorization(authorization_id, &session.access_token)
        .await
        .ok_or(AppError::Unauthorized("Invalid session"))?;

    Ok(Json(request.into()))
}

pub async fn submit_consent(
    State(state): State<AppState>,
    SessionCtxExtractor(session): SessionCtxExtractor,
    Form(form): Form<ConsentForm>,
) -> Result<Redirect, AppError> {
    let result = state
        .consent
        .record(&form.authorization_id, &session.access_token, form.approved)
        .await;

    match result {
        Ok(outcome) => {
            tracing::info!(
                user_id = ?session.user_id,
                persistence = ?outcome.persistence,
                "consent approved"
            );
            Ok(Redirect::to(outcome.redirect_url.as_str()))
        }
        Err(ConsentError::Denied) => Ok(Redirect::to(DENIED_LOCATION)),
        Err(err @ ConsentError::MissingAuthorization) => Err(AppError::bad_request(err.to_string())),
        Err(ConsentError::InvalidSession) => Err(AppError::Unauthorized("Invalid session")),
    }
}
