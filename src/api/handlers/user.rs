/*
 * Responsibility
 * - GET /api/user: bearer token → user profile
 * - 401: header 不正 / token 無効, 403: profile:read なし, 500: backend 障害
 */
use axum::{Json, extract::State};

use crate::{
    api::{dto::user::UserProfileResponse, extractors::BearerToken},
    error::AppError,
    services::auth::{Scopes, scopes::PROFILE_READ},
    state::AppState,
};

pub async fn get_current_user(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<UserProfileResponse>, AppError> {
    let user = state
        .verifier
        .verify(&token)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "error in /api/user");
            AppError::Internal
        })?
        .ok_or_else(|| {
            tracing::warn!("bearer token rejected");
            AppError::Unauthorized("Invalid or expired token")
        })?;

    if !Scopes::from_user(&user).contains(PROFILE_READ) {
        tracing::warn!(user_id = %user.id, "missing scope {PROFILE_READ}");
        return Err(AppError::Forbidden(format!(
            "Insufficient permissions. Required scope: {PROFILE_READ}"
        )));
    }

    Ok(Json(user.into()))
}
