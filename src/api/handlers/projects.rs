/*
 * Responsibility
 * - GET /api/projects: session の access token で上流 project 一覧を取得
 */
use axum::{Json, extract::State};

use crate::{
    api::extractors::SessionCtxExtractor,
    error::AppError,
    services::projects::{Project, ProjectsError},
    state::AppState,
};

pub async fn list_projects(
    State(state): State<AppState>,
    SessionCtxExtractor(session): SessionCtxExtractor,
) -> Result<Json<Vec<Project>>, AppError> {
    let projects = state
        .projects
        .list(&session.access_token)
        .await
        .map_err(|err| match err {
            ProjectsError::NotConfigured => {
                AppError::ServiceUnavailable("Projects API is not configured")
            }
            ProjectsError::Upstream(_) => AppError::BadGateway(err.to_string()),
            ProjectsError::Http(source) => {
                tracing::error!(error = %source, "projects API unreachable");
                AppError::BadGateway("Failed to connect to API".to_string())
            }
        })?;

    Ok(Json(projects))
}
