/*
 * Responsibility
 * - GET /api/viewer/model?urn=: credentials 取得 → manifest → 表示対象 geometry
 * - GET /public/viewer/{viewer3D.min.js, style.min.css}: キャッシュ済み viewer asset (ETag / 304)
 */
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    api::extractors::SessionCtxExtractor,
    error::AppError,
    services::viewer::{Asset, LoadedModel, ViewerError},
    state::AppState,
};

const ASSET_CACHE_CONTROL: &str = "public, max-age=3600";

#[derive(Debug, Deserialize)]
pub struct ModelQuery {
    #[serde(default)]
    pub urn: String,
}

fn to_app_error(err: ViewerError) -> AppError {
    match err {
        ViewerError::MissingUrn => AppError::bad_request(err.to_string()),
        ViewerError::NotConfigured => AppError::ServiceUnavailable("Viewer is not configured"),
        ViewerError::NoViewableGeometry | ViewerError::TranslationFailed(_) => {
            AppError::Unprocessable(err.to_string())
        }
        ViewerError::Credentials(_) | ViewerError::Manifest(_) | ViewerError::Script(_) => {
            tracing::warn!(error = %err, "viewer upstream failed");
            AppError::BadGateway(err.to_string())
        }
        ViewerError::Http(source) => {
            tracing::error!(error = %source, "viewer upstream unreachable");
            AppError::BadGateway("Failed to reach viewer service".to_string())
        }
        ViewerError::InvalidEndpoint => {
            tracing::error!(error = %err, "viewer misconfigured");
            AppError::Internal
        }
    }
}

pub async fn load_model(
    State(state): State<AppState>,
    SessionCtxExtractor(session): SessionCtxExtractor,
    Query(query): Query<ModelQuery>,
) -> Result<Json<LoadedModel>, AppError> {
    let model = state
        .viewer
        .load_model(&session.access_token, &query.urn)
        .await
        .map_err(to_app_error)?;

    Ok(Json(model))
}

pub async fn viewer_script(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let bundle = state.viewer.assets().get().await.map_err(to_app_error)?;
    Ok(asset_response(&bundle.script, &headers))
}

pub async fn viewer_style(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let bundle = state.viewer.assets().styled().await.map_err(to_app_error)?;
    let style = bundle.style.as_ref().ok_or(AppError::NotFound)?;
    Ok(asset_response(style, &headers))
}

fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|value| {
            value.split(',').map(str::trim).any(|candidate| {
                candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
            })
        })
}

fn asset_response(asset: &Asset, headers: &HeaderMap) -> Response {
    if etag_matches(headers, &asset.etag) {
        return (StatusCode::NOT_MODIFIED, [(header::ETAG, asset.etag.clone())]).into_response();
    }

    (
        [
            (header::CONTENT_TYPE, asset.content_type.to_string()),
            (header::ETAG, asset.etag.clone()),
            (header::CACHE_CONTROL, ASSET_CACHE_CONTROL.to_string()),
        ],
        asset.body.clone(),
    )
        .into_response()
}
