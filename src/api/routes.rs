/*
 * Responsibility
 * - HTTP API の URL 構造を定義
 * - 認証の要否は route gate (middleware::route_gate) の分類で決まる
 *   - public: /health, /api/user (Bearer), /public/viewer/...
 *   - session 必須: /api/oauth/..., /api/projects, /api/viewer/...
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use crate::api::handlers::{
    consent::{get_authorization, submit_consent},
    health::health,
    projects::list_projects,
    user::get_current_user,
    viewer::{load_model, viewer_script, viewer_style},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/user", get(get_current_user))
        .route("/api/oauth/authorization", get(get_authorization))
        .route("/api/oauth/consent", post(submit_consent))
        .route("/api/projects", get(list_projects))
        .route("/api/viewer/model", get(load_model))
        .route("/public/viewer/viewer3D.min.js", get(viewer_script))
        .route("/public/viewer/style.min.css", get(viewer_style))
}
