/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - verifier / sessions: identity backend
 *   - consent / projects / viewer / mcp: 各 service
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 * - 外向き HTTP は 1 つの reqwest::Client (timeout 付き) を共有する
 */
use std::sync::Arc;

use reqwest::Client;
use thiserror::Error;

use crate::config::Config;
use crate::mcp::McpServer;
use crate::repos::consent_repo::ConsentStore;
use crate::services::{
    auth::TokenVerifier,
    consent::ConsentRecorder,
    identity::{IdentityBackend, IdentityClient, SessionClient, session::cookie_name},
    projects::ProjectsClient,
    viewer::{DerivativeViewer, ViewerAssets, ViewerService},
};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid PUBLIC_APP_URL: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Clone)]
pub struct AppState {
    pub verifier: TokenVerifier,
    pub sessions: SessionClient,
    pub consent: Arc<ConsentRecorder>,
    pub projects: ProjectsClient,
    pub viewer: Arc<ViewerService>,
    pub mcp: Arc<McpServer>,
}

impl AppState {
    pub fn new(config: &Config, consents: Arc<dyn ConsentStore>) -> Result<Self, StateError> {
        let http = Client::builder()
            .timeout(config.upstream_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let identity: Arc<dyn IdentityBackend> =
            Arc::new(IdentityClient::new(http.clone(), &config.identity));
        let verifier = TokenVerifier::new(identity.clone());
        let sessions = SessionClient::new(identity, cookie_name(&config.identity.url));

        let consent = ConsentRecorder::new(verifier.clone(), consents, &config.public_app_url)?;

        let viewer = ViewerService::new(
            http.clone(),
            config.viewer.credentials_url.clone(),
            Arc::new(DerivativeViewer::new(
                http.clone(),
                config.viewer.api_endpoint.clone(),
            )),
            ViewerAssets::new(
                http.clone(),
                config.viewer.script_url.clone(),
                config.viewer.style_url.clone(),
            ),
        );

        Ok(Self {
            verifier,
            sessions,
            consent: Arc::new(consent),
            projects: ProjectsClient::new(http.clone(), config.projects_api_url.clone()),
            viewer: Arc::new(viewer),
            mcp: Arc::new(McpServer::new(http, config.widget_base_url.clone())),
        })
    }
}
