/*
 * Responsibility
 * - 3D viewer 関連の公開インターフェース (ViewerService / ViewerError / re-export)
 * - credentials 取得 → runtime 初期化 → model 読み込み の組み立て
 */
pub mod assets;
pub mod runtime;

use std::sync::Arc;

use reqwest::Client;
use thiserror::Error;
use url::Url;

pub use assets::{Asset, ViewerAssets};
pub use runtime::{
    CredentialsProvider, DerivativeViewer, HttpCredentialsProvider, LoadedModel, ViewerRuntime,
};

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("viewer credentials endpoint is not configured")]
    NotConfigured,
    #[error("Missing urn")]
    MissingUrn,
    #[error("viewer API endpoint cannot be a base URL")]
    InvalidEndpoint,
    #[error("Failed to fetch credentials ({0})")]
    Credentials(u16),
    #[error("Failed to fetch model manifest ({0})")]
    Manifest(u16),
    #[error("Model translation {0}")]
    TranslationFailed(String),
    #[error("No viewable geometry in model")]
    NoViewableGeometry,
    #[error("Failed to load viewer script: {0}")]
    Script(String),
    #[error("viewer request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct ViewerService {
    http: Client,
    credentials_url: Option<Url>,
    runtime: Arc<dyn ViewerRuntime>,
    assets: ViewerAssets,
}

impl std::fmt::Debug for ViewerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerService")
            .field("credentials_url", &self.credentials_url.as_ref().map(Url::as_str))
            .field("assets", &self.assets)
            .finish_non_exhaustive()
    }
}

impl ViewerService {
    pub fn new(
        http: Client,
        credentials_url: Option<Url>,
        runtime: Arc<dyn ViewerRuntime>,
        assets: ViewerAssets,
    ) -> Self {
        Self {
            http,
            credentials_url,
            runtime,
            assets,
        }
    }

    pub fn assets(&self) -> &ViewerAssets {
        &self.assets
    }

    /// Resolve `urn` to a loadable model on behalf of the session holding `session_token`.
    pub async fn load_model(&self, session_token: &str, urn: &str) -> Result<LoadedModel, ViewerError> {
        let urn = urn.trim();
        if urn.is_empty() {
            return Err(ViewerError::MissingUrn);
        }
        let endpoint = self
            .credentials_url
            .as_ref()
            .ok_or(ViewerError::NotConfigured)?;

        let provider = HttpCredentialsProvider::new(self.http.clone(), endpoint, urn, session_token);
        let handle = self.runtime.init(&provider).await?;
        self.runtime.load_model(&handle, urn).await
    }
}
