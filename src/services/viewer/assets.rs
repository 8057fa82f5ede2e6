/*
 * Responsibility
 * - viewer の script / style を一度だけ取得してプロセス内に保持する
 * - 同時呼び出しは同じ読み込みを待つ。script 失敗時は未ロードのまま (次回再試行)
 * - style 失敗時は script だけ保持し、styled() で style だけ再取得する
 * - reset() でキャッシュを破棄する (test 用)
 */
use std::sync::{Arc, Mutex, PoisonError};

use axum::body::Bytes;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use url::Url;

use crate::services::viewer::ViewerError;

pub const SCRIPT_CONTENT_TYPE: &str = "application/javascript; charset=utf-8";
pub const STYLE_CONTENT_TYPE: &str = "text/css; charset=utf-8";

#[derive(Debug, Clone)]
pub struct Asset {
    pub body: Bytes,
    pub content_type: &'static str,
    /// Quoted strong validator (base64 SHA-256 of the body).
    pub etag: String,
}

impl Asset {
    fn new(body: Bytes, content_type: &'static str) -> Self {
        let etag = format!("\"{}\"", STANDARD.encode(Sha256::digest(&body)));
        Self {
            body,
            content_type,
            etag,
        }
    }
}

#[derive(Debug)]
pub struct AssetBundle {
    pub script: Asset,
    /// `None` when the style sheet could not be fetched; the viewer still works unstyled.
    pub style: Option<Asset>,
}

type Slot = Arc<OnceCell<Arc<AssetBundle>>>;

pub struct ViewerAssets {
    http: Client,
    script_url: Url,
    style_url: Url,
    slot: Mutex<Slot>,
}

impl std::fmt::Debug for ViewerAssets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerAssets")
            .field("script_url", &self.script_url.as_str())
            .field("style_url", &self.style_url.as_str())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl ViewerAssets {
    pub fn new(http: Client, script_url: Url, style_url: Url) -> Self {
        Self {
            http,
            script_url,
            style_url,
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Load the bundle on first use. Concurrent callers share the in-flight load.
    pub async fn get(&self) -> Result<Arc<AssetBundle>, ViewerError> {
        let slot = self.current();
        slot.get_or_try_init(|| self.load()).await.cloned()
    }

    /// Like `get`, but retries a style sheet that failed on an earlier load.
    pub async fn styled(&self) -> Result<Arc<AssetBundle>, ViewerError> {
        let slot = self.current();
        let bundle = slot.get_or_try_init(|| self.load()).await?.clone();
        if bundle.style.is_some() {
            return Ok(bundle);
        }

        let Some(style) = self.fetch_style().await else {
            return Ok(bundle);
        };
        let styled = Arc::new(AssetBundle {
            script: bundle.script.clone(),
            style: Some(style),
        });

        let mut current = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        // Leave a slot that was replaced in the meantime alone.
        if Arc::ptr_eq(&*current, &slot) {
            *current = Arc::new(OnceCell::new_with(Some(styled.clone())));
        }
        Ok(styled)
    }

    pub fn is_loaded(&self) -> bool {
        self.current().initialized()
    }

    /// Drop the cached bundle. A load already in flight completes into the old slot.
    #[cfg(test)]
    pub fn reset(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Slot::default();
    }

    fn current(&self) -> Slot {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn load(&self) -> Result<Arc<AssetBundle>, ViewerError> {
        let script = self
            .fetch(&self.script_url)
            .await
            .map_err(|e| ViewerError::Script(e.to_string()))?;

        let style = self.fetch_style().await;

        tracing::info!(
            url = %self.script_url,
            bytes = script.len(),
            styled = style.is_some(),
            "viewer assets loaded"
        );

        Ok(Arc::new(AssetBundle {
            script: Asset::new(script, SCRIPT_CONTENT_TYPE),
            style,
        }))
    }

    async fn fetch_style(&self) -> Option<Asset> {
        match self.fetch(&self.style_url).await {
            Ok(body) => Some(Asset::new(body, STYLE_CONTENT_TYPE)),
            Err(err) => {
                tracing::warn!(error = %err, url = %self.style_url, "viewer style unavailable");
                None
            }
        }
    }

    async fn fetch(&self, url: &Url) -> Result<Bytes, reqwest::Error> {
        self.http
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await
    }
}
