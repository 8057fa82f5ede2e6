/*
 * Responsibility
 * - 上流の project 一覧 API 呼び出し (session の access token を Bearer で転送)
 * - 配列以外の body は空一覧として扱う
 */
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ProjectsError {
    #[error("projects API is not configured")]
    NotConfigured,
    #[error("Failed to fetch projects ({0})")]
    Upstream(u16),
    #[error("projects API request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub urn: String,
}

#[derive(Clone, Debug)]
pub struct ProjectsClient {
    http: Client,
    url: Option<Url>,
}

impl ProjectsClient {
    pub fn new(http: Client, url: Option<Url>) -> Self {
        Self { http, url }
    }

    pub async fn list(&self, access_token: &str) -> Result<Vec<Project>, ProjectsError> {
        let url = self.url.as_ref().ok_or(ProjectsError::NotConfigured)?;

        let response = self
            .http
            .get(url.clone())
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "projects API rejected request");
            return Err(ProjectsError::Upstream(status.as_u16()));
        }

        let body: Value = response.json().await?;
        Ok(parse_projects(body))
    }
}

// Entries that are not objects are dropped; missing fields default to "".
fn parse_projects(body: Value) -> Vec<Project> {
    match body {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}
