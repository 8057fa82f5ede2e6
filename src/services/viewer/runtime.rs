//! Narrow adapter over the 3D viewer runtime.
//!
//! Everything the viewer needs goes through two traits:
//! - `CredentialsProvider` hands out a viewer access token
//! - `ViewerRuntime` turns credentials into a handle and a URN into a loadable model
//!
//! `DerivativeViewer` implements the runtime against the model-derivative REST API
//! by reading the translation manifest and picking the default geometry.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::services::viewer::ViewerError;

const URN_PREFIX: &str = "urn:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerCredentials {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    async fn credentials(&self) -> Result<ViewerCredentials, ViewerError>;
}

/// Credentials fetched from an upstream token endpoint, authenticated with the user's
/// session token. The URN is passed along so the upstream can scope the token.
pub struct HttpCredentialsProvider {
    http: Client,
    url: Url,
    session_token: String,
}

impl HttpCredentialsProvider {
    pub fn new(http: Client, endpoint: &Url, urn: &str, session_token: impl Into<String>) -> Self {
        let mut url = endpoint.clone();
        url.query_pairs_mut().append_pair("urn", urn);
        Self {
            http,
            url,
            session_token: session_token.into(),
        }
    }
}

#[async_trait]
impl CredentialsProvider for HttpCredentialsProvider {
    async fn credentials(&self) -> Result<ViewerCredentials, ViewerError> {
        let response = self
            .http
            .get(self.url.clone())
            .bearer_auth(&self.session_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ViewerError::Credentials(status.as_u16()));
        }

        Ok(response.json().await?)
    }
}

/// Initialised runtime: API endpoint plus the credentials it was initialised with.
#[derive(Debug, Clone)]
pub struct ViewerHandle {
    pub api_endpoint: Url,
    pub credentials: ViewerCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub guid: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedModel {
    /// Always carries the `urn:` prefix.
    pub document_id: String,
    pub geometry: Geometry,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

#[async_trait]
pub trait ViewerRuntime: Send + Sync {
    async fn init(&self, provider: &dyn CredentialsProvider) -> Result<ViewerHandle, ViewerError>;

    async fn load_model(&self, handle: &ViewerHandle, urn: &str) -> Result<LoadedModel, ViewerError>;
}

pub fn document_id(urn: &str) -> String {
    if urn.starts_with(URN_PREFIX) {
        urn.to_string()
    } else {
        format!("{URN_PREFIX}{urn}")
    }
}

#[derive(Clone, Debug)]
pub struct DerivativeViewer {
    http: Client,
    api_endpoint: Url,
}

impl DerivativeViewer {
    pub fn new(http: Client, api_endpoint: Url) -> Self {
        Self { http, api_endpoint }
    }

    fn manifest_url(base: &Url, urn: &str) -> Result<Url, ViewerError> {
        let encoded = urn.strip_prefix(URN_PREFIX).unwrap_or(urn);
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| ViewerError::InvalidEndpoint)?
            .pop_if_empty()
            .extend(["modelderivative", "v2", "designdata", encoded, "manifest"]);
        Ok(url)
    }
}

#[async_trait]
impl ViewerRuntime for DerivativeViewer {
    async fn init(&self, provider: &dyn CredentialsProvider) -> Result<ViewerHandle, ViewerError> {
        let credentials = provider.credentials().await?;
        Ok(ViewerHandle {
            api_endpoint: self.api_endpoint.clone(),
            credentials,
        })
    }

    async fn load_model(&self, handle: &ViewerHandle, urn: &str) -> Result<LoadedModel, ViewerError> {
        let url = Self::manifest_url(&handle.api_endpoint, urn)?;
        tracing::debug!(%url, "reading model manifest");

        let response = self
            .http
            .get(url)
            .bearer_auth(&handle.credentials.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ViewerError::Manifest(status.as_u16()));
        }

        let manifest: Manifest = response.json().await?;
        if manifest.translation_failed() {
            return Err(ViewerError::TranslationFailed(manifest.status));
        }

        let node = manifest
            .default_geometry()
            .ok_or(ViewerError::NoViewableGeometry)?;

        Ok(LoadedModel {
            document_id: document_id(urn),
            geometry: Geometry {
                guid: node.guid.clone(),
                role: node.role.clone().unwrap_or_default(),
                name: node.name.clone(),
            },
            access_token: handle.credentials.access_token.clone(),
            expires_in: handle.credentials.expires_in,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    status: String,
    #[serde(default)]
    derivatives: Vec<ManifestNode>,
}

#[derive(Debug, Deserialize)]
struct ManifestNode {
    #[serde(default)]
    guid: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    children: Vec<ManifestNode>,
}

impl Manifest {
    fn translation_failed(&self) -> bool {
        matches!(self.status.as_str(), "failed" | "timeout")
    }

    /// First 3D geometry in document order, else the first 2D one.
    fn default_geometry(&self) -> Option<&ManifestNode> {
        let mut geometries = Vec::new();
        for derivative in &self.derivatives {
            derivative.collect_geometries(&mut geometries);
        }

        let with_role = |role: &str| {
            geometries
                .iter()
                .copied()
                .find(|node| node.role.as_deref() == Some(role))
        };
        with_role("3d").or_else(|| with_role("2d"))
    }
}

impl ManifestNode {
    fn collect_geometries<'a>(&'a self, out: &mut Vec<&'a ManifestNode>) {
        if self.kind.as_deref() == Some("geometry") {
            out.push(self);
        }
        for child in &self.children {
            child.collect_geometries(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedCredentials;

    #[async_trait]
    impl CredentialsProvider for FixedCredentials {
        async fn credentials(&self) -> Result<ViewerCredentials, ViewerError> {
            Ok(ViewerCredentials {
                access_token: "aps-token".into(),
                expires_in: Some(3599),
            })
        }
    }

    fn manifest(status: &str, children: serde_json::Value) -> serde_json::Value {
        json!({
            "urn": "dXJuOm1vZGVs",
            "status": status,
            "derivatives": [{ "outputType": "svf", "status": status, "children": children }]
        })
    }

    async fn load(server: &MockServer, body: serde_json::Value) -> Result<LoadedModel, ViewerError> {
        Mock::given(method("GET"))
            .and(path("/modelderivative/v2/designdata/dXJuOm1vZGVs/manifest"))
            .and(header("authorization", "Bearer aps-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;

        let viewer = DerivativeViewer::new(Client::new(), Url::parse(&server.uri()).unwrap());
        let handle = viewer.init(&FixedCredentials).await?;
        viewer.load_model(&handle, "urn:dXJuOm1vZGVs").await
    }

    #[test]
    fn document_id_gets_prefix_once() {
        assert_eq!(document_id("abc"), "urn:abc");
        assert_eq!(document_id("urn:abc"), "urn:abc");
    }

    #[tokio::test]
    async fn prefers_3d_geometry() {
        let server = MockServer::start().await;
        let body = manifest(
            "success",
            json!([
                { "guid": "sheet", "type": "geometry", "role": "2d", "name": "A101" },
                { "guid": "folder", "type": "folder", "children": [
                    { "guid": "view3d", "type": "geometry", "role": "3d", "name": "{3D}" }
                ]}
            ]),
        );

        let model = load(&server, body).await.unwrap();
        assert_eq!(model.document_id, "urn:dXJuOm1vZGVs");
        assert_eq!(model.geometry.guid, "view3d");
        assert_eq!(model.access_token, "aps-token");
    }

    #[tokio::test]
    async fn falls_back_to_2d_geometry() {
        let server = MockServer::start().await;
        let body = manifest(
            "success",
            json!([{ "guid": "sheet", "type": "geometry", "role": "2d" }]),
        );

        let model = load(&server, body).await.unwrap();
        assert_eq!(model.geometry.role, "2d");
    }

    #[tokio::test]
    async fn no_geometry_is_reported() {
        let server = MockServer::start().await;
        let body = manifest("success", json!([{ "guid": "thumb", "type": "resource" }]));

        assert!(matches!(
            load(&server, body).await.unwrap_err(),
            ViewerError::NoViewableGeometry
        ));
    }

    #[tokio::test]
    async fn failed_translation_is_reported() {
        let server = MockServer::start().await;
        let body = manifest("failed", json!([]));

        assert!(matches!(
            load(&server, body).await.unwrap_err(),
            ViewerError::TranslationFailed(status) if status == "failed"
        ));
    }

    #[tokio::test]
    async fn credentials_are_fetched_with_session_token_and_urn() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/aps-token"))
            .and(query_param("urn", "dXJuOm1vZGVs"))
            .and(header("authorization", "Bearer session"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "access_token": "aps", "expires_in": 3599 })),
            )
            .mount(&server)
            .await;

        let endpoint = Url::parse(&format!("{}/api/auth/aps-token", server.uri())).unwrap();
        let provider = HttpCredentialsProvider::new(Client::new(), &endpoint, "dXJuOm1vZGVs", "session");

        let credentials = provider.credentials().await.unwrap();
        assert_eq!(credentials.access_token, "aps");
        assert_eq!(credentials.expires_in, Some(3599));
    }

    #[tokio::test]
    async fn credentials_failure_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let endpoint = Url::parse(&server.uri()).unwrap();
        let provider = HttpCredentialsProvider::new(Client::new(), &endpoint, "u", "session");

        let err = provider.credentials().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch credentials (401)");
    }
}
