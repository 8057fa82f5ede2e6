//! Shared test helpers: identity backend fixtures, in-memory consent stores and a
//! `TestFixture` that drives the full router against wiremock upstreams.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{body_json, header as header_is, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::app::build_router;
use crate::config::Config;
use crate::repos::consent_repo::{ConsentRecord, ConsentStore};
use crate::repos::error::RepoError;
use crate::services::identity::session::{cookie_name, encode_session};
use crate::services::identity::{IdentityBackend, IdentityClient, Session};
use crate::state::AppState;

/// User JSON as the identity backend returns it.
pub fn user_json(id: &str, scopes: Value) -> Value {
    json!({
        "id": id,
        "aud": "authenticated",
        "role": "authenticated",
        "email": "ada@example.com",
        "user_metadata": { "scopes": scopes, "full_name": "Ada Lovelace" },
        "app_metadata": { "provider": "email" },
        "created_at": "2024-05-01T12:00:00Z"
    })
}

/// Session JSON expiring `expires_in_secs` from now (negative = already expired).
pub fn session_json(access: &str, refresh: &str, expires_in_secs: i64) -> Value {
    json!({
        "access_token": access,
        "token_type": "bearer",
        "expires_in": expires_in_secs,
        "expires_at": Utc::now().timestamp() + expires_in_secs,
        "refresh_token": refresh,
        "user": user_json("6f1c3f5e-2b55-4b8e-9a51-0c2a5f7e8d10", json!(["profile:read"]))
    })
}

pub fn session_cookie_value(session: &Value) -> String {
    let session: Session = serde_json::from_value(session.clone()).expect("session json");
    encode_session(&session).expect("encode session")
}

pub async fn mock_user(server: &MockServer, token: &str, user: Value) {
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header_is("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(user))
        .mount(server)
        .await;
}

pub async fn mock_refresh(server: &MockServer, refresh_token: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_json(json!({ "refresh_token": refresh_token })))
        .respond_with(response)
        .mount(server)
        .await;
}

pub fn identity_backend(server: &MockServer) -> Arc<dyn IdentityBackend> {
    let config = Config::for_test(&server.uri(), &server.uri());
    Arc::new(IdentityClient::new(reqwest::Client::new(), &config.identity))
}

#[derive(Default)]
pub struct MemoryConsentStore {
    records: Mutex<Vec<ConsentRecord>>,
}

impl MemoryConsentStore {
    pub fn records(&self) -> Vec<ConsentRecord> {
        self.records.lock().expect("records lock").clone()
    }
}

#[async_trait]
impl ConsentStore for MemoryConsentStore {
    async fn insert(&self, record: &ConsentRecord) -> Result<(), RepoError> {
        self.records.lock().expect("records lock").push(record.clone());
        Ok(())
    }
}

/// Store whose every insert fails, either as a missing table or as a DB error.
pub struct FailingConsentStore {
    missing_table: bool,
    attempts: AtomicUsize,
}

impl FailingConsentStore {
    pub fn db_error() -> Self {
        Self {
            missing_table: false,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn missing_table() -> Self {
        Self {
            missing_table: true,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConsentStore for FailingConsentStore {
    async fn insert(&self, _record: &ConsentRecord) -> Result<(), RepoError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.missing_table {
            Err(RepoError::MissingTable)
        } else {
            Err(RepoError::Db(sqlx::Error::PoolTimedOut))
        }
    }
}

/// Buffered response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("json body")
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).expect("utf-8 body")
    }
}

/// Full router wired to two mock servers:
/// - `identity`: the identity backend
/// - `upstream`: widget host, projects API, viewer credentials, model-derivative API, CDN
pub struct TestFixture {
    pub app: Router,
    pub identity: MockServer,
    pub upstream: MockServer,
    pub consents: Arc<MemoryConsentStore>,
    pub config: Config,
}

impl TestFixture {
    pub async fn new() -> Self {
        let consents = Arc::new(MemoryConsentStore::default());
        Self::build(consents.clone(), consents).await
    }

    /// Consent inserts fail with a DB error; `consents` stays empty.
    pub async fn with_failing_store() -> Self {
        Self::build(
            Arc::new(FailingConsentStore::db_error()),
            Arc::new(MemoryConsentStore::default()),
        )
        .await
    }

    async fn build(store: Arc<dyn ConsentStore>, consents: Arc<MemoryConsentStore>) -> Self {
        let identity = MockServer::start().await;
        let upstream = MockServer::start().await;
        let config = Config::for_test(&identity.uri(), &upstream.uri());

        let state = AppState::new(&config, store).expect("app state");
        Self {
            app: build_router(state),
            identity,
            upstream,
            consents,
            config,
        }
    }

    pub fn cookie_name(&self) -> String {
        cookie_name(&self.config.identity.url)
    }

    /// `Cookie` header value carrying `session`.
    pub fn session_cookie(&self, session: &Value) -> String {
        format!("{}={}", self.cookie_name(), session_cookie_value(session))
    }

    pub async fn mock_user(&self, token: &str, user: Value) {
        mock_user(&self.identity, token, user).await;
    }

    pub async fn mock_refresh(&self, refresh_token: &str, response: ResponseTemplate) {
        mock_refresh(&self.identity, refresh_token, response).await;
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.expect("infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).expect("request"))
            .await
    }

    pub async fn get_with_header(&self, uri: &str, name: &str, value: &str) -> TestResponse {
        self.send(
            Request::get(uri)
                .header(name, value)
                .body(Body::empty())
                .expect("request"),
        )
        .await
    }

    pub async fn get_with_cookie(&self, uri: &str, cookie: &str) -> TestResponse {
        self.get_with_header(uri, header::COOKIE.as_str(), cookie).await
    }

    pub async fn get_with_auth(&self, uri: &str, authorization: Option<&str>) -> TestResponse {
        match authorization {
            Some(value) => {
                self.get_with_header(uri, header::AUTHORIZATION.as_str(), value)
                    .await
            }
            None => self.get(uri).await,
        }
    }

    pub async fn post_form(&self, uri: &str, cookie: &str, form: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::COOKIE, cookie)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .expect("request"),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> TestResponse {
        self.post_raw(uri, body.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, body: String) -> TestResponse {
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::ACCEPT, "application/json, text/event-stream")
                .body(Body::from(body))
                .expect("request"),
        )
        .await
    }
}
