//! Cookie-backed session lookup.
//!
//! The front end stores the identity backend session in a cookie named
//! `sb-<project-ref>-auth-token`. The value is the session JSON, either raw or
//! `base64-` + base64url, and large values are split across `<name>.0`, `<name>.1`, ...
//!
//! `SessionClient` only reads cookies from the request jar and writes mutations back
//! to the same jar; the caller decides whether those mutations reach the response.

use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, CookieJar};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

use crate::services::identity::client::{IdentityBackend, IdentityError};
use crate::services::identity::types::Session;

pub const MAX_CHUNK_SIZE: usize = 3180;

const BASE64_PREFIX: &str = "base64-";
const EXPIRY_MARGIN_SECONDS: i64 = 10;
const COOKIE_MAX_AGE_SECONDS: i64 = 400 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session cookie is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("session cookie is not valid utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("session cookie does not hold a session: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not build session cookie: {0}")]
    Cookie(String),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Result of a lookup: the session (if any) and the jar carrying cookie mutations.
#[derive(Debug)]
pub struct SessionLookup {
    pub session: Option<Session>,
    pub jar: CookieJar,
}

/// Cookie name used by the front end for the given identity backend URL.
pub fn cookie_name(identity_url: &Url) -> String {
    let host = identity_url.host_str().unwrap_or_default();
    let project_ref = host.split('.').next().unwrap_or_default();
    format!("sb-{project_ref}-auth-token")
}

#[derive(Clone)]
pub struct SessionClient {
    backend: Arc<dyn IdentityBackend>,
    cookie_name: String,
}

impl SessionClient {
    pub fn new(backend: Arc<dyn IdentityBackend>, cookie_name: impl Into<String>) -> Self {
        Self {
            backend,
            cookie_name: cookie_name.into(),
        }
    }

    pub async fn get_session(&self, jar: CookieJar) -> Result<SessionLookup, SessionError> {
        self.get_session_at(jar, Utc::now()).await
    }

    /// Read the session from `jar`, refreshing it when it is about to expire.
    ///
    /// - no cookie => no session
    /// - refresh rejected => no session, cookies removed
    /// - undecodable cookie / backend failure => error
    pub async fn get_session_at(
        &self,
        jar: CookieJar,
        now: DateTime<Utc>,
    ) -> Result<SessionLookup, SessionError> {
        let Some(raw) = read_raw(&jar, &self.cookie_name) else {
            return Ok(SessionLookup { session: None, jar });
        };

        let session = decode_session(&raw)?;
        if !session.expires_within(now, EXPIRY_MARGIN_SECONDS) {
            return Ok(SessionLookup {
                session: Some(session),
                jar,
            });
        }

        tracing::debug!(user_id = ?session.user_id(), "session expiring; refreshing");

        match self.backend.refresh_session(&session.refresh_token).await? {
            Some(refreshed) => {
                let jar = write_session(jar, &self.cookie_name, &refreshed)?;
                Ok(SessionLookup {
                    session: Some(refreshed),
                    jar,
                })
            }
            None => {
                tracing::info!("refresh token rejected; clearing session cookies");
                Ok(SessionLookup {
                    session: None,
                    jar: clear_session(jar, &self.cookie_name),
                })
            }
        }
    }
}

fn chunk_name(name: &str, index: usize) -> String {
    format!("{name}.{index}")
}

fn read_raw(jar: &CookieJar, name: &str) -> Option<String> {
    if let Some(cookie) = jar.get(name) {
        return Some(cookie.value().to_string());
    }

    let mut raw = String::new();
    for index in 0.. {
        match jar.get(&chunk_name(name, index)) {
            Some(chunk) => raw.push_str(chunk.value()),
            None => break,
        }
    }

    (!raw.is_empty()).then_some(raw)
}

pub fn decode_session(raw: &str) -> Result<Session, SessionError> {
    let json = match raw.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => String::from_utf8(URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('='))?)?,
        None => raw.to_string(),
    };

    Ok(serde_json::from_str(&json)?)
}

pub fn encode_session(session: &Session) -> Result<String, SessionError> {
    let json = serde_json::to_vec(session)?;
    Ok(format!("{BASE64_PREFIX}{}", URL_SAFE_NO_PAD.encode(json)))
}

fn session_cookie(name: String, value: &str) -> Result<Cookie<'static>, SessionError> {
    Cookie::parse(format!(
        "{name}={value}; Path=/; Max-Age={COOKIE_MAX_AGE_SECONDS}; SameSite=Lax"
    ))
    .map_err(|e| SessionError::Cookie(e.to_string()))
}

// Removes the cookie and every chunk of it that the browser sent.
fn clear_session(jar: CookieJar, name: &str) -> CookieJar {
    let chunk_prefix = format!("{name}.");
    let present: Vec<String> = jar
        .iter()
        .map(|c| c.name().to_string())
        .filter(|n| n == name || n.starts_with(&chunk_prefix))
        .collect();

    present.into_iter().fold(jar, |jar, n| {
        jar.remove(Cookie::build((n, "")).path("/"))
    })
}

fn write_session(jar: CookieJar, name: &str, session: &Session) -> Result<CookieJar, SessionError> {
    let value = encode_session(session)?;
    let mut jar = clear_session(jar, name);

    if value.len() <= MAX_CHUNK_SIZE {
        return Ok(jar.add(session_cookie(name.to_string(), &value)?));
    }

    // The encoded value is ASCII, so byte offsets are char boundaries.
    let mut start = 0;
    let mut index = 0;
    while start < value.len() {
        let end = (start + MAX_CHUNK_SIZE).min(value.len());
        jar = jar.add(session_cookie(chunk_name(name, index), &value[start..end])?);
        start = end;
        index += 1;
    }

    Ok(jar)
}
