/*
 * Responsibility
 * - identity backend が所有するデータ (User / Session) の読み取り専用コピー
 * - アプリ側はこれらを生成しない。backend の JSON をそのまま deserialize する
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// User record as reported by the identity backend.
///
/// `user_metadata` is user-controlled, `app_metadata` is application-controlled.
/// Both are kept as raw JSON because their shape is owned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub app_metadata: Value,
    /// Passed through verbatim; the backend's precision and offset format are not normalized.
    pub created_at: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Session as stored in the auth cookie and returned by the token endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    /// Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl Session {
    pub fn user_id(&self) -> Option<Uuid> {
        self.user.as_ref().map(|u| u.id)
    }

    /// A session without `expires_at` never expires client-side; the backend decides.
    pub fn expires_within(&self, now: DateTime<Utc>, margin_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - margin_seconds <= now.timestamp(),
            None => false,
        }
    }
}
