/*
 * Responsibility
 * - 同意画面に表示する authorization request の型
 * - 永続ストアは存在しないため、読み取り時に合成する (固定の client / scopes)
 */
use serde::Serialize;
use uuid::Uuid;

use crate::services::auth::scopes::{APP_ACCESS, PROFILE_READ};

pub const CLIENT_NAME: &str = "ChatGPT App";
pub const CLIENT_DESCRIPTION: &str = "Access your data through ChatGPT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientDescriptor {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationRequest {
    pub id: String,
    pub client: ClientDescriptor,
    pub scopes: Vec<String>,
    pub user_id: Uuid,
}

impl AuthorizationRequest {
    // TODO: replace with a lookup in a real authorization-request store once codes are
    // issued server-side (single use, with expiry).
    pub fn synthesize(id: &str, user_id: Uuid) -> Self {
        Self {
            id: id.to_string(),
            client: ClientDescriptor {
                name: CLIENT_NAME.to_string(),
                description: CLIENT_DESCRIPTION.to_string(),
            },
            scopes: vec![PROFILE_READ.to_string(), APP_ACCESS.to_string()],
            user_id,
        }
    }
}
