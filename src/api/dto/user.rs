/*
 * Responsibility
 * - GET /api/user の response DTO
 */
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::services::identity::User;

#[derive(Debug, Serialize)]
pub struct UserProfileResponse {
    pub id: Uuid,
    pub email: Option<String>,
    pub user_metadata: Value,
    pub created_at: String,
}

impl From<User> for UserProfileResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            user_metadata: user.user_metadata,
            created_at: user.created_at,
        }
    }
}
