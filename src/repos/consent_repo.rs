/*
 * Responsibility
 * - oauth_consents テーブル向け SQLx 操作 (INSERT のみ)
 * - 失敗は RepoError で返す。握りつぶすかどうかは呼び出し側 (ConsentRecorder) が決める
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::repos::error::RepoError;

#[derive(Debug, Clone, PartialEq)]
pub struct ConsentRecord {
    pub authorization_id: String,
    pub user_id: Uuid,
    pub approved: bool,
    pub scopes: Vec<String>,
    pub approved_at: DateTime<Utc>,
}

#[async_trait]
pub trait ConsentStore: Send + Sync {
    async fn insert(&self, record: &ConsentRecord) -> Result<(), RepoError>;
}

#[derive(Clone, Debug)]
pub struct PgConsentStore {
    db: PgPool,
}

impl PgConsentStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConsentStore for PgConsentStore {
    async fn insert(&self, record: &ConsentRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO oauth_consents (authorization_id, user_id, approved, scopes, approved_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.authorization_id)
        .bind(record.user_id)
        .bind(record.approved)
        .bind(&record.scopes)
        .bind(record.approved_at)
        .execute(&self.db)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(())
    }
}
