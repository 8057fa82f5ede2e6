/*
 * Responsibility
 * - repo が上位に伝える意味の定義
 */
use thiserror::Error;

// Postgres: undefined_table
const UNDEFINED_TABLE: &str = "42P01";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("db error")]
    Db(#[from] sqlx::Error),
    #[error("table does not exist")]
    MissingTable,
}

impl RepoError {
    pub fn from_sqlx(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(dbe) = &e
            && dbe.code().as_deref() == Some(UNDEFINED_TABLE)
        {
            return RepoError::MissingTable;
        }
        RepoError::Db(e)
    }
}
