pub mod consent_repo;
pub mod error;
