pub mod consent;
pub mod user;
