pub mod consent;
pub mod health;
pub mod projects;
pub mod user;
pub mod viewer;
