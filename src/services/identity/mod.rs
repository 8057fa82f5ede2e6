pub mod client;
pub mod session;
pub mod types;

pub use client::{IdentityBackend, IdentityClient, IdentityError};
pub use session::SessionClient;
pub use types::{Session, User};
