pub mod bearer;
pub mod session;

pub use bearer::BearerToken;
pub use session::{SessionCtx, SessionCtxExtractor};
