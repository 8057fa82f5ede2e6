pub mod authorization;
pub mod recorder;

pub use authorization::AuthorizationRequest;
pub use recorder::{ConsentError, ConsentRecorder};
