pub mod scopes;
pub mod verifier;

pub use scopes::Scopes;
pub use verifier::TokenVerifier;
