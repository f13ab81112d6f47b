//! Bearer token verification collaborator.

use thiserror::Error;

/// Errors from bearer token verification.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token did not verify against any identity.
    #[error("invalid bearer token")]
    Invalid,
}

/// External identity collaborator that maps a bearer token to an owner login.
///
/// The gateway never inspects token material itself; deployments inject an
/// implementation backed by their identity store. Tests substitute fakes.
pub trait TokenVerifier: Send + Sync {
    /// Verifies a bearer token and returns the authenticated owner login.
    fn verify(&self, token: &str) -> Result<String, TokenError>;
}
