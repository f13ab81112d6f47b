//! SSH authentication collaborator.

use russh_keys::key::PublicKey;

/// External credential-verification collaborator for the SSH listener.
///
/// The gateway treats authentication as a boolean gate; the actual decision
/// belongs to a deployment's identity store. There is deliberately no
/// accept-all implementation in non-test code.
pub trait SshAuthorizer: Send + Sync {
    /// Decides a password login attempt.
    fn authorize_password(&self, user: &str, password: &str) -> bool;

    /// Decides a public-key login attempt.
    fn authorize_public_key(&self, user: &str, key: &PublicKey) -> bool;
}

/// Rejects every credential. The default until a deployment wires a real
/// identity collaborator.
pub struct DenyAll;

impl SshAuthorizer for DenyAll {
    fn authorize_password(&self, _user: &str, _password: &str) -> bool {
        false
    }

    fn authorize_public_key(&self, _user: &str, _key: &PublicKey) -> bool {
        false
    }
}
