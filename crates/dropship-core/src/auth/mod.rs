//! Identity verification by key-pair challenge.

mod authenticator;
pub mod keys;

use thiserror::Error;

pub use authenticator::KeyAuthenticator;
pub use keys::{KeyError, KeyMaterial, PrivateKey, PublicKey, verify_key_pair};

/// Opaque authentication failure. The cause is only logged.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("authentication failed")]
pub struct AuthenticationFailed;

/// An identity whose private key matched its stored public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity(String);

impl AuthenticatedIdentity {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AuthenticatedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
