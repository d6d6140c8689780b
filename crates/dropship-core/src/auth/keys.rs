//! RSA key material parsing.
//!
//! Private keys are accepted as PKCS#8 (`PRIVATE KEY`) or PKCS#1
//! (`RSA PRIVATE KEY`) PEM. Public keys are accepted as SubjectPublicKeyInfo
//! (`PUBLIC KEY`) or PKCS#1 (`RSA PUBLIC KEY`) PEM. RSA moduli must be
//! 2048 to 8192 bits; smaller keys are rejected when parsed.

use ring::rand::SystemRandom;
use ring::signature::{self, RsaKeyPair, UnparsedPublicKey};
use std::fmt;
use thiserror::Error;
use x509_parser::oid_registry::OID_PKCS1_RSAENCRYPTION;
use x509_parser::prelude::FromDer;
use x509_parser::x509::SubjectPublicKeyInfo;

/// Fixed challenge signed with the private key and checked against the
/// stored public key.
pub const CHALLENGE: &[u8] = b"test_data";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("not valid PEM: {0}")]
    Pem(String),

    #[error("unsupported PEM label '{0}'")]
    UnsupportedLabel(String),

    #[error("key rejected: {0}")]
    Rejected(String),

    #[error("malformed public key")]
    MalformedPublicKey,

    #[error("signing failed")]
    SigningFailed,

    #[error("signature does not verify against the public key")]
    Mismatch,
}

/// Uploaded key bytes, zeroed when dropped.
pub struct KeyMaterial(Vec<u8>);

impl KeyMaterial {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.0.fill(0);
        std::hint::black_box(&self.0);
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(<redacted>)")
    }
}

/// Parsed RSA private key.
pub struct PrivateKey(RsaKeyPair);

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("modulus_len", &self.0.public_modulus_len())
            .finish()
    }
}

impl PrivateKey {
    pub fn from_pem(input: &[u8]) -> Result<Self, KeyError> {
        let pem = pem::parse(input).map_err(|e| KeyError::Pem(e.to_string()))?;
        let pair = match pem.tag() {
            "PRIVATE KEY" => RsaKeyPair::from_pkcs8(pem.contents()),
            "RSA PRIVATE KEY" => RsaKeyPair::from_der(pem.contents()),
            other => return Err(KeyError::UnsupportedLabel(other.to_string())),
        }
        .map_err(|e| KeyError::Rejected(e.to_string()))?;
        Ok(Self(pair))
    }

    /// PKCS#1 v1.5 SHA-256 signature over `message`.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        let rng = SystemRandom::new();
        let mut signature = vec![0u8; self.0.public_modulus_len()];
        self.0
            .sign(&signature::RSA_PKCS1_SHA256, &rng, message, &mut signature)
            .map_err(|_| KeyError::SigningFailed)?;
        Ok(signature)
    }
}

/// RSA public key as PKCS#1 `RSAPublicKey` DER.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn from_pem(input: &[u8]) -> Result<Self, KeyError> {
        let pem = pem::parse(input).map_err(|e| KeyError::Pem(e.to_string()))?;
        match pem.tag() {
            "PUBLIC KEY" => rsa_public_key_from_spki(pem.contents()).map(Self),
            "RSA PUBLIC KEY" => Ok(Self(pem.contents().to_vec())),
            other => Err(KeyError::UnsupportedLabel(other.to_string())),
        }
    }

    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), KeyError> {
        UnparsedPublicKey::new(&signature::RSA_PKCS1_2048_8192_SHA256, &self.0)
            .verify(message, signature)
            .map_err(|_| KeyError::Mismatch)
    }
}

/// Sign the challenge with `private_pem` and verify it with `public_pem`.
pub fn verify_key_pair(private_pem: &[u8], public_pem: &[u8]) -> Result<(), KeyError> {
    let private_key = PrivateKey::from_pem(private_pem)?;
    let public_key = PublicKey::from_pem(public_pem)?;
    let signature = private_key.sign(CHALLENGE)?;
    public_key.verify(CHALLENGE, &signature)
}

/// Unwrap SubjectPublicKeyInfo into the PKCS#1 `RSAPublicKey` it carries.
fn rsa_public_key_from_spki(der: &[u8]) -> Result<Vec<u8>, KeyError> {
    let (rest, spki) =
        SubjectPublicKeyInfo::from_der(der).map_err(|_| KeyError::MalformedPublicKey)?;
    if !rest.is_empty() || spki.subject_public_key.unused_bits != 0 {
        return Err(KeyError::MalformedPublicKey);
    }
    if spki.algorithm.algorithm != OID_PKCS1_RSAENCRYPTION {
        return Err(KeyError::Rejected(format!(
            "unsupported key algorithm {}",
            spki.algorithm.algorithm
        )));
    }
    Ok(spki.subject_public_key.data.to_vec())
}
