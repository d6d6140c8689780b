use std::path::{Path, PathBuf};

use tracing::debug;

use super::keys::{KeyMaterial, verify_key_pair};
use super::{AuthenticatedIdentity, AuthenticationFailed};
use crate::archive::UploadArtifact;
use crate::config::schema::is_plain_name;

const PUBLIC_KEY_SUFFIX: &str = "_public_key.pem";

/// Verifies that a caller holds the private key matching the public key
/// stored for their identity.
#[derive(Debug, Clone)]
pub struct KeyAuthenticator {
    public_key_dir: Option<PathBuf>,
}

impl KeyAuthenticator {
    pub fn new(public_key_dir: Option<PathBuf>) -> Self {
        Self { public_key_dir }
    }

    /// `<dir>/<identity>_public_key.pem`, or `None` when the identity cannot
    /// name a key file or no key directory is configured.
    pub fn public_key_path(&self, identity: &str) -> Option<PathBuf> {
        if !is_plain_name(identity) {
            return None;
        }
        let dir = self.public_key_dir.as_deref()?;
        Some(dir.join(format!("{identity}{PUBLIC_KEY_SUFFIX}")))
    }

    /// Read the uploaded private key, delete the upload, then verify it.
    pub async fn authenticate_upload(
        &self,
        identity: &str,
        private_key: UploadArtifact,
    ) -> Result<AuthenticatedIdentity, AuthenticationFailed> {
        let read = tokio::fs::read(private_key.temp_path()).await;
        drop(private_key);

        let material = match read {
            Ok(bytes) => KeyMaterial::new(bytes),
            Err(err) => {
                debug!(identity, error = %err, "Uploaded key could not be read");
                return Err(AuthenticationFailed);
            }
        };
        self.authenticate(identity, &material).await
    }

    /// Every failure collapses to [`AuthenticationFailed`].
    pub async fn authenticate(
        &self,
        identity: &str,
        private_key: &KeyMaterial,
    ) -> Result<AuthenticatedIdentity, AuthenticationFailed> {
        let Some(path) = self.public_key_path(identity) else {
            debug!(identity, "No public key location for identity");
            return Err(AuthenticationFailed);
        };

        let public_pem = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(identity, path = %path.display(), error = %err, "Public key unavailable");
                return Err(AuthenticationFailed);
            }
        };

        match verify_key_pair(private_key.as_bytes(), &public_pem) {
            Ok(()) => {
                debug!(identity, "Key pair verified");
                Ok(AuthenticatedIdentity(identity.to_string()))
            }
            Err(err) => {
                debug!(identity, error = %err, "Key pair rejected");
                Err(AuthenticationFailed)
            }
        }
    }

    pub fn public_key_dir(&self) -> Option<&Path> {
        self.public_key_dir.as_deref()
    }
}
