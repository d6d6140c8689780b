mod common;

use dropship_core::auth::{AuthenticationFailed, KeyAuthenticator, KeyMaterial};
use tempfile::TempDir;

fn material(identity: &str) -> KeyMaterial {
    KeyMaterial::new(std::fs::read(common::private_key_path(identity)).unwrap())
}

fn authenticator() -> KeyAuthenticator {
    KeyAuthenticator::new(Some(common::keys_dir()))
}

// =============================================================================
// Accepted key pairs
// =============================================================================

#[tokio::test]
async fn own_key_authenticates() {
    let identity = authenticator()
        .authenticate("alice", &material("alice"))
        .await
        .unwrap();
    assert_eq!(identity.name(), "alice");
}

#[tokio::test]
async fn pkcs1_encoded_pair_authenticates() {
    assert!(authenticator()
        .authenticate("carol", &material("carol"))
        .await
        .is_ok());
}

// =============================================================================
// Rejections are indistinguishable
// =============================================================================

#[tokio::test]
async fn someone_elses_key_is_rejected() {
    let err = authenticator()
        .authenticate("bob", &material("alice"))
        .await
        .unwrap_err();
    assert_eq!(err, AuthenticationFailed);
}

#[tokio::test]
async fn unknown_identity_is_rejected_the_same_way() {
    let err = authenticator()
        .authenticate("mallory", &material("alice"))
        .await
        .unwrap_err();
    assert_eq!(err, AuthenticationFailed);
    assert_eq!(err.to_string(), "authentication failed");
}

#[tokio::test]
async fn malformed_key_is_rejected() {
    let err = authenticator()
        .authenticate("alice", &KeyMaterial::new(b"-----BEGIN NOTHING-----".to_vec()))
        .await
        .unwrap_err();
    assert_eq!(err, AuthenticationFailed);
}

#[tokio::test]
async fn traversing_identity_is_rejected() {
    let err = authenticator()
        .authenticate("../keys/alice", &material("alice"))
        .await
        .unwrap_err();
    assert_eq!(err, AuthenticationFailed);
}

#[tokio::test]
async fn missing_key_directory_rejects_everyone() {
    let err = KeyAuthenticator::new(None)
        .authenticate("alice", &material("alice"))
        .await
        .unwrap_err();
    assert_eq!(err, AuthenticationFailed);
}

// =============================================================================
// Uploaded key files
// =============================================================================

#[tokio::test]
async fn uploaded_key_is_deleted_after_success() {
    let staging = TempDir::new().unwrap();
    let upload = common::stage_private_key(staging.path(), "alice");
    let staged = upload.temp_path.clone();

    authenticator()
        .authenticate_upload("alice", upload.into_artifact())
        .await
        .unwrap();
    assert!(!staged.exists());
}

#[tokio::test]
async fn uploaded_key_is_deleted_after_failure() {
    let staging = TempDir::new().unwrap();
    let upload = common::stage_private_key(staging.path(), "alice");
    let staged = upload.temp_path.clone();

    let result = authenticator()
        .authenticate_upload("bob", upload.into_artifact())
        .await;
    assert!(result.is_err());
    assert!(!staged.exists());
}
