//! The deployment sequence for an authenticated identity.
//!
//! Received -> Authorized -> Cleared -> Populated -> PostProcessed
//!
//! Authorization failures stop before anything on disk changes. Once the
//! target is cleared there is no rollback: a populate failure leaves it
//! empty (or holding only preserved paths).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::locks::DeployLocks;
use super::report::{DeploymentOutcome, DeploymentReport};
use crate::archive::{ArchiveError, ArtifactKind, UploadArtifact, extract_tar_gz, extract_zip, move_file};
use crate::auth::AuthenticatedIdentity;
use crate::error::{GatewayError, PopulateFailure};
use crate::fs::{clear_directory, content_digest};
use crate::runtime::{ApplicationType, PostProcessor};
use crate::security::{PathGuard, is_valid_subdirectory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentStage {
    Received,
    Authorized,
    Cleared,
    Populated,
    PostProcessed,
}

impl fmt::Display for DeploymentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Received => "received",
            Self::Authorized => "authorized",
            Self::Cleared => "cleared",
            Self::Populated => "populated",
            Self::PostProcessed => "post-processed",
        })
    }
}

/// One deployment request after authentication.
#[derive(Debug)]
pub struct DeploymentPlan<'a> {
    pub identity: &'a AuthenticatedIdentity,
    pub subdir: &'a str,
    pub roots: &'a [String],
    pub artifact: UploadArtifact,
    pub app_type: ApplicationType,
}

struct Populated {
    path: PathBuf,
    files: usize,
    message: &'static str,
}

#[derive(Debug, Clone)]
pub struct DeploymentPipeline {
    guard: PathGuard,
    preserve: Vec<PathBuf>,
    post: PostProcessor,
    locks: Arc<DeployLocks>,
}

impl DeploymentPipeline {
    pub fn new(
        base: &Path,
        preserve: Vec<PathBuf>,
        post: PostProcessor,
        locks: Arc<DeployLocks>,
    ) -> Self {
        Self {
            guard: PathGuard::new(base),
            preserve,
            post,
            locks,
        }
    }

    pub async fn deploy(&self, plan: DeploymentPlan<'_>) -> Result<DeploymentReport, GatewayError> {
        let DeploymentPlan {
            identity,
            subdir,
            roots,
            artifact,
            app_type,
        } = plan;
        trace_stage(identity, DeploymentStage::Received, subdir);

        if !artifact.has_safe_name() {
            return Err(GatewayError::input("Invalid file name"));
        }
        if !is_valid_subdirectory(subdir) {
            return Err(GatewayError::input("Invalid subdirectory path"));
        }
        if !self.guard.is_authorized(subdir, roots) {
            warn!(identity = %identity, subdir, "Deployment target not authorized");
            return Err(GatewayError::Authorization);
        }
        let target = self.guard.resolve_target(subdir);
        trace_stage(identity, DeploymentStage::Authorized, subdir);

        let _lock = self.locks.acquire(&target).await;

        self.clear(&target).await?;
        trace_stage(identity, DeploymentStage::Cleared, subdir);

        let populated = self.populate(artifact, &target).await?;
        trace_stage(identity, DeploymentStage::Populated, subdir);

        let tree_hash = self.digest(&target).await;

        let warning = self.post.run(app_type, &target).await;
        trace_stage(identity, DeploymentStage::PostProcessed, subdir);

        let (outcome, message) = match &warning {
            None => (DeploymentOutcome::Success, populated.message.to_string()),
            Some(warning) => (
                DeploymentOutcome::SuccessWithWarning,
                format!("{} with warnings: {}", populated.message, warning),
            ),
        };

        info!(
            identity = %identity,
            target = %target.display(),
            files = populated.files,
            app_type = %app_type,
            warning = warning.is_some(),
            "Deployment finished"
        );

        Ok(DeploymentReport {
            outcome,
            message,
            path: populated.path,
            warning,
            files: populated.files,
            tree_hash,
        })
    }

    async fn clear(&self, target: &Path) -> Result<(), GatewayError> {
        let dir = target.to_path_buf();
        let preserve = self.preserve.clone();
        let result = tokio::task::spawn_blocking(move || clear_directory(&dir, &preserve))
            .await
            .map_err(|e| GatewayError::internal(format!("clear task failed: {e}")))?;

        result.map_err(|err| {
            error!(target = %target.display(), error = %format!("{err:#}"), "Failed to clear target");
            GatewayError::internal(format!("failed to clear {}", target.display()))
        })
    }

    async fn populate(
        &self,
        artifact: UploadArtifact,
        target: &Path,
    ) -> Result<Populated, GatewayError> {
        match artifact.kind() {
            ArtifactKind::Zip => extract_zip(artifact, target)
                .await
                .map(|files| Populated {
                    path: target.to_path_buf(),
                    files,
                    message: "Files extracted successfully",
                })
                .map_err(|e| populate_error(PopulateFailure::UnzipFailed, e)),
            ArtifactKind::TarGz => extract_tar_gz(artifact, target)
                .await
                .map(|files| Populated {
                    path: target.to_path_buf(),
                    files,
                    message: "Files extracted successfully",
                })
                .map_err(|e| populate_error(PopulateFailure::TarExtractionFailed, e)),
            ArtifactKind::File => {
                let dest = target.join(artifact.original_name());
                move_file(artifact, &dest)
                    .await
                    .map(|path| Populated {
                        path,
                        files: 1,
                        message: "File uploaded successfully",
                    })
                    .map_err(|e| populate_error(PopulateFailure::UploadMoveFailed, e))
            }
        }
    }

    async fn digest(&self, target: &Path) -> Option<String> {
        let dir = target.to_path_buf();
        let skip = self.preserve.clone();
        match tokio::task::spawn_blocking(move || content_digest(&dir, &skip)).await {
            Ok(Ok(hash)) => Some(hash),
            Ok(Err(err)) => {
                warn!(target = %target.display(), error = %format!("{err:#}"), "Content digest failed");
                None
            }
            Err(err) => {
                warn!(target = %target.display(), error = %err, "Content digest task failed");
                None
            }
        }
    }
}

fn populate_error(failure: PopulateFailure, source: ArchiveError) -> GatewayError {
    error!(failure = failure.message(), error = %source, "Populate step failed");
    GatewayError::Populate { failure, source }
}

fn trace_stage(identity: &AuthenticatedIdentity, stage: DeploymentStage, subdir: &str) {
    debug!(identity = %identity, %stage, subdir, "Deployment stage");
}
