use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Whether post-processing finished cleanly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentOutcome {
    Success,
    SuccessWithWarning,
}

/// Non-fatal post-processing problem. The files are in place either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeployWarning {
    NoManifest,
    ManifestUnreadable { reason: String },
    DependencyInstallFailed { reason: String },
    BuildScriptFailed { script: String, reason: String },
    NoDeployScript { script: String },
}

impl fmt::Display for DeployWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoManifest => write!(f, "No package.json found, skipped dependency install"),
            Self::ManifestUnreadable { reason } => {
                write!(f, "package.json could not be read: {reason}")
            }
            Self::DependencyInstallFailed { reason } => {
                write!(f, "Dependency install failed: {reason}")
            }
            Self::BuildScriptFailed { script, reason } => {
                write!(f, "Script '{script}' failed: {reason}")
            }
            Self::NoDeployScript { script } => {
                write!(f, "No '{script}' script in package.json, skipped build")
            }
        }
    }
}

/// Result of a deployment that placed its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentReport {
    pub outcome: DeploymentOutcome,
    pub message: String,
    /// Target directory, or the placed file for single-file uploads
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<DeployWarning>,
    /// Number of regular files written by the populate step
    pub files: usize,
    /// Content digest of the target after population
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_hash: Option<String>,
}

impl DeploymentReport {
    pub fn is_clean(&self) -> bool {
        self.outcome == DeploymentOutcome::Success
    }
}
