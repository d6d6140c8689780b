use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::archive::UploadArtifact;

/// A file a transport has already written to staging storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Name the client gave the file
    pub original_name: String,
    /// Where the transport staged it
    pub temp_path: PathBuf,
}

impl UploadedFile {
    pub fn new(original_name: impl Into<String>, temp_path: impl Into<PathBuf>) -> Self {
        Self {
            original_name: original_name.into(),
            temp_path: temp_path.into(),
        }
    }

    /// Take ownership of the staged file; it is deleted unless placed.
    pub fn into_artifact(self) -> UploadArtifact {
        UploadArtifact::new(self.original_name, self.temp_path)
    }
}

/// Multipart-style deploy request as a transport hands it over.
#[derive(Debug, Clone, Default)]
pub struct DeployRequest {
    pub identity: Option<String>,
    pub private_key: Option<UploadedFile>,
    pub artifact: Option<UploadedFile>,
    /// Target below the upload directory; empty means the base itself
    pub subdir: Option<String>,
    /// `generic` (default) or `node`
    pub app_type: Option<String>,
}

/// Process management request.
#[derive(Debug, Clone, Default)]
pub struct ManageRequest {
    pub identity: Option<String>,
    pub private_key: Option<UploadedFile>,
    pub action: Option<String>,
    pub project_name: Option<String>,
    /// Script relative to the identity's first root; only read by `start`
    pub script_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessAction {
    Start,
    Stop,
    Restart,
    Delete,
    List,
    Status,
}

impl ProcessAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Status => "status",
        }
    }

    /// Every action except `list` targets a named project.
    pub const fn needs_project(self) -> bool {
        !matches!(self, Self::List)
    }
}

impl fmt::Display for ProcessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid action")]
pub struct InvalidAction;

impl FromStr for ProcessAction {
    type Err = InvalidAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "restart" => Ok(Self::Restart),
            "delete" => Ok(Self::Delete),
            "list" => Ok(Self::List),
            "status" => Ok(Self::Status),
            _ => Err(InvalidAction),
        }
    }
}

/// Trimmed value, or `None` when absent or blank.
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
