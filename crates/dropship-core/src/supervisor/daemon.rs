use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Serialize, Serializer};

use super::SupervisorError;

/// Lifecycle state reported by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProcessState {
    Online,
    Stopping,
    Stopped,
    Launching,
    Errored,
    OneLaunchStatus,
    Unknown(String),
}

impl ProcessState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Online => "online",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Launching => "launching",
            Self::Errored => "errored",
            Self::OneLaunchStatus => "one-launch-status",
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<&str> for ProcessState {
    fn from(raw: &str) -> Self {
        match raw {
            "online" => Self::Online,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "launching" => Self::Launching,
            "errored" => Self::Errored,
            "one-launch-status" => Self::OneLaunchStatus,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProcessState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A process as the supervisor describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessRecord {
    pub name: String,
    /// OS process id; absent while not running
    pub pid: Option<u32>,
    /// Supervisor-assigned id
    pub internal_id: u32,
    pub status: ProcessState,
    pub restart_count: u32,
    /// Epoch milliseconds of the last start; absent if never started
    pub started_at_ms: Option<i64>,
}

/// What `start` should launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartRequest {
    /// Register `script` under `name` and launch it
    New { name: String, script: PathBuf },
    /// Relaunch an existing registration
    Existing { name: String },
}

impl StartRequest {
    pub fn name(&self) -> &str {
        match self {
            Self::New { name, .. } | Self::Existing { name } => name,
        }
    }
}

/// Connection to an external process supervisor.
///
/// Every call between `connect` and `disconnect` belongs to one session.
/// Operations on unknown names may fail with [`SupervisorError::NotFound`]
/// or the daemon's own rejection; callers check existence first.
#[async_trait]
pub trait SupervisorDaemon: Send + Sync + fmt::Debug {
    async fn connect(&self) -> Result<(), SupervisorError>;

    async fn disconnect(&self) -> Result<(), SupervisorError>;

    /// Returns the records of the started processes.
    async fn start(&self, request: &StartRequest) -> Result<Vec<ProcessRecord>, SupervisorError>;

    async fn stop(&self, name: &str) -> Result<Vec<ProcessRecord>, SupervisorError>;

    async fn restart(&self, name: &str) -> Result<Vec<ProcessRecord>, SupervisorError>;

    async fn delete(&self, name: &str) -> Result<Vec<ProcessRecord>, SupervisorError>;

    async fn list(&self) -> Result<Vec<ProcessRecord>, SupervisorError>;

    /// Records registered under `name`; empty when unknown.
    async fn describe(&self, name: &str) -> Result<Vec<ProcessRecord>, SupervisorError>;
}
