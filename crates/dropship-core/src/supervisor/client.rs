use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use super::{ProcessRecord, ProcessState, StartRequest, SupervisorDaemon, SupervisorError};

/// Result of `start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartOutcome {
    /// True when a new registration was created
    pub created: bool,
    pub processes: Vec<ProcessRecord>,
}

/// Caller-facing summary of a supervised process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessStatus {
    pub name: String,
    pub pid: Option<u32>,
    pub internal_id: u32,
    pub status: ProcessState,
    pub restarts: u32,
    /// Milliseconds since the last start; absent if never started
    pub uptime_ms: Option<i64>,
}

impl ProcessStatus {
    pub fn from_record(record: &ProcessRecord, now_ms: i64) -> Self {
        Self {
            name: record.name.clone(),
            pid: record.pid,
            internal_id: record.internal_id,
            status: record.status.clone(),
            restarts: record.restart_count,
            uptime_ms: record
                .started_at_ms
                .map(|started| now_ms.saturating_sub(started).max(0)),
        }
    }
}

/// Lifecycle rules on top of a daemon connection. Only valid inside a
/// [`super::SupervisorSession`].
#[derive(Debug, Clone)]
pub struct ProcessSupervisorClient {
    daemon: Arc<dyn SupervisorDaemon>,
}

impl ProcessSupervisorClient {
    pub(crate) fn new(daemon: Arc<dyn SupervisorDaemon>) -> Self {
        Self { daemon }
    }

    /// Start `name`, registering it with `script` when it is unknown.
    ///
    /// A known name is relaunched from its existing registration and
    /// `script` is ignored.
    pub async fn start(
        &self,
        name: &str,
        script: Option<&Path>,
    ) -> Result<StartOutcome, SupervisorError> {
        let existing = self.daemon.describe(name).await?;

        let (request, created) = if existing.is_empty() {
            let script = script.ok_or_else(|| SupervisorError::ScriptRequired(name.to_string()))?;
            (
                StartRequest::New {
                    name: name.to_string(),
                    script: script.to_path_buf(),
                },
                true,
            )
        } else {
            if script.is_some() {
                debug!(name, "Process already registered, ignoring script path");
            }
            (
                StartRequest::Existing {
                    name: name.to_string(),
                },
                false,
            )
        };

        let processes = self.daemon.start(&request).await?;
        info!(name, created, "Process started");
        Ok(StartOutcome { created, processes })
    }

    pub async fn stop(&self, name: &str) -> Result<Vec<ProcessRecord>, SupervisorError> {
        self.require_known(name).await?;
        let records = self.daemon.stop(name).await?;
        info!(name, "Process stopped");
        Ok(records)
    }

    pub async fn restart(&self, name: &str) -> Result<Vec<ProcessRecord>, SupervisorError> {
        self.require_known(name).await?;
        let records = self.daemon.restart(name).await?;
        info!(name, "Process restarted");
        Ok(records)
    }

    pub async fn delete(&self, name: &str) -> Result<Vec<ProcessRecord>, SupervisorError> {
        self.require_known(name).await?;
        let records = self.daemon.delete(name).await?;
        info!(name, "Process deleted");
        Ok(records)
    }

    pub async fn list(&self) -> Result<Vec<ProcessRecord>, SupervisorError> {
        self.daemon.list().await
    }

    pub async fn describe(&self, name: &str) -> Result<Vec<ProcessRecord>, SupervisorError> {
        self.daemon.describe(name).await
    }

    pub async fn status(&self, name: &str) -> Result<Vec<ProcessStatus>, SupervisorError> {
        let records = self.require_known(name).await?;
        let now_ms = Utc::now().timestamp_millis();
        Ok(records
            .iter()
            .map(|record| ProcessStatus::from_record(record, now_ms))
            .collect())
    }

    async fn require_known(&self, name: &str) -> Result<Vec<ProcessRecord>, SupervisorError> {
        let records = self.daemon.describe(name).await?;
        if records.is_empty() {
            return Err(SupervisorError::NotFound(name.to_string()));
        }
        Ok(records)
    }
}
