//! PM2 driven through its command line.
//!
//! Each call is a separate `pm2` invocation, so `connect` only checks that
//! the daemon answers and `disconnect` has nothing to release.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{ProcessRecord, ProcessState, StartRequest, SupervisorDaemon, SupervisorError};
use crate::runtime::{CommandOutput, CommandRunner, CommandSpec};

#[derive(Debug, Deserialize)]
struct JlistProcess {
    name: String,
    #[serde(default)]
    pid: Option<u32>,
    #[serde(default)]
    pm_id: u32,
    #[serde(default)]
    pm2_env: JlistEnv,
}

#[derive(Debug, Default, Deserialize)]
struct JlistEnv {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    restart_time: u32,
    #[serde(default)]
    pm_uptime: Option<i64>,
}

impl From<JlistProcess> for ProcessRecord {
    fn from(raw: JlistProcess) -> Self {
        Self {
            name: raw.name,
            pid: raw.pid.filter(|pid| *pid != 0),
            internal_id: raw.pm_id,
            status: raw
                .pm2_env
                .status
                .as_deref()
                .map(ProcessState::from)
                .unwrap_or_else(|| ProcessState::Unknown(String::new())),
            restart_count: raw.pm2_env.restart_time,
            started_at_ms: raw.pm2_env.pm_uptime.filter(|t| *t > 0),
        }
    }
}

/// Parse `pm2 jlist` output. Banner or warning text printed before the
/// JSON array is skipped.
pub fn parse_process_list(stdout: &str) -> Result<Vec<ProcessRecord>, SupervisorError> {
    let mut last_error = None;
    for (start, _) in stdout.match_indices('[') {
        match serde_json::from_str::<Vec<JlistProcess>>(stdout[start..].trim_end()) {
            Ok(raw) => return Ok(raw.into_iter().map(ProcessRecord::from).collect()),
            Err(err) => last_error = Some(err.to_string()),
        }
    }
    Err(SupervisorError::Protocol(
        last_error.unwrap_or_else(|| "no process list in output".to_string()),
    ))
}

#[derive(Debug, Clone)]
pub struct Pm2Daemon {
    runner: Arc<dyn CommandRunner>,
    command: String,
    working_dir: PathBuf,
    timeout: Duration,
}

impl Pm2Daemon {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        command: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            command: command.into(),
            working_dir: working_dir.into(),
            timeout,
        }
    }

    async fn pm2(&self, args: &[&str]) -> Result<CommandOutput, SupervisorError> {
        let operation = args.first().copied().unwrap_or_default().to_string();
        let spec = CommandSpec::new(&self.command, args.iter().copied(), &self.working_dir, self.timeout);
        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| SupervisorError::Unreachable(e.to_string()))?;

        if !output.success() {
            let message = match output.stderr.trim() {
                "" => format!("exit code {}", output.exit_code),
                stderr => stderr.to_string(),
            };
            return Err(SupervisorError::Rejected { operation, message });
        }
        Ok(output)
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[async_trait]
impl SupervisorDaemon for Pm2Daemon {
    async fn connect(&self) -> Result<(), SupervisorError> {
        self.pm2(&["ping"]).await.map_err(|err| match err {
            SupervisorError::Rejected { message, .. } => SupervisorError::Unreachable(message),
            other => other,
        })?;
        debug!(command = %self.command, "Supervisor reachable");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SupervisorError> {
        Ok(())
    }

    async fn start(&self, request: &StartRequest) -> Result<Vec<ProcessRecord>, SupervisorError> {
        match request {
            StartRequest::New { name, script } => {
                let script = path_arg(script);
                self.pm2(&["start", &script, "--name", name]).await?;
            }
            StartRequest::Existing { name } => {
                self.pm2(&["start", name]).await?;
            }
        }
        self.describe(request.name()).await
    }

    async fn stop(&self, name: &str) -> Result<Vec<ProcessRecord>, SupervisorError> {
        self.pm2(&["stop", name]).await?;
        self.describe(name).await
    }

    async fn restart(&self, name: &str) -> Result<Vec<ProcessRecord>, SupervisorError> {
        self.pm2(&["restart", name]).await?;
        self.describe(name).await
    }

    async fn delete(&self, name: &str) -> Result<Vec<ProcessRecord>, SupervisorError> {
        let records = self.describe(name).await?;
        self.pm2(&["delete", name]).await?;
        Ok(records)
    }

    async fn list(&self) -> Result<Vec<ProcessRecord>, SupervisorError> {
        let output = self.pm2(&["jlist"]).await?;
        parse_process_list(&output.stdout)
    }

    async fn describe(&self, name: &str) -> Result<Vec<ProcessRecord>, SupervisorError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|record| record.name == name)
            .collect())
    }
}
