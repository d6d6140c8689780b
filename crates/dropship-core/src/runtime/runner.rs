//! External command execution with captured output and a hard timeout.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Fully resolved command: program, arguments, working directory and
/// time limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I, working_dir: impl Into<PathBuf>, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: working_dir.into(),
            timeout,
        }
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, or -1 when terminated by a signal
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Short description of a failed run for warnings and logs.
    pub fn failure_summary(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("exit code {}", self.exit_code)
        } else {
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            format!("exit code {}: {}", self.exit_code, tail)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("command timed out after {0}s")]
    Timeout(u64),

    #[error("output capture failed: {0}")]
    OutputCapture(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs external commands. The seam lets tests script supervisor and
/// package-manager behaviour.
#[async_trait]
pub trait CommandRunner: Send + Sync + std::fmt::Debug {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError>;
}

/// Spawns real processes with tokio. On unix the child leads its own process
/// group; the whole group is killed once the child exits or the timeout
/// expires, so nothing it started outlives the call.
#[derive(Debug, Clone, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        let start = Instant::now();
        debug!(command = %spec.display(), cwd = %spec.working_dir.display(), "Running command");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group so descendants can be signalled together.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RunnerError::CommandNotFound(spec.program.clone())
            } else {
                RunnerError::Io(e)
            }
        })?;
        let group = child.id();

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::OutputCapture("stdout pipe unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::OutputCapture("stderr pipe unavailable".to_string()))?;
        let stdout_handle = tokio::spawn(read_lossy(stdout));
        let stderr_handle = tokio::spawn(read_lossy(stderr));
        let readers = [stdout_handle.abort_handle(), stderr_handle.abort_handle()];

        // Background jobs inherit the pipes, so the deadline covers draining
        // them as well as the wait.
        let collected = tokio::time::timeout(spec.timeout, async {
            let status = child.wait().await?;
            kill_process_group(group);
            let stdout = join_output(stdout_handle, "stdout").await?;
            let stderr = join_output(stderr_handle, "stderr").await?;
            Ok::<_, RunnerError>((status, stdout, stderr))
        })
        .await;

        let (status, stdout, stderr) = match collected {
            Ok(Ok(collected)) => collected,
            Ok(Err(e)) => {
                kill_process_group(group);
                readers.iter().for_each(|r| r.abort());
                return Err(e);
            }
            Err(_) => {
                warn!(
                    command = %spec.display(),
                    timeout_secs = spec.timeout.as_secs(),
                    "Command timed out, killing process group"
                );
                kill_process_group(group);
                let _ = child.start_kill();
                readers.iter().for_each(|r| r.abort());
                return Err(RunnerError::Timeout(spec.timeout.as_secs()));
            }
        };

        let output = CommandOutput {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or(-1),
            duration: start.elapsed(),
        };
        debug!(
            command = %spec.display(),
            exit_code = output.exit_code,
            elapsed_ms = output.duration.as_millis() as u64,
            "Command finished"
        );
        Ok(output)
    }
}

/// SIGKILL every process left in the child's group. The group id equals the
/// child's pid because the child was spawned with `process_group(0)`.
#[cfg(unix)]
fn kill_process_group(group: Option<u32>) {
    let Some(pgid) = group.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    // SAFETY: plain signal delivery; ESRCH for an empty group is ignored.
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_group: Option<u32>) {}

async fn read_lossy<R>(mut reader: R) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn join_output(
    handle: tokio::task::JoinHandle<std::io::Result<String>>,
    stream: &str,
) -> Result<String, RunnerError> {
    handle
        .await
        .map_err(|e| RunnerError::OutputCapture(format!("{stream} task join error: {e}")))?
        .map_err(RunnerError::Io)
}
