//! A supervisor kept entirely in memory, for tests and dry runs.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use super::{ProcessRecord, ProcessState, StartRequest, SupervisorDaemon, SupervisorError};

#[derive(Debug, Clone)]
struct Entry {
    record: ProcessRecord,
    script: PathBuf,
}

#[derive(Debug, Default)]
struct State {
    entries: Vec<Entry>,
    next_id: u32,
    connected: bool,
    connects: usize,
    disconnects: usize,
}

/// Process table that behaves like a supervisor daemon and counts sessions.
#[derive(Debug, Default)]
pub struct InMemoryDaemon {
    state: Mutex<State>,
    unreachable: bool,
}

impl InMemoryDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    /// A daemon whose `connect` always fails.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Pre-register a stopped process.
    pub fn with_stopped_process(self, name: &str, script: impl Into<PathBuf>) -> Self {
        {
            let mut state = self.lock();
            let internal_id = state.next_id;
            state.next_id += 1;
            state.entries.push(Entry {
                record: ProcessRecord {
                    name: name.to_string(),
                    pid: None,
                    internal_id,
                    status: ProcessState::Stopped,
                    restart_count: 0,
                    started_at_ms: None,
                },
                script: script.into(),
            });
        }
        self
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    pub fn disconnect_count(&self) -> usize {
        self.lock().disconnects
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Script registered for `name`.
    pub fn script_of(&self, name: &str) -> Option<PathBuf> {
        self.lock()
            .entries
            .iter()
            .find(|e| e.record.name == name)
            .map(|e| e.script.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session(&self) -> Result<MutexGuard<'_, State>, SupervisorError> {
        let state = self.lock();
        if !state.connected {
            return Err(SupervisorError::Unreachable("not connected".to_string()));
        }
        Ok(state)
    }

    fn update<F>(&self, name: &str, change: F) -> Result<Vec<ProcessRecord>, SupervisorError>
    where
        F: Fn(&mut ProcessRecord, u32),
    {
        let mut state = self.session()?;
        let mut touched = Vec::new();
        for entry in state.entries.iter_mut().filter(|e| e.record.name == name) {
            let pid = 10_000 + entry.record.internal_id;
            change(&mut entry.record, pid);
            touched.push(entry.record.clone());
        }
        if touched.is_empty() {
            return Err(SupervisorError::NotFound(name.to_string()));
        }
        Ok(touched)
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn launch(record: &mut ProcessRecord, pid: u32) {
    record.status = ProcessState::Online;
    record.pid = Some(pid);
    record.started_at_ms = Some(now_ms());
}

#[async_trait]
impl SupervisorDaemon for InMemoryDaemon {
    async fn connect(&self) -> Result<(), SupervisorError> {
        if self.unreachable {
            return Err(SupervisorError::Unreachable("connection refused".to_string()));
        }
        let mut state = self.lock();
        state.connected = true;
        state.connects += 1;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SupervisorError> {
        let mut state = self.lock();
        state.connected = false;
        state.disconnects += 1;
        Ok(())
    }

    async fn start(&self, request: &StartRequest) -> Result<Vec<ProcessRecord>, SupervisorError> {
        match request {
            StartRequest::New { name, script } => {
                let mut state = self.session()?;
                let internal_id = state.next_id;
                state.next_id += 1;
                let mut record = ProcessRecord {
                    name: name.clone(),
                    pid: None,
                    internal_id,
                    status: ProcessState::Launching,
                    restart_count: 0,
                    started_at_ms: None,
                };
                launch(&mut record, 10_000 + internal_id);
                state.entries.push(Entry {
                    record: record.clone(),
                    script: script.clone(),
                });
                Ok(vec![record])
            }
            StartRequest::Existing { name } => self.update(name, launch),
        }
    }

    async fn stop(&self, name: &str) -> Result<Vec<ProcessRecord>, SupervisorError> {
        self.update(name, |record, _| {
            record.status = ProcessState::Stopped;
            record.pid = None;
        })
    }

    async fn restart(&self, name: &str) -> Result<Vec<ProcessRecord>, SupervisorError> {
        self.update(name, |record, pid| {
            record.restart_count += 1;
            launch(record, pid);
        })
    }

    async fn delete(&self, name: &str) -> Result<Vec<ProcessRecord>, SupervisorError> {
        let mut state = self.session()?;
        let (removed, kept): (Vec<Entry>, Vec<Entry>) = std::mem::take(&mut state.entries)
            .into_iter()
            .partition(|e| e.record.name == name);
        state.entries = kept;
        if removed.is_empty() {
            return Err(SupervisorError::NotFound(name.to_string()));
        }
        Ok(removed.into_iter().map(|e| e.record).collect())
    }

    async fn list(&self) -> Result<Vec<ProcessRecord>, SupervisorError> {
        let state = self.session()?;
        Ok(state.entries.iter().map(|e| e.record.clone()).collect())
    }

    async fn describe(&self, name: &str) -> Result<Vec<ProcessRecord>, SupervisorError> {
        let state = self.session()?;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.record.name == name)
            .map(|e| e.record.clone())
            .collect())
    }
}
