//! Process supervision through an external daemon.
//!
//! [`SupervisorSession::scoped`] brackets every operation with connect and
//! disconnect; [`ProcessSupervisorClient`] carries the lifecycle rules on
//! top of a [`SupervisorDaemon`] implementation.

mod client;
mod daemon;
mod memory;
mod pm2;
mod session;

use thiserror::Error;

pub use client::{ProcessStatus, ProcessSupervisorClient, StartOutcome};
pub use daemon::{ProcessRecord, ProcessState, StartRequest, SupervisorDaemon};
pub use memory::InMemoryDaemon;
pub use pm2::{Pm2Daemon, parse_process_list};
pub use session::SupervisorSession;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("supervisor unreachable: {0}")]
    Unreachable(String),

    #[error("supervisor rejected {operation}: {message}")]
    Rejected { operation: String, message: String },

    #[error("unexpected supervisor output: {0}")]
    Protocol(String),

    #[error("process {0} not found")]
    NotFound(String),

    #[error("script path is required to start new process {0}")]
    ScriptRequired(String),

    #[error("supervisor session panicked")]
    Panicked,
}
