//! Application runtimes and the post-processing each one needs after its
//! files are in place.
//!
//! | type      | post-processing                                  |
//! |-----------|--------------------------------------------------|
//! | `generic` | none                                             |
//! | `node`    | `<pm> install`, then `<pm> run <deploy script>`  |

pub mod node;
pub mod runner;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use runner::{CommandOutput, CommandRunner, CommandSpec, RunnerError, TokioCommandRunner};

use crate::config::NodeRuntimeConfig;
use crate::deploy::DeployWarning;

/// Kind of application being deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationType {
    #[default]
    Generic,
    Node,
}

impl ApplicationType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Node => "node",
        }
    }
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported application type: {0}")]
pub struct UnknownApplicationType(pub String);

impl FromStr for ApplicationType {
    type Err = UnknownApplicationType;

    /// Empty input means generic.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "generic" => Ok(Self::Generic),
            "node" => Ok(Self::Node),
            _ => Err(UnknownApplicationType(s.to_string())),
        }
    }
}

/// Dispatches post-processing by application type.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    runner: Arc<dyn CommandRunner>,
    node: NodeRuntimeConfig,
}

impl PostProcessor {
    pub fn new(runner: Arc<dyn CommandRunner>, node: NodeRuntimeConfig) -> Self {
        Self { runner, node }
    }

    /// Never fails: problems come back as a warning.
    pub async fn run(&self, app_type: ApplicationType, target: &Path) -> Option<DeployWarning> {
        match app_type {
            ApplicationType::Generic => None,
            ApplicationType::Node => node::post_process(self.runner.as_ref(), &self.node, target).await,
        }
    }
}
