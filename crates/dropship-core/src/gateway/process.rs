use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::FutureExt;
use serde::Serialize;
use tracing::{error, info, warn};

use super::request::{ManageRequest, ProcessAction, present};
use crate::auth::KeyAuthenticator;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::security::{PathGuard, is_valid_subdirectory, normalize_path};
use crate::supervisor::{
    ProcessRecord, ProcessStatus, ProcessSupervisorClient, SupervisorDaemon, SupervisorSession,
};

/// Successful result of a process-management action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProcessOutcome {
    Started {
        name: String,
        created: bool,
        processes: Vec<ProcessRecord>,
    },
    Stopped {
        name: String,
        processes: Vec<ProcessRecord>,
    },
    Restarted {
        name: String,
        processes: Vec<ProcessRecord>,
    },
    Deleted {
        name: String,
        processes: Vec<ProcessRecord>,
    },
    Listed {
        processes: Vec<ProcessRecord>,
    },
    Status {
        name: String,
        processes: Vec<ProcessStatus>,
    },
}

impl ProcessOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::Started { name, created: true, .. } => {
                format!("New project {name} started successfully")
            }
            Self::Started { name, .. } => format!("Project {name} started successfully"),
            Self::Stopped { name, .. } => format!("Project {name} stopped successfully"),
            Self::Restarted { name, .. } => format!("Project {name} restarted successfully"),
            Self::Deleted { name, .. } => format!("Project {name} deleted successfully"),
            Self::Listed { .. } => "Process list".to_string(),
            Self::Status { name, .. } => format!("Status of project {name}"),
        }
    }
}

/// Process-management entry point: validate, authenticate, then run one
/// action inside a supervisor session.
#[derive(Debug, Clone)]
pub struct ProcessService {
    config: Arc<GatewayConfig>,
    authenticator: KeyAuthenticator,
    daemon: Arc<dyn SupervisorDaemon>,
}

impl ProcessService {
    pub fn new(
        config: Arc<GatewayConfig>,
        authenticator: KeyAuthenticator,
        daemon: Arc<dyn SupervisorDaemon>,
    ) -> Self {
        Self {
            config,
            authenticator,
            daemon,
        }
    }

    pub async fn manage(&self, request: ManageRequest) -> Result<ProcessOutcome> {
        let identity = request.identity.clone().unwrap_or_default();
        let action = request.action.clone().unwrap_or_default();
        let result = match AssertUnwindSafe(self.manage_inner(request)).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                error!(identity = %identity, action = %action, "Process management panicked");
                Err(GatewayError::internal("process management panicked"))
            }
        };

        match &result {
            Ok(outcome) => info!(identity = %identity, action = %action, "{}", outcome.message()),
            Err(err) => warn!(
                identity = %identity,
                action = %action,
                class = %err.class(),
                error = %err,
                "Manage request failed"
            ),
        }
        result
    }

    async fn manage_inner(&self, request: ManageRequest) -> Result<ProcessOutcome> {
        let ManageRequest {
            identity,
            private_key,
            action,
            project_name,
            script_path,
        } = request;
        let private_key = private_key.map(|f| f.into_artifact());

        let (Some(identity), Some(private_key)) = (present(identity), private_key) else {
            return Err(GatewayError::input("Missing required parameters"));
        };

        self.authenticator
            .authenticate_upload(&identity, private_key)
            .await?;

        let action: ProcessAction = present(action)
            .unwrap_or_default()
            .parse()
            .map_err(|_| GatewayError::input("Invalid action"))?;

        let project = present(project_name);
        let name = match (action.needs_project(), project) {
            (true, None) => return Err(GatewayError::input("Project name is required")),
            (_, project) => project.unwrap_or_default(),
        };

        let script = match (action, present(script_path)) {
            (ProcessAction::Start, Some(script)) => Some(self.resolve_script(&identity, &script)?),
            _ => None,
        };

        SupervisorSession::scoped(Arc::clone(&self.daemon), move |client| {
            dispatch(client, action, name, script)
        })
        .await
    }

    /// `script` joined onto the identity's first root.
    fn resolve_script(&self, identity: &str, script: &str) -> Result<PathBuf> {
        if !is_valid_subdirectory(script) {
            return Err(GatewayError::input("Invalid script path"));
        }
        let Some(root) = self.config.roots_for(identity).first() else {
            return Err(GatewayError::Authorization);
        };
        let guard = PathGuard::new(&self.config.upload_dir);
        let root_dir = guard.resolve_target(root);
        let resolved = normalize_path(&root_dir.join(script));
        if !resolved.starts_with(&root_dir) || !resolved.starts_with(guard.base()) {
            return Err(GatewayError::Authorization);
        }
        Ok(resolved)
    }
}

async fn dispatch(
    client: ProcessSupervisorClient,
    action: ProcessAction,
    name: String,
    script: Option<PathBuf>,
) -> Result<ProcessOutcome> {
    let outcome = match action {
        ProcessAction::Start => {
            let started = client.start(&name, script.as_deref()).await?;
            ProcessOutcome::Started {
                name,
                created: started.created,
                processes: started.processes,
            }
        }
        ProcessAction::Stop => {
            let processes = client.stop(&name).await?;
            ProcessOutcome::Stopped { name, processes }
        }
        ProcessAction::Restart => {
            let processes = client.restart(&name).await?;
            ProcessOutcome::Restarted { name, processes }
        }
        ProcessAction::Delete => {
            let processes = client.delete(&name).await?;
            ProcessOutcome::Deleted { name, processes }
        }
        ProcessAction::List => ProcessOutcome::Listed {
            processes: client.list().await?,
        },
        ProcessAction::Status => {
            let processes = client.status(&name).await?;
            ProcessOutcome::Status { name, processes }
        }
    };
    Ok(outcome)
}
