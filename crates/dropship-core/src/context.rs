//! Gateway context for dependency injection.

use std::path::Path;
use std::sync::Arc;

use crate::auth::KeyAuthenticator;
use crate::config::GatewayConfig;
use crate::deploy::{DeployLocks, DeploymentPipeline};
use crate::gateway::{DeploymentService, ProcessService};
use crate::runtime::{CommandRunner, PostProcessor, TokioCommandRunner};
use crate::supervisor::{Pm2Daemon, SupervisorDaemon};

/// Shared services built once from a prepared configuration.
///
/// Transports create this at startup and hand out the two services.
/// Clones share the same deploy locks, so concurrent deployments to one
/// target serialize across every service handle.
#[derive(Debug, Clone)]
pub struct GatewayContext {
    config: Arc<GatewayConfig>,
    runner: Arc<dyn CommandRunner>,
    daemon: Arc<dyn SupervisorDaemon>,
    locks: Arc<DeployLocks>,
}

impl GatewayContext {
    /// Real processes: tokio command runner and the configured PM2 binary.
    pub fn new(config: GatewayConfig) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner);
        let daemon: Arc<dyn SupervisorDaemon> = Arc::new(Pm2Daemon::new(
            Arc::clone(&runner),
            config.supervisor.command.clone(),
            config.upload_dir.clone(),
            config.supervisor.timeout(),
        ));
        Self::with_services(config, runner, daemon)
    }

    /// Explicit runner and daemon (for testing).
    pub fn with_services(
        config: GatewayConfig,
        runner: Arc<dyn CommandRunner>,
        daemon: Arc<dyn SupervisorDaemon>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            runner,
            daemon,
            locks: Arc::new(DeployLocks::new()),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.upload_dir
    }

    pub fn authenticator(&self) -> KeyAuthenticator {
        KeyAuthenticator::new(self.config.public_key_dir.clone())
    }

    pub fn deployment_service(&self) -> DeploymentService {
        let post = PostProcessor::new(Arc::clone(&self.runner), self.config.runtime.node.clone());
        let pipeline = DeploymentPipeline::new(
            &self.config.upload_dir,
            self.config.preserve_paths(),
            post,
            Arc::clone(&self.locks),
        );
        DeploymentService::new(Arc::clone(&self.config), self.authenticator(), pipeline)
    }

    pub fn process_service(&self) -> ProcessService {
        ProcessService::new(
            Arc::clone(&self.config),
            self.authenticator(),
            Arc::clone(&self.daemon),
        )
    }
}
