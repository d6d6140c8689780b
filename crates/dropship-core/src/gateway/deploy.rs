use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{error, info, warn};

use super::request::{DeployRequest, present};
use crate::auth::KeyAuthenticator;
use crate::config::GatewayConfig;
use crate::deploy::{DeploymentPipeline, DeploymentPlan, DeploymentReport};
use crate::error::{GatewayError, Result};
use crate::runtime::ApplicationType;

/// Deploy entry point: validate input, authenticate, then run the pipeline.
#[derive(Debug, Clone)]
pub struct DeploymentService {
    config: Arc<GatewayConfig>,
    authenticator: KeyAuthenticator,
    pipeline: DeploymentPipeline,
}

impl DeploymentService {
    pub fn new(
        config: Arc<GatewayConfig>,
        authenticator: KeyAuthenticator,
        pipeline: DeploymentPipeline,
    ) -> Self {
        Self {
            config,
            authenticator,
            pipeline,
        }
    }

    /// Staged uploads in `request` are deleted on every path except a
    /// single-file upload that was moved into place.
    pub async fn deploy(&self, request: DeployRequest) -> Result<DeploymentReport> {
        let identity = request.identity.clone().unwrap_or_default();
        let result = match AssertUnwindSafe(self.deploy_inner(request)).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                error!(identity = %identity, "Deployment panicked");
                Err(GatewayError::internal("deployment panicked"))
            }
        };

        match &result {
            Ok(report) => info!(
                identity = %identity,
                path = %report.path.display(),
                outcome = ?report.outcome,
                "Deploy request completed"
            ),
            Err(err) => warn!(
                identity = %identity,
                class = %err.class(),
                error = %err,
                "Deploy request failed"
            ),
        }
        result
    }

    async fn deploy_inner(&self, request: DeployRequest) -> Result<DeploymentReport> {
        let DeployRequest {
            identity,
            private_key,
            artifact,
            subdir,
            app_type,
        } = request;
        let private_key = private_key.map(|f| f.into_artifact());
        let artifact = artifact.map(|f| f.into_artifact());

        let (Some(identity), Some(private_key)) = (present(identity), private_key) else {
            return Err(GatewayError::input("Missing required parameters"));
        };
        let Some(artifact) = artifact else {
            return Err(GatewayError::input("Missing required files"));
        };

        let authenticated = self
            .authenticator
            .authenticate_upload(&identity, private_key)
            .await?;

        let app_type = app_type
            .unwrap_or_default()
            .parse::<ApplicationType>()
            .map_err(|e| GatewayError::input(e.to_string()))?;
        let subdir = present(subdir).unwrap_or_default();

        self.pipeline
            .deploy(DeploymentPlan {
                identity: &authenticated,
                subdir: &subdir,
                roots: self.config.roots_for(authenticated.name()),
                artifact,
                app_type,
            })
            .await
    }
}
