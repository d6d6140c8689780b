//! Deployment orchestration: authorize, clear, populate, post-process.

mod locks;
mod pipeline;
mod report;

pub use locks::{DeployLocks, TargetGuard};
pub use pipeline::{DeploymentPipeline, DeploymentPlan, DeploymentStage};
pub use report::{DeployWarning, DeploymentOutcome, DeploymentReport};
