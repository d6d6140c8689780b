//! Dropship Core Library
//!
//! Domain logic for a self-service deployment gateway: key-based
//! authentication, sandboxed target resolution, artifact placement with
//! optional post-processing, and process supervision.

pub mod archive;
pub mod auth;
pub mod config;
pub mod context;
pub mod deploy;
pub mod error;
pub mod fs;
pub mod gateway;
pub mod runtime;
pub mod security;
pub mod supervisor;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{AuthorizedRoots, GatewayConfig, NodeRuntimeConfig, SupervisorConfig};

    // Errors
    pub use crate::error::{ErrorClass, GatewayError, PopulateFailure};

    // Authentication
    pub use crate::auth::{AuthenticatedIdentity, AuthenticationFailed, KeyAuthenticator};

    // Deployment
    pub use crate::deploy::{DeployWarning, DeploymentOutcome, DeploymentReport};
    pub use crate::runtime::ApplicationType;

    // Supervision
    pub use crate::supervisor::{
        ProcessRecord, ProcessState, ProcessStatus, ProcessSupervisorClient, SupervisorDaemon,
        SupervisorSession,
    };

    // Boundary
    pub use crate::context::GatewayContext;
    pub use crate::gateway::{
        DeployRequest, DeploymentService, ManageRequest, ProcessAction, ProcessOutcome,
        ProcessService, UploadedFile,
    };
}
