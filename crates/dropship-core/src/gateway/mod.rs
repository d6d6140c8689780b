//! Transport-neutral operation boundary.
//!
//! A transport (HTTP server, CLI) stages uploaded files, builds a request,
//! and maps the returned [`crate::error::GatewayError`] through its
//! [`crate::error::ErrorClass`].

mod deploy;
mod process;
mod request;

pub use deploy::DeploymentService;
pub use process::{ProcessOutcome, ProcessService};
pub use request::{DeployRequest, InvalidAction, ManageRequest, ProcessAction, UploadedFile};
