//! Caller-facing error taxonomy.
//!
//! Every user-facing operation fails with a [`GatewayError`]. Its
//! [`ErrorClass`] is the stable category a transport maps to a status code,
//! and [`GatewayError::public_message`] is the only text it may show.

use serde::Serialize;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::auth::AuthenticationFailed;
use crate::supervisor::SupervisorError;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Stable error category exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorClass {
    BadInput,
    Unauthenticated,
    Unauthorized,
    NotFound,
    UpstreamFailure,
    InternalError,
}

impl ErrorClass {
    /// HTTP-equivalent status code for this class.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::BadInput => 400,
            Self::Unauthenticated => 401,
            Self::Unauthorized => 403,
            Self::NotFound => 404,
            Self::UpstreamFailure => 502,
            Self::InternalError => 500,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadInput => "bad-input",
            Self::Unauthenticated => "unauthenticated",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not-found",
            Self::UpstreamFailure => "upstream-failure",
            Self::InternalError => "internal-error",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named failure of the populate step. Surfaced verbatim to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PopulateFailure {
    UnzipFailed,
    TarExtractionFailed,
    UploadMoveFailed,
}

impl PopulateFailure {
    pub const fn message(self) -> &'static str {
        match self {
            Self::UnzipFailed => "Unzip failed",
            Self::TarExtractionFailed => "Tar extraction failed",
            Self::UploadMoveFailed => "File upload failed",
        }
    }
}

/// Errors returned by the deployment and process-management operations
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Missing or malformed request input; rejected before any side effect
    #[error("invalid input: {0}")]
    Input(String),

    /// Key material missing, malformed or not matching the stored public key
    #[error("authentication failed")]
    Authentication,

    /// Target path outside every root granted to the identity
    #[error("path not authorized")]
    Authorization,

    /// Extraction or move failed after the target directory was cleared
    #[error("{}", .failure.message())]
    Populate {
        failure: PopulateFailure,
        #[source]
        source: ArchiveError,
    },

    /// Unknown project name
    #[error("project {0} not found")]
    NotFound(String),

    /// Supervisor daemon unreachable or rejected the operation
    #[error("supervisor operation failed: {0}")]
    Upstream(String),

    /// Unexpected failure; details are logged, never returned
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal(detail.into())
    }

    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Input(_) => ErrorClass::BadInput,
            Self::Authentication => ErrorClass::Unauthenticated,
            Self::Authorization => ErrorClass::Unauthorized,
            Self::Populate { .. } | Self::Internal(_) => ErrorClass::InternalError,
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::Upstream(_) => ErrorClass::UpstreamFailure,
        }
    }

    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.class().status_code()
    }

    /// Message safe to hand back to a caller.
    pub fn public_message(&self) -> String {
        match self {
            Self::Input(message) => message.clone(),
            Self::Authentication => "Authentication failed".to_string(),
            Self::Authorization => "Path not authorized".to_string(),
            Self::Populate { failure, .. } => failure.message().to_string(),
            Self::NotFound(name) => format!("Project {} not found", name),
            Self::Upstream(_) => "Supervisor operation failed".to_string(),
            Self::Internal(_) => "Internal Server Error".to_string(),
        }
    }
}

impl From<AuthenticationFailed> for GatewayError {
    fn from(_: AuthenticationFailed) -> Self {
        Self::Authentication
    }
}

impl From<SupervisorError> for GatewayError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::NotFound(name) => Self::NotFound(name),
            SupervisorError::ScriptRequired(_) => {
                Self::Input("Script path is required for new project".to_string())
            }
            SupervisorError::Panicked => Self::Internal("supervisor session panicked".to_string()),
            other => Self::Upstream(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_map_to_distinct_status_codes() {
        let classes = [
            ErrorClass::BadInput,
            ErrorClass::Unauthenticated,
            ErrorClass::Unauthorized,
            ErrorClass::NotFound,
            ErrorClass::UpstreamFailure,
            ErrorClass::InternalError,
        ];
        let mut codes: Vec<u16> = classes.iter().map(|c| c.status_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), classes.len());
    }

    #[test]
    fn internal_error_hides_detail() {
        let err = GatewayError::internal("disk exploded at /var/lib/secret");
        assert_eq!(err.public_message(), "Internal Server Error");
        assert_eq!(err.class(), ErrorClass::InternalError);
    }

    #[test]
    fn populate_failure_is_reported_verbatim() {
        let err = GatewayError::Populate {
            failure: PopulateFailure::TarExtractionFailed,
            source: ArchiveError::UnsafeEntry("../etc/passwd".to_string()),
        };
        assert_eq!(err.public_message(), "Tar extraction failed");
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn supervisor_not_found_stays_distinct() {
        let err: GatewayError = SupervisorError::NotFound("ghost".to_string()).into();
        assert_eq!(err.class(), ErrorClass::NotFound);
        assert_eq!(err.public_message(), "Project ghost not found");

        let err: GatewayError = SupervisorError::Unreachable("connection refused".to_string()).into();
        assert_eq!(err.class(), ErrorClass::UpstreamFailure);
    }

    #[test]
    fn missing_script_is_bad_input() {
        let err: GatewayError = SupervisorError::ScriptRequired("api".to_string()).into();
        assert_eq!(err.class(), ErrorClass::BadInput);
        assert_eq!(err.public_message(), "Script path is required for new project");
    }
}
