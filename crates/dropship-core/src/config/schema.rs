//! Configuration schema for dropship.toml

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::security::{is_valid_subdirectory, normalize_path};

/// Configuration validation failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid identity name '{0}': must be a plain name without path separators")]
    InvalidIdentity(String),

    #[error("Invalid root '{root}' for identity '{identity}'")]
    InvalidRoot { identity: String, root: String },

    #[error("Invalid preserve path '{0}': must be a relative path inside the target")]
    InvalidPreserve(String),

    #[error("Invalid runtime setting: {0}")]
    InvalidRuntime(String),
}

/// Root configuration structure for dropship.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base directory under which every deployment target lives
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Directory holding `<identity>_public_key.pem` files
    #[serde(default)]
    pub public_key_dir: Option<PathBuf>,

    /// Staging area for uploaded files before they are consumed
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Identity name to the roots it may deploy into
    #[serde(default)]
    pub authorized_users: BTreeMap<String, AuthorizedRoots>,

    #[serde(default)]
    pub deploy: DeployConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./public/temp")
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            public_key_dir: None,
            temp_dir: default_temp_dir(),
            authorized_users: BTreeMap::new(),
            deploy: DeployConfig::default(),
            runtime: RuntimeConfig::default(),
            supervisor: SupervisorConfig::default(),
        }
    }
}

/// A single root or a list of roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthorizedRoots {
    One(String),
    Many(Vec<String>),
}

impl AuthorizedRoots {
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::One(root) => std::slice::from_ref(root),
            Self::Many(roots) => roots,
        }
    }
}

/// Deployment behaviour shared by all targets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Target-relative paths kept across redeploys
    #[serde(default)]
    pub preserve: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub node: NodeRuntimeConfig,
}

/// Settings for Node post-processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRuntimeConfig {
    #[serde(default = "default_package_manager")]
    pub package_manager: String,

    #[serde(default = "default_install_args")]
    pub install_args: Vec<String>,

    /// Manifest script run after dependencies are installed
    #[serde(default = "default_deploy_script")]
    pub deploy_script: String,

    #[serde(default = "default_step_timeout")]
    pub install_timeout_secs: u64,

    #[serde(default = "default_step_timeout")]
    pub script_timeout_secs: u64,
}

fn default_package_manager() -> String {
    "npm".to_string()
}

fn default_install_args() -> Vec<String> {
    vec!["install".to_string()]
}

fn default_deploy_script() -> String {
    "deploy".to_string()
}

fn default_step_timeout() -> u64 {
    600
}

impl Default for NodeRuntimeConfig {
    fn default() -> Self {
        Self {
            package_manager: default_package_manager(),
            install_args: default_install_args(),
            deploy_script: default_deploy_script(),
            install_timeout_secs: default_step_timeout(),
            script_timeout_secs: default_step_timeout(),
        }
    }
}

impl NodeRuntimeConfig {
    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }
}

/// Process supervisor connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Supervisor executable
    #[serde(default = "default_supervisor_command")]
    pub command: String,

    #[serde(default = "default_supervisor_timeout")]
    pub timeout_secs: u64,
}

fn default_supervisor_command() -> String {
    "pm2".to_string()
}

fn default_supervisor_timeout() -> u64 {
    30
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            command: default_supervisor_command(),
            timeout_secs: default_supervisor_timeout(),
        }
    }
}

impl SupervisorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl GatewayConfig {
    /// Roots granted to `identity`; empty when the identity is unknown.
    pub fn roots_for(&self, identity: &str) -> &[String] {
        self.authorized_users
            .get(identity)
            .map(AuthorizedRoots::as_slice)
            .unwrap_or(&[])
    }

    /// Preserve list as normalized relative paths.
    pub fn preserve_paths(&self) -> Vec<PathBuf> {
        self.deploy
            .preserve
            .iter()
            .map(|p| normalize_path(Path::new(p)))
            .filter(|p| !p.as_os_str().is_empty())
            .collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (identity, roots) in &self.authorized_users {
            if !is_plain_name(identity) {
                return Err(ConfigError::InvalidIdentity(identity.clone()));
            }
            for root in roots.as_slice() {
                let valid = Path::new(root).is_absolute() && !root.contains("..")
                    || is_valid_subdirectory(root);
                if !valid {
                    return Err(ConfigError::InvalidRoot {
                        identity: identity.clone(),
                        root: root.clone(),
                    });
                }
            }
        }

        for entry in &self.deploy.preserve {
            if entry.trim().is_empty() || !is_valid_subdirectory(entry) {
                return Err(ConfigError::InvalidPreserve(entry.clone()));
            }
        }

        let node = &self.runtime.node;
        if node.package_manager.trim().is_empty() {
            return Err(ConfigError::InvalidRuntime(
                "runtime.node.package_manager must not be empty".to_string(),
            ));
        }
        if node.deploy_script.trim().is_empty() {
            return Err(ConfigError::InvalidRuntime(
                "runtime.node.deploy_script must not be empty".to_string(),
            ));
        }
        if node.install_timeout_secs == 0 || node.script_timeout_secs == 0 {
            return Err(ConfigError::InvalidRuntime(
                "runtime.node timeouts must be greater than zero".to_string(),
            ));
        }
        if self.supervisor.command.trim().is_empty() || self.supervisor.timeout_secs == 0 {
            return Err(ConfigError::InvalidRuntime(
                "supervisor.command must be set and supervisor.timeout_secs greater than zero"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Identity names become file names; no separators or traversal.
pub(crate) fn is_plain_name(name: &str) -> bool {
    !name.trim().is_empty()
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.upload_dir, PathBuf::from("./uploads"));
        assert_eq!(config.temp_dir, PathBuf::from("./public/temp"));
        assert_eq!(config.runtime.node.package_manager, "npm");
        assert_eq!(config.runtime.node.deploy_script, "deploy");
        assert_eq!(config.supervisor.command, "pm2");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_identity_has_no_roots() {
        let config = GatewayConfig::default();
        assert!(config.roots_for("mallory").is_empty());
    }

    #[test]
    fn single_and_list_roots_are_equivalent() {
        let one = AuthorizedRoots::One("alice".to_string());
        let many = AuthorizedRoots::Many(vec!["alice".to_string()]);
        assert_eq!(one.as_slice(), many.as_slice());
    }

    #[test]
    fn identity_with_separator_is_rejected() {
        let mut config = GatewayConfig::default();
        config
            .authorized_users
            .insert("../root".to_string(), AuthorizedRoots::One("x".to_string()));
        assert!(matches!(config.validate(), Err(ConfigError::InvalidIdentity(_))));
    }

    #[test]
    fn traversing_root_is_rejected() {
        let mut config = GatewayConfig::default();
        config
            .authorized_users
            .insert("alice".to_string(), AuthorizedRoots::One("../etc".to_string()));
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRoot { .. })));
    }

    #[test]
    fn preserve_paths_are_normalized() {
        let mut config = GatewayConfig::default();
        config.deploy.preserve = vec!["./data/".to_string(), ".env".to_string()];
        assert_eq!(
            config.preserve_paths(),
            vec![PathBuf::from("data"), PathBuf::from(".env")]
        );
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = GatewayConfig::default();
        config.runtime.node.install_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRuntime(_))));
    }
}
