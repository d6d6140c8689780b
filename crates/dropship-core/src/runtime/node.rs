//! Node post-processing: install dependencies, then run the deploy script.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use super::runner::{CommandRunner, CommandSpec};
use crate::config::NodeRuntimeConfig;
use crate::deploy::DeployWarning;

pub const MANIFEST_FILE: &str = "package.json";

/// The parts of package.json that post-processing reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
}

impl PackageManifest {
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }
}

/// Returns `None` when install and script both succeeded.
///
/// A script that exits zero but writes to stderr still counts as failed.
pub async fn post_process(
    runner: &dyn CommandRunner,
    config: &NodeRuntimeConfig,
    target: &Path,
) -> Option<DeployWarning> {
    let manifest_path = target.join(MANIFEST_FILE);
    let content = match tokio::fs::read_to_string(&manifest_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Some(DeployWarning::NoManifest);
        }
        Err(err) => {
            return Some(DeployWarning::ManifestUnreadable {
                reason: err.to_string(),
            });
        }
    };
    let manifest = match PackageManifest::from_json(&content) {
        Ok(manifest) => manifest,
        Err(err) => {
            return Some(DeployWarning::ManifestUnreadable {
                reason: err.to_string(),
            });
        }
    };

    let install = CommandSpec::new(
        &config.package_manager,
        config.install_args.iter().cloned(),
        target,
        config.install_timeout(),
    );
    match runner.run(&install).await {
        Ok(output) if output.success() => {
            info!(target = %target.display(), "Dependencies installed");
        }
        Ok(output) => {
            let reason = output.failure_summary();
            warn!(target = %target.display(), %reason, "Dependency install failed");
            return Some(DeployWarning::DependencyInstallFailed { reason });
        }
        Err(err) => {
            warn!(target = %target.display(), error = %err, "Dependency install failed");
            return Some(DeployWarning::DependencyInstallFailed {
                reason: err.to_string(),
            });
        }
    }

    let script = config.deploy_script.clone();
    if !manifest.has_script(&script) {
        return Some(DeployWarning::NoDeployScript { script });
    }

    let run = CommandSpec::new(
        &config.package_manager,
        ["run".to_string(), script.clone()],
        target,
        config.script_timeout(),
    );
    match runner.run(&run).await {
        Ok(output) if output.success() && output.stderr.trim().is_empty() => {
            info!(target = %target.display(), script = %script, "Deploy script finished");
            None
        }
        Ok(output) => {
            let reason = output.failure_summary();
            warn!(target = %target.display(), script = %script, %reason, "Deploy script failed");
            Some(DeployWarning::BuildScriptFailed { script, reason })
        }
        Err(err) => {
            warn!(target = %target.display(), script = %script, error = %err, "Deploy script failed");
            Some(DeployWarning::BuildScriptFailed {
                script,
                reason: err.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_scripts_are_read() {
        let manifest = PackageManifest::from_json(
            r#"{"name":"site","scripts":{"deploy":"vite build","test":"vitest"}}"#,
        )
        .unwrap();
        assert_eq!(manifest.name.as_deref(), Some("site"));
        assert!(manifest.has_script("deploy"));
        assert!(!manifest.has_script("build"));
    }

    #[test]
    fn manifest_without_scripts_is_valid() {
        let manifest = PackageManifest::from_json(r#"{"name":"lib"}"#).unwrap();
        assert!(manifest.scripts.is_empty());
    }
}
