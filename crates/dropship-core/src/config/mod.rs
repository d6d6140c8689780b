//! Gateway configuration
//!
//! Loaded once at startup from `dropship.toml`, overridden by environment
//! variables, then shared read-only as `Arc<GatewayConfig>`.

pub mod parser;
pub mod schema;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub use parser::{parse_config, parse_config_str};
pub use schema::{
    AuthorizedRoots, ConfigError, DeployConfig, GatewayConfig, NodeRuntimeConfig, RuntimeConfig,
    SupervisorConfig,
};

use crate::security::normalize_path;

/// Overrides `upload_dir`
pub const ENV_UPLOAD_DIR: &str = "UPLOAD_DIR";
/// Overrides `public_key_dir`
pub const ENV_PUBLIC_KEY_PATH: &str = "PUBLIC_KEY_PATH";
/// Overrides `temp_dir`
pub const ENV_TEMP_DIR: &str = "DROPSHIP_TEMP_DIR";

/// Default config location: `<config dir>/dropship/dropship.toml`
pub fn default_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(dir.join("dropship").join("dropship.toml"))
}

/// Load configuration from `path`, or defaults when `path` is `None` and the
/// default file does not exist, then apply environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig> {
    let mut config = match path {
        Some(path) => parse_config(path)?,
        None => {
            let default_path = default_config_path()?;
            if default_path.exists() {
                parse_config(&default_path)?
            } else {
                tracing::debug!(path = %default_path.display(), "No config file, using defaults");
                GatewayConfig::default()
            }
        }
    };

    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

impl GatewayConfig {
    /// Apply overrides from a key lookup (normally the process environment).
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty(ENV_UPLOAD_DIR) {
            self.upload_dir = PathBuf::from(dir);
        }
        if let Some(dir) = non_empty(ENV_PUBLIC_KEY_PATH) {
            self.public_key_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = non_empty(ENV_TEMP_DIR) {
            self.temp_dir = PathBuf::from(dir);
        }
    }

    /// Make directory settings absolute and create the upload and staging
    /// directories.
    pub fn prepare(mut self) -> Result<Self> {
        self.upload_dir = absolute(&self.upload_dir)?;
        self.temp_dir = absolute(&self.temp_dir)?;
        if let Some(dir) = self.public_key_dir.take() {
            self.public_key_dir = Some(absolute(&dir)?);
        }

        std::fs::create_dir_all(&self.upload_dir).with_context(|| {
            format!("Failed to create upload directory: {}", self.upload_dir.display())
        })?;
        std::fs::create_dir_all(&self.temp_dir).with_context(|| {
            format!("Failed to create temp directory: {}", self.temp_dir.display())
        })?;

        Ok(self)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    let path = std::path::absolute(path)
        .with_context(|| format!("Failed to resolve path: {}", path.display()))?;
    Ok(normalize_path(&path))
}
