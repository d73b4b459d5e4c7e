//! Run configuration.
//!
//! Settings are read once at startup from a JSON file, adjusted by a few
//! environment overrides, validated, and then passed explicitly into the run.
use crate::server::DeploymentSettings;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "upgrade-features.json";

const DEFAULT_TFS_VERSION: &str = "15.0";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

pub const ENV_ROOT_URL: &str = "TFS_ROOT_URL";
pub const ENV_INSTALL_DIR: &str = "TFS_INSTALL_DIR";
pub const ENV_ACCESS_TOKEN: &str = "TFS_ACCESS_TOKEN";

fn default_tfs_version() -> String {
    DEFAULT_TFS_VERSION.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Folder receiving one log file per collection.
    pub root_log_folder: PathBuf,
    /// Configuration server URL, e.g. `http://tfs:8080/tfs`.
    pub tfs_root_url: String,
    pub config_db_connection_string: String,
    #[serde(default = "default_tfs_version")]
    pub tfs_version: String,
    /// Server install directory; defaults to the conventional location for
    /// `tfs_version`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl RunConfig {
    pub fn install_dir(&self) -> PathBuf {
        self.install_dir.clone().unwrap_or_else(|| {
            PathBuf::from(format!(
                r"C:\Program Files\Microsoft Team Foundation Server {}",
                self.tfs_version
            ))
        })
    }

    /// Job agent plugin directory the deployment host loads from.
    pub fn plugin_directory(&self) -> PathBuf {
        self.install_dir()
            .join("Application Tier")
            .join("TFSJobAgent")
            .join("Plugins")
    }

    pub fn deployment_settings(&self) -> DeploymentSettings {
        DeploymentSettings {
            config_db_connection_string: self.config_db_connection_string.clone(),
            plugin_directory: self.plugin_directory(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Candidate config locations in lookup order.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("tfs-feature-upgrade").join("config.json"));
    }
    paths
}

/// Pick the config file: an explicit path wins, otherwise the first default
/// location that exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let candidates = default_config_paths();
    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .ok_or_else(|| {
            let searched = candidates
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            anyhow!("no config file found (searched {searched}); pass --config")
        })
}

pub fn load_config(path: &Path) -> Result<RunConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: RunConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    Ok(config)
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides(config: &mut RunConfig, lookup: impl Fn(&str) -> Option<String>) {
    let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
    if let Some(url) = lookup(ENV_ROOT_URL) {
        config.tfs_root_url = url;
    }
    if let Some(dir) = lookup(ENV_INSTALL_DIR) {
        config.install_dir = Some(PathBuf::from(dir));
    }
    if let Some(token) = lookup(ENV_ACCESS_TOKEN) {
        config.access_token = Some(token);
    }
}

pub fn validate_config(config: &RunConfig) -> Result<()> {
    let url = config.tfs_root_url.trim();
    if url.is_empty() {
        return Err(anyhow!("tfs_root_url must be non-empty"));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(anyhow!("tfs_root_url must be an http(s) URL (got {url:?})"));
    }
    if config.config_db_connection_string.trim().is_empty() {
        return Err(anyhow!("config_db_connection_string must be non-empty"));
    }
    if config.root_log_folder.as_os_str().is_empty() {
        return Err(anyhow!("root_log_folder must be non-empty"));
    }
    if config.tfs_version.trim().is_empty() {
        return Err(anyhow!("tfs_version must be non-empty"));
    }
    if config.request_timeout_secs == 0 {
        return Err(anyhow!("request_timeout_secs must be greater than zero"));
    }
    Ok(())
}

/// Resolve, load, override, and validate the run config.
pub fn load_run_config(explicit: Option<&Path>) -> Result<RunConfig> {
    let path = resolve_config_path(explicit)?;
    let mut config = load_config(&path)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate_config(&config).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

/// Mask password values in a SQL connection string for display.
pub fn redact_connection_string(connection_string: &str) -> String {
    let secret = Regex::new(r"(?i)\b(password|pwd)\s*=\s*[^;]*")
        .expect("regex for connection string secrets");
    secret
        .replace_all(connection_string, "$1=********")
        .into_owned()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
