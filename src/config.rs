//! Configuration resolution
//!
//! Settings come from a TOML file (path in `STEMGATE_CONFIG`, default
//! `stemgate.toml`); the worker API key can also arrive via
//! `STEMGATE_API_KEY`, which wins over the TOML value. Both set at once is
//! a likely misconfiguration and is warned about.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CONFIG_PATH_ENV: &str = "STEMGATE_CONFIG";
pub const API_KEY_ENV: &str = "STEMGATE_API_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    pub storage: StorageConfig,
    pub compute: ComputeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// S3-compatible base URL staged inputs are PUT under
    pub base_url: String,
    #[serde(default = "default_staging_folder")]
    pub staging_folder: String,
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComputeConfig {
    /// Bearer key for the worker API. Resolved against STEMGATE_API_KEY.
    #[serde(default)]
    pub api_key: String,
    pub transcribe_endpoint: String,
    pub separate_endpoint: String,
    pub multitrack_endpoint: String,
    /// Short connect timeout: a worker endpoint that cannot accept the
    /// connection quickly is down, not busy.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Long total timeout sized for compute-heavy jobs
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "127.0.0.1:5740".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("stemgate.db")
}

fn default_staging_folder() -> String {
    "staged".to_string()
}

fn default_upload_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    300
}

impl Settings {
    /// Load settings from the configured path and resolve the API key.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("stemgate.toml"));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let mut settings: Settings = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;

        let env_key = std::env::var(API_KEY_ENV).ok();
        settings.compute.api_key = resolve_api_key(
            take_nonempty(settings.compute.api_key.clone()),
            env_key.and_then(take_nonempty),
        )?;

        Ok(settings)
    }
}

fn take_nonempty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Environment beats TOML; both set is worth a warning; neither set is a
/// startup error.
fn resolve_api_key(toml_key: Option<String>, env_key: Option<String>) -> Result<String> {
    match (toml_key, env_key) {
        (Some(_), Some(key)) => {
            warn!(
                "worker API key set in both {} and TOML config; using {}",
                API_KEY_ENV, API_KEY_ENV
            );
            Ok(key)
        }
        (None, Some(key)) => {
            info!("worker API key loaded from {}", API_KEY_ENV);
            Ok(key)
        }
        (Some(key), None) => {
            info!("worker API key loaded from TOML config");
            Ok(key)
        }
        (None, None) => Err(Error::Config(format!(
            "worker API key not configured; set {} or compute.api_key in the TOML config",
            API_KEY_ENV
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
        [storage]
        base_url = "https://storage.example.com/bucket"

        [compute]
        api_key = "test-key"
        transcribe_endpoint = "https://workers.example.com/transcribe/runsync"
        separate_endpoint = "https://workers.example.com/separate/runsync"
        multitrack_endpoint = "https://workers.example.com/multitrack/runsync"
    "#;

    #[test]
    fn minimal_config_applies_defaults() {
        let settings: Settings = toml::from_str(MINIMAL_TOML).unwrap();

        assert_eq!(settings.bind_addr, "127.0.0.1:5740");
        assert_eq!(settings.database_path, PathBuf::from("stemgate.db"));
        assert_eq!(settings.storage.staging_folder, "staged");
        assert_eq!(settings.compute.connect_timeout_secs, 10);
        assert_eq!(settings.compute.request_timeout_secs, 300);
    }

    #[test]
    fn env_key_beats_toml_key() {
        let resolved = resolve_api_key(
            Some("toml-key".to_string()),
            Some("env-key".to_string()),
        )
        .unwrap();
        assert_eq!(resolved, "env-key");
    }

    #[test]
    fn toml_key_alone_is_used() {
        let resolved = resolve_api_key(Some("toml-key".to_string()), None).unwrap();
        assert_eq!(resolved, "toml-key");
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let err = resolve_api_key(None, None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn whitespace_key_counts_as_missing() {
        assert_eq!(take_nonempty("   ".to_string()), None);
        assert_eq!(take_nonempty("key".to_string()), Some("key".to_string()));
    }
}
