//! `load_config` module: Loads a static YAML config, injects secrets from the
//! environment, and maps it onto the typed configuration used by the core crate.
//!
//! # Responsibilities
//! - Parse the user-supplied YAML file into intermediate structs
//! - Fill in defaults (ACL grant, cadence, restore path, OAuth endpoints, API base)
//! - Inject `GS_BACKUP_CLIENT_SECRET` from the environment
//! - Reject values the loop cannot run with (empty names, zero interval)
//!
//! # Errors
//! All errors use `anyhow::Error` and are surfaced at the CLI boundary.
//!
//! For the accepted YAML schema, see `gs-backup/gs-backup.example.yaml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use gs_backup_core::config::{
    BackupConfig, StoreTarget, DEFAULT_ACL_ENTITY, DEFAULT_ACL_ROLE, DEFAULT_RESTORE_PATH,
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::oauth::{
    OAuthSettings, DEFAULT_AUTH_URL, DEFAULT_REDIRECT_URL, DEFAULT_SCOPE, DEFAULT_TOKEN_URL,
};
use crate::storage::DEFAULT_API_BASE;

pub const CLIENT_SECRET_ENV: &str = "GS_BACKUP_CLIENT_SECRET";

/// Fully resolved configuration for one process run.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backup: BackupConfig,
    pub api_base: String,
    pub oauth: OAuthSettings,
    pub cache_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    storage: StorageSection,
    backup: BackupSection,
    auth: AuthSection,
}

#[derive(Debug, Deserialize)]
struct StorageSection {
    project_id: String,
    bucket: String,
    object: String,
    #[serde(default)]
    acl_entity: Option<String>,
    #[serde(default)]
    acl_role: Option<String>,
    #[serde(default)]
    api_base: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BackupSection {
    source_path: PathBuf,
    #[serde(default = "default_interval_secs")]
    interval_secs: u64,
    #[serde(default)]
    restore_path: Option<PathBuf>,
}

fn default_interval_secs() -> u64 {
    gs_backup_core::config::DEFAULT_INTERVAL.as_secs()
}

#[derive(Debug, Deserialize)]
struct AuthSection {
    client_id: String,
    #[serde(default)]
    auth_url: Option<String>,
    #[serde(default)]
    token_url: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    redirect_url: Option<String>,
    #[serde(default)]
    cache_path: Option<PathBuf>,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    for (field, value) in [
        ("storage.project_id", &raw.storage.project_id),
        ("storage.bucket", &raw.storage.bucket),
        ("storage.object", &raw.storage.object),
        ("auth.client_id", &raw.auth.client_id),
    ] {
        if value.trim().is_empty() {
            error!(field, "Required config value is empty");
            anyhow::bail!("{field} must not be empty");
        }
    }
    if raw.backup.interval_secs == 0 {
        error!("backup.interval_secs must be positive");
        anyhow::bail!("backup.interval_secs must be at least 1");
    }

    let client_secret = match std::env::var(CLIENT_SECRET_ENV) {
        Ok(secret) if !secret.is_empty() => {
            info!("{CLIENT_SECRET_ENV} found in env");
            Some(secret)
        }
        _ => {
            warn!("{CLIENT_SECRET_ENV} not set; token exchange will send no client secret");
            None
        }
    };

    let target = StoreTarget {
        project_id: raw.storage.project_id,
        bucket: raw.storage.bucket,
        object: raw.storage.object,
        acl_entity: raw
            .storage
            .acl_entity
            .unwrap_or_else(|| DEFAULT_ACL_ENTITY.to_string()),
        acl_role: raw
            .storage
            .acl_role
            .unwrap_or_else(|| DEFAULT_ACL_ROLE.to_string()),
    };

    let backup = BackupConfig {
        target,
        source_path: raw.backup.source_path,
        interval: Duration::from_secs(raw.backup.interval_secs),
        restore_path: raw
            .backup
            .restore_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RESTORE_PATH)),
    };

    let oauth = OAuthSettings {
        client_id: raw.auth.client_id,
        client_secret,
        auth_url: raw.auth.auth_url.unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
        token_url: raw
            .auth
            .token_url
            .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
        scope: raw.auth.scope.unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
        redirect_url: raw
            .auth
            .redirect_url
            .unwrap_or_else(|| DEFAULT_REDIRECT_URL.to_string()),
    };

    let config = AppConfig {
        backup,
        api_base: raw
            .storage
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        oauth,
        cache_path: raw
            .auth
            .cache_path
            .unwrap_or_else(|| PathBuf::from("cache.json")),
    };

    config.backup.trace_loaded();
    Ok(config)
}
