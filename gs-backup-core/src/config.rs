use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_ACL_ENTITY: &str = "allUsers";
pub const DEFAULT_ACL_ROLE: &str = "READER";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
/// Where the daemon restores the previous backup to at startup.
pub const DEFAULT_RESTORE_PATH: &str = "text.read";

/// Where the backup lives remotely, and who may read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreTarget {
    pub project_id: String,
    pub bucket: String,
    pub object: String,
    pub acl_entity: String,
    pub acl_role: String,
}

impl StoreTarget {
    /// Target with the default public-read grant.
    pub fn new(
        project_id: impl Into<String>,
        bucket: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            bucket: bucket.into(),
            object: object.into(),
            acl_entity: DEFAULT_ACL_ENTITY.to_string(),
            acl_role: DEFAULT_ACL_ROLE.to_string(),
        }
    }
}

/// Everything the synchronization loop needs, passed in at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfig {
    pub target: StoreTarget,
    pub source_path: PathBuf,
    pub interval: Duration,
    pub restore_path: PathBuf,
}

impl BackupConfig {
    pub fn trace_loaded(&self) {
        info!(
            bucket = %self.target.bucket,
            object = %self.target.object,
            source = %self.source_path.display(),
            interval_secs = self.interval.as_secs_f64(),
            restore = %self.restore_path.display(),
            "Loaded backup config"
        );
        debug!(?self, "Backup config loaded (full debug)");
    }
}
