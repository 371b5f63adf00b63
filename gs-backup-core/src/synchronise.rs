//! Synchronization loop: keeps the remote object in step with the local file.
//!
//! Each cycle, started by the [`Scheduler`]:
//!   1. opens the local source file (fatal on failure: no later cycle could succeed)
//!   2. uploads it under the fixed object name, overwriting the previous version
//!   3. upserts the public-read grant on the object, whether or not step 2 succeeded
//!   4. closes the file (the handle is dropped with the upload, success or not)
//!   5. reports a [`CycleOutcome`] and waits for the next tick
//!
//! Remote failures in steps 2 and 3 are reported and retried next cycle. They never
//! end the loop. Cycles run strictly one after another, so there is never more than
//! one writer to the object.
//!
//! # Error Handling
//! The only error [`SyncLoop::run`] returns is [`SyncError::LocalFileUnavailable`].
//! Deciding to exit the process is left to the caller.

use chrono::Utc;
use tracing::{debug, error, info};

use crate::config::BackupConfig;
use crate::contract::{ObjectContent, RemoteStore};
use crate::error::{StoreError, SyncError};
use crate::report::{CycleOutcome, OutcomeReporter, StageResult};
use crate::schedule::Scheduler;

pub struct SyncLoop<'a, S: ?Sized, R: ?Sized> {
    config: BackupConfig,
    store: &'a S,
    reporter: &'a R,
}

impl<'a, S, R> SyncLoop<'a, S, R>
where
    S: RemoteStore + ?Sized,
    R: OutcomeReporter + ?Sized,
{
    pub fn new(config: BackupConfig, store: &'a S, reporter: &'a R) -> Self {
        Self {
            config,
            store,
            reporter,
        }
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Runs cycles until the scheduler says stop. Returns the number of cycles run.
    pub async fn run<T>(&self, scheduler: &mut T) -> Result<u64, SyncError>
    where
        T: Scheduler + ?Sized,
    {
        info!(
            bucket = %self.config.target.bucket,
            object = %self.config.target.object,
            source = %self.config.source_path.display(),
            interval_secs = self.config.interval.as_secs_f64(),
            "[BACKUP] Starting backup loop"
        );

        let mut cycles = 0u64;
        while scheduler.next_tick().await {
            cycles += 1;
            self.run_cycle(cycles).await?;
        }

        info!(cycles, "[BACKUP] Backup loop stopped");
        Ok(cycles)
    }

    /// Runs a single open-upload-upsert cycle and reports its outcome.
    pub async fn run_cycle(&self, cycle: u64) -> Result<CycleOutcome, SyncError> {
        let started_at = Utc::now();
        let target = &self.config.target;
        let source = &self.config.source_path;

        let content = ObjectContent::open(source).await.map_err(|e| {
            error!(
                cycle,
                source = %source.display(),
                error = %e,
                "[BACKUP] Cannot open backup source"
            );
            SyncError::LocalFileUnavailable {
                path: source.clone(),
                source: e,
            }
        })?;
        debug!(cycle, bytes = content.len, "[BACKUP] Opened backup source");

        let upload = match self
            .store
            .upload_object(&target.bucket, &target.object, content)
            .await
        {
            Ok(object) => StageResult::Succeeded {
                detail: format!(
                    "backed up as {} at {}",
                    object.name,
                    object.self_link.as_deref().unwrap_or("<no link>")
                ),
            },
            Err(e) => StageResult::Failed {
                error: describe(&e),
            },
        };

        let acl = match self
            .store
            .upsert_object_acl(
                &target.bucket,
                &target.object,
                &target.acl_entity,
                &target.acl_role,
            )
            .await
        {
            Ok(entry) => StageResult::Succeeded {
                detail: format!("{} can access as {}", entry.entity, entry.role),
            },
            Err(e) => StageResult::Failed {
                error: describe(&e),
            },
        };

        let outcome = CycleOutcome {
            cycle,
            started_at,
            bucket: target.bucket.clone(),
            object: target.object.clone(),
            upload,
            acl,
        };
        self.reporter.report(&outcome);
        Ok(outcome)
    }
}

fn describe(e: &StoreError) -> String {
    if e.is_transport() {
        format!("{e} (will retry next cycle)")
    } else {
        e.to_string()
    }
}
