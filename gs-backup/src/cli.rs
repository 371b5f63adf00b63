//! This module implements the CLI for gs-backup: command parsing, credential
//! bootstrap, and the thin runner around the core crate.
//!
//! All reconciliation logic (provisioning, the backup loop, outcome reporting)
//! lives in [`gs-backup-core`]. This module decides which fatal errors end the
//! process and wires the real storage client and OAuth exchanger in.
//!
//! ## Commands
//! - `run`: provision the bucket once, restore the previous backup, then back the
//!   source file up until Ctrl-C or SIGTERM
//! - `list` / `describe` / `read` / `write`: one-shot operations against the bucket
//! - no command: do nothing and exit successfully
//!
//! [`gs-backup-core`]: ../../gs_backup_core/

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use gs_backup_core::config::{BackupConfig, StoreTarget};
use gs_backup_core::contract::{AccessControlEntry, RemoteStore};
use gs_backup_core::credential::{CredentialHolder, FileTokenCache};
use gs_backup_core::error::AuthError;
use gs_backup_core::provision::Provisioner;
use gs_backup_core::report::TracingReporter;
use gs_backup_core::schedule::IntervalScheduler;
use gs_backup_core::synchronise::SyncLoop;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use crate::load_config::load_config;
use crate::oauth::OAuthExchanger;
use crate::storage::GcsClient;

/// CLI for gs-backup: keep a local file backed up in a cloud storage bucket.
#[derive(Parser)]
#[clap(
    name = "gs-backup",
    version,
    about = "Periodically upload a local file to a cloud storage bucket"
)]
pub struct Cli {
    /// Path to the YAML config file
    #[clap(long, global = true, default_value = "gs-backup.yaml")]
    pub config: PathBuf,

    /// Token cache file (overrides auth.cache_path)
    #[clap(long, global = true)]
    pub cache: Option<PathBuf>,

    /// Authorization code to exchange for a token
    #[clap(long, global = true)]
    pub code: Option<String>,

    #[clap(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Provision the bucket and back the source file up on a fixed interval
    Run,
    /// List buckets in the project
    List,
    /// List objects in the bucket
    Describe,
    /// Download the backup object
    Read {
        /// Where to write the downloaded object
        #[clap(long, default_value = "text.read")]
        output: PathBuf,
    },
    /// Provision the bucket and upload the source file once
    Write,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        println!("Nothing to do: pass one of run, list, describe, read, write (see --help).");
        return Ok(());
    };

    let mut config = load_config(&cli.config)?;
    if let Some(cache) = cli.cache {
        config.cache_path = cache;
    }

    let cache = FileTokenCache::new(&config.cache_path);
    let exchanger = OAuthExchanger::new(config.oauth.clone());
    let credential =
        match CredentialHolder::acquire(&cache, &exchanger, cli.code.as_deref()).await {
            Ok(holder) => holder,
            Err(AuthError::AuthUnavailable { auth_url }) => {
                println!("Visit URL to get a code then run again with --code=YOUR_CODE");
                println!("{auth_url}");
                anyhow::bail!("no usable credential in {}", config.cache_path.display());
            }
            Err(e) => return Err(e.into()),
        };

    let client = GcsClient::new(config.api_base.clone(), credential)?;
    let target = &config.backup.target;

    match command {
        Commands::Run => {
            let cancel = CancellationToken::new();
            spawn_shutdown_listener(cancel.clone())?;
            run_daemon(&config.backup, &client, cancel).await?;
        }
        Commands::List => {
            for name in list_buckets(target, &client).await? {
                println!("{name}");
            }
        }
        Commands::Describe => match describe_bucket(target, &client).await? {
            Some(objects) => {
                println!("Objects in bucket {}:", target.bucket);
                for name in objects {
                    println!("{name}");
                }
            }
            None => println!("No such bucket exists."),
        },
        Commands::Read { output } => {
            match object_grant(target, &client).await {
                Some(grant) => println!(
                    "Users in group {} can access {}/{} as {}.",
                    grant.entity, target.bucket, target.object, grant.role
                ),
                None => println!(
                    "No grant for {} on {}/{}.",
                    target.acl_entity, target.bucket, target.object
                ),
            }
            let bytes = read_object(target, &client, &output).await?;
            println!("File successfully saved! ({bytes} bytes to {})", output.display());
        }
        Commands::Write => {
            write_once(&config.backup, &client).await?;
            println!("Backed up {} to {}/{}", config.backup.source_path.display(), target.bucket, target.object);
        }
    }

    Ok(())
}

/// Cancels `cancel` on Ctrl-C, and on SIGTERM where available.
/// The SIGTERM listener is registered before this returns.
fn spawn_shutdown_listener(cancel: CancellationToken) -> Result<()> {
    #[cfg(unix)]
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        #[cfg(unix)]
        let received = tokio::select! {
            res = tokio::signal::ctrl_c() => res.is_ok(),
            _ = terminate.recv() => true,
        };
        #[cfg(not(unix))]
        let received = tokio::signal::ctrl_c().await.is_ok();

        if received {
            tracing::info!("[BACKUP] Stop requested, stopping after current cycle");
            cancel.cancel();
        }
    });
    Ok(())
}

/// Provisions once, restores the previous backup, then runs the backup loop
/// until `cancel` fires. Returns the number of completed cycles.
pub async fn run_daemon<S>(config: &BackupConfig, store: &S, cancel: CancellationToken) -> Result<u64>
where
    S: RemoteStore + ?Sized,
{
    let mut provisioner = Provisioner::new(config.target.clone());
    provisioner.ensure_bucket(store).await?;

    restore_latest(config, store).await;

    let reporter = TracingReporter;
    let mut scheduler = IntervalScheduler::new(config.interval, cancel);
    let sync = SyncLoop::new(config.clone(), store, &reporter);
    Ok(sync.run(&mut scheduler).await?)
}

/// Downloads the existing backup to `config.restore_path` so the source can be
/// reloaded from it. Returns the bytes written, or `None` if nothing was restored.
/// Never fails: a missing or unreadable backup must not keep the daemon from starting.
pub async fn restore_latest<S>(config: &BackupConfig, store: &S) -> Option<u64>
where
    S: RemoteStore + ?Sized,
{
    let target = &config.target;
    let object = match store.get_object(&target.bucket, &target.object).await {
        Ok(object) => object,
        Err(e) if e.is_not_found() => {
            tracing::info!(
                bucket = %target.bucket,
                object = %target.object,
                "[BACKUP] No backup exists yet; nothing to restore"
            );
            return None;
        }
        Err(e) => {
            tracing::warn!(error = %e, "[BACKUP] Could not check for an existing backup");
            return None;
        }
    };

    object_grant(target, store).await;

    let destination = &config.restore_path;
    match store.download_object(&object, destination).await {
        Ok(bytes) => {
            tracing::info!(
                bucket = %target.bucket,
                object = %object.name,
                bytes,
                destination = %destination.display(),
                "[BACKUP] Restored previous backup"
            );
            Some(bytes)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                destination = %destination.display(),
                "[BACKUP] Could not restore previous backup; starting anyway"
            );
            None
        }
    }
}

/// The configured entity's grant on the backup object, if it can be read.
pub async fn object_grant<S>(target: &StoreTarget, store: &S) -> Option<AccessControlEntry>
where
    S: RemoteStore + ?Sized,
{
    match store
        .get_object_acl(&target.bucket, &target.object, &target.acl_entity)
        .await
    {
        Ok(grant) => {
            tracing::info!(
                entity = %grant.entity,
                role = %grant.role,
                bucket = %target.bucket,
                object = %target.object,
                "[BACKUP] Object grant"
            );
            Some(grant)
        }
        Err(e) => {
            tracing::warn!(error = %e, entity = %target.acl_entity, "[BACKUP] Could not read object grant");
            None
        }
    }
}

/// One upload and grant. Upload failure is an error; grant failure is only logged.
pub async fn write_once<S>(config: &BackupConfig, store: &S) -> Result<()>
where
    S: RemoteStore + ?Sized,
{
    let mut provisioner = Provisioner::new(config.target.clone());
    provisioner.ensure_bucket(store).await?;

    let reporter = TracingReporter;
    let outcome = SyncLoop::new(config.clone(), store, &reporter)
        .run_cycle(1)
        .await?;
    if !outcome.upload.is_success() {
        anyhow::bail!("upload failed: {:?}", outcome.upload);
    }
    Ok(())
}

pub async fn list_buckets<S>(target: &StoreTarget, store: &S) -> Result<Vec<String>>
where
    S: RemoteStore + ?Sized,
{
    let buckets = store.list_buckets(&target.project_id).await?;
    Ok(buckets.into_iter().map(|b| b.name).collect())
}

/// `None` when the bucket does not exist.
pub async fn describe_bucket<S>(target: &StoreTarget, store: &S) -> Result<Option<Vec<String>>>
where
    S: RemoteStore + ?Sized,
{
    match store.list_objects(&target.bucket).await {
        Ok(objects) => Ok(Some(objects.into_iter().map(|o| o.name).collect())),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub async fn read_object<S>(target: &StoreTarget, store: &S, output: &Path) -> Result<u64>
where
    S: RemoteStore + ?Sized,
{
    let object = store.get_object(&target.bucket, &target.object).await?;
    tracing::info!(
        bucket = %target.bucket,
        object = %object.name,
        media_link = object.media_link.as_deref().unwrap_or(""),
        "Reading backup object"
    );
    Ok(store.download_object(&object, output).await?)
}
