#![doc = "gs-backup-core: reconciliation logic for gs-backup."]

//! This crate holds everything that keeps a remote storage object in step with a
//! local file: the remote store seam, credential handling, bucket provisioning,
//! the tick source and the synchronization loop itself.
//! No HTTP client for the storage API lives here; see the `gs-backup` crate.
//!
//! # Usage
//! Build a [`config::BackupConfig`], provision once with [`provision::Provisioner`],
//! then drive [`synchronise::SyncLoop`] with a [`schedule::Scheduler`].

pub mod config;
pub mod contract;
pub mod credential;
pub mod error;
pub mod provision;
pub mod report;
pub mod schedule;
pub mod synchronise;
