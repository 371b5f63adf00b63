//! # contract: the remote object store seam
//!
//! This module defines the data model exchanged with the remote object store
//! and the [`RemoteStore`] trait every store client implements.
//!
//! ## Interface & Extensibility
//! - Implement [`RemoteStore`] to add a new backend (HTTP API client, in-memory fake).
//! - All methods are async and return [`StoreError`], which keeps remote rejections
//!   (`NotFound`, `Service`, ...) apart from local transport failures.
//! - Uploads take an [`ObjectContent`]: an open file handle that implementors stream
//!   from. Nothing here buffers a whole file in memory.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`, so tests get a generated `MockRemoteStore`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mockall::automock;

use crate::error::StoreError;

/// A bucket as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketDescriptor {
    pub name: String,
    /// Project identifier or number the bucket belongs to, when reported.
    pub project: Option<String>,
    /// Assigned by the remote service.
    pub location: Option<String>,
    pub self_link: Option<String>,
}

/// An object as reported by the remote service after an upload or lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub bucket: String,
    pub name: String,
    pub self_link: Option<String>,
    /// Direct download link for the object's media.
    pub media_link: Option<String>,
    pub size: Option<u64>,
    pub generation: Option<String>,
}

/// A single grant on an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControlEntry {
    pub bucket: String,
    pub object: String,
    pub entity: String,
    pub role: String,
}

/// Content for an upload: an open local file plus its length.
///
/// The handle lives for exactly one upload and is closed when dropped.
#[derive(Debug)]
pub struct ObjectContent {
    pub path: PathBuf,
    pub file: tokio::fs::File,
    pub len: u64,
}

impl ObjectContent {
    /// Opens `path` read-only and records its current length.
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
        })
    }
}

/// Typed facade over the remote object-storage API.
///
/// Implementors own authentication and transport; callers see only the
/// operations and structured failures.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// `Ok(false)` only when the service says the bucket does not exist.
    /// Permission and transport failures are returned as errors.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError>;

    async fn create_bucket(
        &self,
        bucket: &str,
        project_id: &str,
    ) -> Result<BucketDescriptor, StoreError>;

    /// Uploads `content` as `object`, replacing any previous version with that name.
    async fn upload_object(
        &self,
        bucket: &str,
        object: &str,
        content: ObjectContent,
    ) -> Result<ObjectDescriptor, StoreError>;

    async fn get_object(&self, bucket: &str, object: &str) -> Result<ObjectDescriptor, StoreError>;

    /// Grants `role` to `entity` on the object. Reapplying an existing grant is a no-op.
    async fn upsert_object_acl(
        &self,
        bucket: &str,
        object: &str,
        entity: &str,
        role: &str,
    ) -> Result<AccessControlEntry, StoreError>;

    /// The grant `entity` holds on the object. `NotFound` when there is none.
    async fn get_object_acl(
        &self,
        bucket: &str,
        object: &str,
        entity: &str,
    ) -> Result<AccessControlEntry, StoreError>;

    async fn list_buckets(&self, project_id: &str) -> Result<Vec<BucketDescriptor>, StoreError>;

    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectDescriptor>, StoreError>;

    /// Streams the object's media into `destination`, returning the bytes written.
    async fn download_object(
        &self,
        object: &ObjectDescriptor,
        destination: &Path,
    ) -> Result<u64, StoreError>;
}
