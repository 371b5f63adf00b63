//! Provisioner: makes sure the target bucket exists before the loop starts.
//!
//! An existing bucket is never modified. A failed create is logged and the
//! caller carries on, since operators often create the bucket out of band and
//! uploads will report their own failures. Only a rejected credential is fatal.

use tracing::{error, info, warn};

use crate::config::StoreTarget;
use crate::contract::{BucketDescriptor, RemoteStore};
use crate::error::{ProvisionError, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The bucket was already there.
    Existing,
    /// This process created it.
    Created(BucketDescriptor),
    /// Could not confirm the bucket exists; uploads will be attempted anyway.
    Unconfirmed { reason: String },
}

impl Readiness {
    pub fn is_confirmed(&self) -> bool {
        !matches!(self, Readiness::Unconfirmed { .. })
    }
}

/// Ensures the bucket exists at most once per process. A confirmed result is
/// remembered and later calls return it without touching the remote store.
#[derive(Debug)]
pub struct Provisioner {
    target: StoreTarget,
    confirmed: Option<Readiness>,
}

impl Provisioner {
    pub fn new(target: StoreTarget) -> Self {
        Self {
            target,
            confirmed: None,
        }
    }

    pub async fn ensure_bucket<S>(&mut self, store: &S) -> Result<Readiness, ProvisionError>
    where
        S: RemoteStore + ?Sized,
    {
        if let Some(ready) = &self.confirmed {
            return Ok(ready.clone());
        }

        let bucket = self.target.bucket.as_str();
        let readiness = match store.bucket_exists(bucket).await {
            Ok(true) => {
                info!(bucket, "[PROVISION] Bucket already exists - skipping create");
                Readiness::Existing
            }
            Ok(false) => self.create(store).await,
            Err(StoreError::Unauthorized { .. }) => {
                error!(bucket, "[PROVISION] Credential rejected while checking bucket");
                return Err(ProvisionError::Unauthorized {
                    bucket: bucket.to_string(),
                });
            }
            Err(e) => {
                warn!(bucket, error = %e, "[PROVISION] Could not determine whether bucket exists; not creating");
                Readiness::Unconfirmed {
                    reason: e.to_string(),
                }
            }
        };

        if readiness.is_confirmed() {
            self.confirmed = Some(readiness.clone());
        }
        Ok(readiness)
    }

    async fn create<S>(&self, store: &S) -> Readiness
    where
        S: RemoteStore + ?Sized,
    {
        let bucket = self.target.bucket.as_str();
        match store.create_bucket(bucket, &self.target.project_id).await {
            Ok(created) => {
                info!(
                    bucket = %created.name,
                    location = created.location.as_deref().unwrap_or("unknown"),
                    "[PROVISION] Created bucket"
                );
                Readiness::Created(created)
            }
            Err(StoreError::AlreadyExists { .. }) => {
                info!(bucket, "[PROVISION] Bucket appeared concurrently - treating as existing");
                Readiness::Existing
            }
            Err(e) => {
                error!(bucket, error = %e, "[PROVISION] Failed creating bucket; continuing");
                Readiness::Unconfirmed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
