#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use gs_backup_core::contract::{
    AccessControlEntry, BucketDescriptor, ObjectContent, ObjectDescriptor, RemoteStore,
};
use gs_backup_core::error::StoreError;
use gs_backup_core::report::{CycleOutcome, OutcomeReporter};
use tokio::io::AsyncReadExt;

/// In-memory store: keeps only the latest write per object name.
#[derive(Default)]
pub struct MemoryStore {
    buckets: Mutex<HashSet<String>>,
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    acls: Mutex<HashSet<(String, String, String, String)>>,
    pub create_calls: AtomicUsize,
    pub exists_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn with_bucket(bucket: &str) -> Self {
        let store = Self::default();
        store.buckets.lock().unwrap().insert(bucket.to_string());
        store
    }

    pub fn object_names(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, o)| o.clone())
            .collect()
    }

    pub fn content(&self, bucket: &str, object: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), object.to_string()))
            .cloned()
    }

    pub fn acl_count(&self) -> usize {
        self.acls.lock().unwrap().len()
    }

    fn descriptor(bucket: &str, object: &str, size: u64) -> ObjectDescriptor {
        ObjectDescriptor {
            bucket: bucket.to_string(),
            name: object.to_string(),
            self_link: Some(format!("memory://{bucket}/{object}")),
            media_link: None,
            size: Some(size),
            generation: None,
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.buckets.lock().unwrap().contains(bucket))
    }

    async fn create_bucket(
        &self,
        bucket: &str,
        project_id: &str,
    ) -> Result<BucketDescriptor, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if !self.buckets.lock().unwrap().insert(bucket.to_string()) {
            return Err(StoreError::AlreadyExists {
                resource: bucket.to_string(),
            });
        }
        Ok(BucketDescriptor {
            name: bucket.to_string(),
            project: Some(project_id.to_string()),
            location: Some("US".to_string()),
            self_link: None,
        })
    }

    async fn upload_object(
        &self,
        bucket: &str,
        object: &str,
        mut content: ObjectContent,
    ) -> Result<ObjectDescriptor, StoreError> {
        if !self.buckets.lock().unwrap().contains(bucket) {
            return Err(StoreError::NotFound {
                resource: bucket.to_string(),
            });
        }
        let mut bytes = Vec::new();
        content.file.read_to_end(&mut bytes).await?;
        let size = bytes.len() as u64;
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), object.to_string()), bytes);
        Ok(Self::descriptor(bucket, object, size))
    }

    async fn get_object(&self, bucket: &str, object: &str) -> Result<ObjectDescriptor, StoreError> {
        self.content(bucket, object)
            .map(|c| Self::descriptor(bucket, object, c.len() as u64))
            .ok_or_else(|| StoreError::NotFound {
                resource: format!("{bucket}/{object}"),
            })
    }

    async fn upsert_object_acl(
        &self,
        bucket: &str,
        object: &str,
        entity: &str,
        role: &str,
    ) -> Result<AccessControlEntry, StoreError> {
        if self.content(bucket, object).is_none() {
            return Err(StoreError::NotFound {
                resource: format!("{bucket}/{object}"),
            });
        }
        self.acls.lock().unwrap().insert((
            bucket.to_string(),
            object.to_string(),
            entity.to_string(),
            role.to_string(),
        ));
        Ok(AccessControlEntry {
            bucket: bucket.to_string(),
            object: object.to_string(),
            entity: entity.to_string(),
            role: role.to_string(),
        })
    }

    async fn get_object_acl(
        &self,
        bucket: &str,
        object: &str,
        entity: &str,
    ) -> Result<AccessControlEntry, StoreError> {
        self.acls
            .lock()
            .unwrap()
            .iter()
            .find(|(b, o, e, _)| b == bucket && o == object && e == entity)
            .map(|(b, o, e, r)| AccessControlEntry {
                bucket: b.clone(),
                object: o.clone(),
                entity: e.clone(),
                role: r.clone(),
            })
            .ok_or_else(|| StoreError::NotFound {
                resource: format!("{bucket}/{object}/acl/{entity}"),
            })
    }

    async fn list_buckets(&self, _project_id: &str) -> Result<Vec<BucketDescriptor>, StoreError> {
        Ok(self
            .buckets
            .lock()
            .unwrap()
            .iter()
            .map(|name| BucketDescriptor {
                name: name.clone(),
                project: None,
                location: None,
                self_link: None,
            })
            .collect())
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectDescriptor>, StoreError> {
        Ok(self
            .object_names(bucket)
            .iter()
            .map(|name| Self::descriptor(bucket, name, 0))
            .collect())
    }

    async fn download_object(
        &self,
        object: &ObjectDescriptor,
        destination: &Path,
    ) -> Result<u64, StoreError> {
        let bytes = self
            .content(&object.bucket, &object.name)
            .ok_or_else(|| StoreError::NotFound {
                resource: object.name.clone(),
            })?;
        tokio::fs::write(destination, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}

/// Keeps every reported outcome, for assertions.
#[derive(Default)]
pub struct RecordingReporter {
    pub outcomes: Mutex<Vec<CycleOutcome>>,
}

impl RecordingReporter {
    pub fn take(&self) -> Vec<CycleOutcome> {
        std::mem::take(&mut *self.outcomes.lock().unwrap())
    }
}

impl OutcomeReporter for RecordingReporter {
    fn report(&self, outcome: &CycleOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }
}
