#![doc = "Cloud Storage JSON API client: the networked implementation of the core RemoteStore trait."]
//
//! # Storage client (CLI <-> Core)
//!
//! [`GcsClient`] wires the [`RemoteStore`] trait from `gs-backup-core` to the
//! Cloud Storage JSON API over `reqwest`. Every request carries the bearer token
//! from the injected [`CredentialHolder`].
//!
//! - Uploads stream the open file as the request body; nothing is buffered whole.
//! - Downloads stream the response body to disk.
//! - HTTP statuses map onto structured [`StoreError`] variants (404 is `NotFound`,
//!   409 is `AlreadyExists`, 401 is `Unauthorized`), while failures to reach the
//!   service at all map to `StoreError::Transport`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use gs_backup_core::contract::{
    AccessControlEntry, BucketDescriptor, ObjectContent, ObjectDescriptor, RemoteStore,
};
use gs_backup_core::credential::CredentialHolder;
use gs_backup_core::error::StoreError;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use urlencoding::encode;

pub const DEFAULT_API_BASE: &str = "https://storage.googleapis.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketResource {
    name: String,
    #[serde(default)]
    project_number: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    self_link: Option<String>,
}

impl From<BucketResource> for BucketDescriptor {
    fn from(b: BucketResource) -> Self {
        BucketDescriptor {
            name: b.name,
            project: b.project_number,
            location: b.location,
            self_link: b.self_link,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectResource {
    bucket: String,
    name: String,
    #[serde(default)]
    self_link: Option<String>,
    #[serde(default)]
    media_link: Option<String>,
    /// The API encodes 64-bit integers as strings.
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    generation: Option<String>,
}

impl From<ObjectResource> for ObjectDescriptor {
    fn from(o: ObjectResource) -> Self {
        ObjectDescriptor {
            bucket: o.bucket,
            name: o.name,
            self_link: o.self_link,
            media_link: o.media_link,
            size: o.size.and_then(|s| s.parse().ok()),
            generation: o.generation,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AclResource {
    entity: String,
    role: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct GcsClient {
    http: Client,
    api_base: String,
    credential: CredentialHolder,
}

impl GcsClient {
    pub fn new(
        api_base: impl Into<String>,
        credential: CredentialHolder,
    ) -> Result<Self, StoreError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Transport(format!("building HTTP client: {e}")))?;
        let api_base = api_base.into().trim_end_matches('/').to_string();
        tracing::info!(api_base = %api_base, "Initialized storage client");
        Ok(Self {
            http,
            api_base,
            credential,
        })
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!("{}/storage/v1/b/{}", self.api_base, encode(bucket))
    }

    fn object_url(&self, bucket: &str, object: &str) -> String {
        format!("{}/o/{}", self.bucket_url(bucket), encode(object))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(AUTHORIZATION, self.credential.authorization_header())
    }

    async fn send(&self, builder: RequestBuilder, resource: &str) -> Result<Response, StoreError> {
        let response = self.authorized(builder).send().await.map_err(|e| {
            tracing::error!(error = %e, resource, "[STORE] Request did not reach storage service");
            StoreError::Transport(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|env| env.error.message)
            .unwrap_or(body);
        tracing::debug!(status = status.as_u16(), resource, message = %message, "[STORE] Storage service rejected request");
        Err(StoreError::from_status(status.as_u16(), resource, message))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        resource: &str,
    ) -> Result<T, StoreError> {
        let response = self.send(builder, resource).await?;
        let status = response.status().as_u16();
        response.json::<T>().await.map_err(|e| StoreError::Service {
            status,
            message: format!("malformed response for {resource}: {e}"),
        })
    }

    async fn list_all<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        resource: &str,
    ) -> Result<Vec<T>, StoreError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut builder = self.http.get(url).query(query);
            if let Some(token) = &page_token {
                builder = builder.query(&[("pageToken", token.as_str())]);
            }
            let page: ListResponse<T> = self.send_json(builder, resource).await?;
            items.extend(page.items);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(items),
            }
        }
    }
}

#[async_trait]
impl RemoteStore for GcsClient {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        let builder = self.http.get(self.bucket_url(bucket));
        match self.send(builder, bucket).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_bucket(
        &self,
        bucket: &str,
        project_id: &str,
    ) -> Result<BucketDescriptor, StoreError> {
        tracing::info!(bucket, project_id, "[STORE] Inserting bucket");
        let builder = self
            .http
            .post(format!("{}/storage/v1/b", self.api_base))
            .query(&[("project", project_id)])
            .json(&serde_json::json!({ "name": bucket }));
        let created: BucketResource = self.send_json(builder, bucket).await?;
        Ok(created.into())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        object: &str,
        content: ObjectContent,
    ) -> Result<ObjectDescriptor, StoreError> {
        tracing::info!(
            bucket,
            object,
            source = %content.path.display(),
            bytes = content.len,
            "[STORE] Uploading object"
        );
        let body = reqwest::Body::wrap_stream(ReaderStream::new(content.file));
        let builder = self
            .http
            .post(format!(
                "{}/upload/storage/v1/b/{}/o",
                self.api_base,
                encode(bucket)
            ))
            .query(&[("uploadType", "media"), ("name", object)])
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, content.len)
            .body(body);
        let resource = format!("{bucket}/{object}");
        let uploaded: ObjectResource = self.send_json(builder, &resource).await?;
        Ok(uploaded.into())
    }

    async fn get_object(&self, bucket: &str, object: &str) -> Result<ObjectDescriptor, StoreError> {
        let builder = self.http.get(self.object_url(bucket, object));
        let resource = format!("{bucket}/{object}");
        let found: ObjectResource = self.send_json(builder, &resource).await?;
        Ok(found.into())
    }

    async fn upsert_object_acl(
        &self,
        bucket: &str,
        object: &str,
        entity: &str,
        role: &str,
    ) -> Result<AccessControlEntry, StoreError> {
        let builder = self
            .http
            .post(format!("{}/acl", self.object_url(bucket, object)))
            .json(&serde_json::json!({ "entity": entity, "role": role }));
        let resource = format!("{bucket}/{object}/acl/{entity}");
        let acl: AclResource = self.send_json(builder, &resource).await?;
        Ok(AccessControlEntry {
            bucket: bucket.to_string(),
            object: object.to_string(),
            entity: acl.entity,
            role: acl.role,
        })
    }

    async fn get_object_acl(
        &self,
        bucket: &str,
        object: &str,
        entity: &str,
    ) -> Result<AccessControlEntry, StoreError> {
        let builder = self
            .http
            .get(format!("{}/acl/{}", self.object_url(bucket, object), encode(entity)));
        let resource = format!("{bucket}/{object}/acl/{entity}");
        let acl: AclResource = self.send_json(builder, &resource).await?;
        Ok(AccessControlEntry {
            bucket: bucket.to_string(),
            object: object.to_string(),
            entity: acl.entity,
            role: acl.role,
        })
    }

    async fn list_buckets(&self, project_id: &str) -> Result<Vec<BucketDescriptor>, StoreError> {
        let url = format!("{}/storage/v1/b", self.api_base);
        let buckets: Vec<BucketResource> = self
            .list_all(&url, &[("project", project_id)], project_id)
            .await?;
        Ok(buckets.into_iter().map(Into::into).collect())
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectDescriptor>, StoreError> {
        let url = format!("{}/o", self.bucket_url(bucket));
        let objects: Vec<ObjectResource> = self.list_all(&url, &[], bucket).await?;
        Ok(objects.into_iter().map(Into::into).collect())
    }

    async fn download_object(
        &self,
        object: &ObjectDescriptor,
        destination: &Path,
    ) -> Result<u64, StoreError> {
        let builder = match &object.media_link {
            Some(link) => self.http.get(link),
            None => self
                .http
                .get(self.object_url(&object.bucket, &object.name))
                .query(&[("alt", "media")]),
        };
        let resource = format!("{}/{}", object.bucket, object.name);
        let response = self.send(builder, &resource).await?;

        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StoreError::Transport(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        tracing::info!(resource = %resource, bytes = written, destination = %destination.display(), "[STORE] Downloaded object");
        Ok(written)
    }
}
