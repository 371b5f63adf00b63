//! Error taxonomy shared by the core crate.
//!
//! Remote failures are split into structured statuses (not found, already
//! exists, unauthorized), other service rejections, and local transport
//! failures, so callers can pick fatal vs. log-and-continue without reading
//! error text.

use std::path::PathBuf;

/// Failure of a single call against the remote object store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("already exists: {resource}")]
    AlreadyExists { resource: String },

    #[error("credential rejected by remote service (status {status})")]
    Unauthorized { status: u16 },

    #[error("remote service error (status {status}): {message}")]
    Service { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("local i/o error: {0}")]
    LocalIo(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// True for failures that never reached the remote service.
    pub fn is_transport(&self) -> bool {
        matches!(self, StoreError::Transport(_))
    }

    /// Maps an HTTP status and body onto the structured variants.
    pub fn from_status(status: u16, resource: &str, message: impl Into<String>) -> Self {
        match status {
            404 => StoreError::NotFound {
                resource: resource.to_string(),
            },
            409 => StoreError::AlreadyExists {
                resource: resource.to_string(),
            },
            401 => StoreError::Unauthorized { status },
            _ => StoreError::Service {
                status,
                message: message.into(),
            },
        }
    }
}

/// Failure to obtain a usable credential at startup.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no cached credential and no authorization code; visit {auth_url} and run again with --code")]
    AuthUnavailable { auth_url: String },

    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("token cache {path:?}: {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("token cache {path:?} is malformed: {source}")]
    MalformedCache {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Fatal outcome of provisioning.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("credential rejected while checking bucket {bucket}")]
    Unauthorized { bucket: String },
}

/// Fatal outcome of the synchronization loop.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("cannot open backup source {path:?}: {source}")]
    LocalFileUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
