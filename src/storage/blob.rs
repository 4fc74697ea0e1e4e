//! `BlobStore` trait — single async interface for object storage.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StorageError;

/// A signed upload URL issued to a client for direct upload.
#[derive(Debug, Clone, Serialize)]
pub struct SignedUpload {
    /// URL the client PUTs the file to.
    pub upload_url: String,
    /// Object path the upload will land at.
    pub object_path: String,
    /// Expected content type.
    pub content_type: String,
    /// When the URL stops being valid.
    pub expires_at: DateTime<Utc>,
}

/// Backend-agnostic object storage trait.
///
/// Writes are full overwrites; there is no partial or append semantics.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List object paths under a prefix. Returns full paths, not basenames.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Whether an object exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Read an object's bytes.
    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Write an object, replacing any previous content.
    async fn write(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Issue a signed URL for direct client upload to `path`.
    async fn signed_upload_url(
        &self,
        path: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<SignedUpload, StorageError>;
}

/// Reject paths that could escape the store root or collide oddly.
pub(crate) fn validate_path(path: &str) -> Result<(), StorageError> {
    if path.is_empty()
        || path.starts_with('/')
        || path.split('/').any(|seg| seg == ".." || seg.is_empty())
    {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(())
}
