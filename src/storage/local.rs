//! Filesystem-backed blob store — the binary's default backend.
//!
//! Object paths map directly to files under a root directory. Signed
//! upload URLs point at the service's own upload endpoint with an expiry
//! timestamp baked into the query string.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::error::StorageError;
use crate::storage::blob::{BlobStore, SignedUpload, validate_path};

/// Blob store rooted at a local directory.
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    /// Open (or create) the store root.
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        info!(root = %root.display(), "Blob store opened");
        Ok(Self {
            root,
            public_base_url: public_base_url.into(),
        })
    }

    fn abs(&self, path: &str) -> Result<PathBuf, StorageError> {
        validate_path(path)?;
        Ok(self.root.join(path))
    }
}

/// Collect files under `dir`, returning store-relative paths.
fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk(&path, root, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let root = self.root.clone();
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            // Walk only the directory named by the prefix, if present.
            let start = root.join(prefix.trim_end_matches('/'));
            if start.is_dir() {
                walk(&start, &root, &mut out).map_err(|e| StorageError::ListFailed {
                    prefix: prefix.clone(),
                    reason: e.to_string(),
                })?;
            }
            out.retain(|p| p.starts_with(&prefix));
            out.sort();
            Ok(out)
        })
        .await
        .map_err(|e| StorageError::ListFailed {
            prefix: "?".to_string(),
            reason: e.to_string(),
        })?
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.abs(path)?.is_file())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let abs = self.abs(path)?;
        if !abs.is_file() {
            return Err(StorageError::NotFound(path.to_string()));
        }
        tokio::fs::read(&abs)
            .await
            .map_err(|e| StorageError::ReadFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    async fn write(
        &self,
        path: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let abs = self.abs(path)?;
        if let Some(parent) = abs.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::WriteFailed {
                    path: path.to_string(),
                    reason: e.to_string(),
                })?;
        }
        tokio::fs::write(&abs, bytes)
            .await
            .map_err(|e| StorageError::WriteFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    async fn signed_upload_url(
        &self,
        path: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<SignedUpload, StorageError> {
        validate_path(path)?;
        let expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
        // One-time token so issued URLs are distinguishable even for the
        // same object path.
        let token = uuid::Uuid::new_v4();
        Ok(SignedUpload {
            upload_url: format!(
                "{}/upload/{}?expires={}&token={}",
                self.public_base_url.trim_end_matches('/'),
                path,
                expires_at.timestamp(),
                token
            ),
            object_path: path.to_string(),
            content_type: content_type.to_string(),
            expires_at,
        })
    }
}
