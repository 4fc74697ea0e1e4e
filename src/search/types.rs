//! Search index collaborator contract — trait and wire-adjacent types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SearchIndexError;

/// What a datastore is for. Modes are mutually exclusive per datastore
/// instance (external constraint, not ours).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatastoreMode {
    /// Crawls a registered public website.
    WebsiteCrawl,
    /// Accepts bulk corpus imports.
    DocumentImport,
}

impl std::fmt::Display for DatastoreMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WebsiteCrawl => write!(f, "website_crawl"),
            Self::DocumentImport => write!(f, "document_import"),
        }
    }
}

/// Provisioning state reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatastoreStatus {
    Created,
    Exists,
    Provisioning,
    Error,
}

impl DatastoreStatus {
    /// Whether the datastore is usable (created now or already there).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Created | Self::Exists)
    }
}

impl std::fmt::Display for DatastoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Exists => "exists",
            Self::Provisioning => "provisioning",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Request to create a datastore.
#[derive(Debug, Clone, Serialize)]
pub struct DatastoreSpec {
    pub id: String,
    pub display_name: String,
    pub mode: DatastoreMode,
}

/// A provisioned (or pre-existing) datastore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatastoreInfo {
    pub id: String,
    pub display_name: String,
    pub mode: DatastoreMode,
    pub status: DatastoreStatus,
}

/// Import replacement semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportMode {
    /// Replace the datastore's corpus with the artifact.
    Full,
    /// Merge the artifact into the existing corpus.
    Incremental,
}

/// Outcome of one corpus import call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    /// Records accepted by the service, when it reports them.
    pub imported: Option<u64>,
    /// Per-record errors; a non-empty list does not mean total failure.
    pub errors: Vec<String>,
}

/// Outcome of registering a crawl target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRegistration {
    pub datastore_id: String,
    pub url: String,
    /// "registered" or "already_registered".
    pub status: String,
}

/// Async interface to the managed search index service.
///
/// Lookups return `Ok(None)` for a missing datastore; errors are reserved
/// for actual failures. Provisioning and import calls can run for tens of
/// minutes on the provider side, so nothing here may be called while
/// holding a lock.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Look up a datastore by id.
    async fn get_datastore(&self, id: &str) -> Result<Option<DatastoreInfo>, SearchIndexError>;

    /// Create a datastore. `AlreadyExists` is an error here; callers
    /// wanting ensure-semantics go through `Provisioner`.
    async fn create_datastore(
        &self,
        spec: &DatastoreSpec,
    ) -> Result<DatastoreInfo, SearchIndexError>;

    /// Import a corpus artifact into a document-import datastore.
    async fn import_corpus(
        &self,
        datastore_id: &str,
        artifact_uri: &str,
        mode: ImportMode,
    ) -> Result<ImportReport, SearchIndexError>;

    /// Register a website for managed crawling on a website datastore.
    async fn register_crawl_target(
        &self,
        datastore_id: &str,
        url: &str,
    ) -> Result<CrawlRegistration, SearchIndexError>;
}

/// Datastore id for a merchant's website-crawl datastore.
pub fn website_datastore_id(merchant_id: &str) -> String {
    format!("{merchant_id}-website-engine")
}

/// Datastore id for a merchant's document-import datastore.
pub fn documents_datastore_id(merchant_id: &str) -> String {
    format!("{merchant_id}-docs-engine")
}
