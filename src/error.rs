//! Error types for the onboarding service.

use std::time::Duration;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Search index error: {0}")]
    SearchIndex(#[from] SearchIndexError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Onboarding error: {0}")]
    Onboard(#[from] OnboardError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blob store errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("Read failed for {path}: {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("Write failed for {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("Listing failed for prefix {prefix}: {reason}")]
    ListFailed { prefix: String, reason: String },

    #[error("Signed URL issuance failed for {path}: {reason}")]
    SignedUrl { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Merchant registry / step ledger errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Merchant not found: {merchant_id}")]
    NotFound { merchant_id: String },

    #[error("Unknown ledger step: {0}")]
    UnknownStep(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Search index service errors.
///
/// `PermissionDenied` is a distinguished kind: callers surface it with a
/// remediation hint instead of the raw provider error.
#[derive(Debug, thiserror::Error)]
pub enum SearchIndexError {
    #[error("Permission denied by search index service: {detail}")]
    PermissionDenied { detail: String },

    #[error("Datastore {id} already exists")]
    AlreadyExists { id: String },

    #[error("Datastore {id} is mode {actual}, operation requires {required}")]
    ModeMismatch {
        id: String,
        actual: String,
        required: String,
    },

    #[error("Request to search index service failed: {0}")]
    Request(String),

    #[error("Invalid response from search index service: {0}")]
    InvalidResponse(String),

    #[error("Search index operation timed out after {0:?}")]
    Timeout(Duration),
}

impl SearchIndexError {
    /// Whether this error is the actionable missing-permissions kind.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}

/// Transform stage errors.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("No reader available for {0}")]
    NoReader(String),

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Text extraction failed for {path}: {reason}")]
    Extraction { path: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Orchestrator-level errors. One variant per fatal failure class; the
/// step name travels with the error so logs and the ledger can correlate.
#[derive(Debug, thiserror::Error)]
pub enum OnboardError {
    #[error("Merchant record creation failed: {0}")]
    MerchantRecord(RegistryError),

    #[error("Folder creation failed: {0}")]
    Folders(StorageError),

    #[error("Product processing failed: {0}")]
    Products(TransformError),

    #[error("Datastore provisioning failed: {0}")]
    Provisioning(SearchIndexError),

    #[error("Config generation failed: {0}")]
    ConfigGeneration(String),

    #[error("Finalization failed: {0}")]
    Finalize(RegistryError),

    #[error("Run already in progress for merchant {0}")]
    AlreadyRunning(String),
}

impl OnboardError {
    /// Run step on which this fatal error occurred.
    pub fn step(&self) -> crate::pipeline::step::OnboardingStep {
        use crate::pipeline::step::OnboardingStep;
        match self {
            Self::MerchantRecord(_) => OnboardingStep::CreateMerchantRecord,
            Self::Folders(_) => OnboardingStep::CreateFolders,
            Self::Products(_) => OnboardingStep::ProcessProducts,
            Self::Provisioning(_) => OnboardingStep::SetupSearchIndex,
            Self::ConfigGeneration(_) => OnboardingStep::GenerateConfig,
            Self::Finalize(_) => OnboardingStep::Finalize,
            Self::AlreadyRunning(_) => OnboardingStep::CreateMerchantRecord,
        }
    }
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
