//! Search index service collaborator.
//!
//! The managed datastore backing the chat agent's retrieval. One hard
//! external constraint shapes everything here: a datastore either crawls
//! a website or accepts document imports, never both, so a merchant that
//! needs both gets two datastores.

pub mod provision;
pub mod rest;
pub mod types;

pub use provision::{ProvisionOutcome, Provisioner};
pub use rest::RestSearchIndex;
pub use types::{
    CrawlRegistration, DatastoreInfo, DatastoreMode, DatastoreSpec, DatastoreStatus, ImportMode,
    ImportReport, SearchIndex, documents_datastore_id, website_datastore_id,
};
