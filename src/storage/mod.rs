//! Blob store collaborator — object storage behind a narrow async trait.
//!
//! All merchant artifacts (uploads, transformed corpus files, the config
//! document) live under a per-merchant namespace; `paths` is the single
//! source of truth for that layout.

pub mod blob;
pub mod local;
pub mod memory;
pub mod paths;

pub use blob::{BlobStore, SignedUpload};
pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
