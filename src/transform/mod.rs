//! Transform stage — turns uploaded merchant files into artifacts.
//!
//! Each role converter produces up to two outputs: a curated artifact for
//! the chat agent (small, typed) and a bulk corpus artifact for the
//! search index (NDJSON, one record per line). Outputs are always full
//! replacements of any prior artifact at the same path.

pub mod categories;
pub mod config_doc;
pub mod documents;
pub mod products;
pub mod readers;
pub mod record;

pub use categories::{CategoryOutput, CategoryTransformer};
pub use config_doc::{ConfigGenerator, ConfigOutput, ConfigProfile, MerchantConfig};
pub use documents::{DocumentOutput, DocumentTransformer};
pub use products::{ProductOutput, ProductTransformer};
pub use readers::ReaderRegistry;
pub use record::{ArtifactKind, CorpusRecord, TransformArtifact};
