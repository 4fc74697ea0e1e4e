//! Category converter — bulk categories.ndjson only.
//!
//! Categories have no curated output; they exist purely as search
//! corpus. Ids are namespaced per merchant so category records never
//! collide with product ids in the same datastore.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::classify::FileRole;
use crate::error::TransformError;
use crate::storage::{BlobStore, paths};
use crate::transform::readers::ReaderRegistry;
use crate::transform::record::{
    ArtifactKind, CorpusRecord, TransformArtifact, sanitize_id_or, to_ndjson,
};

const ID_ALIASES: &[&str] = &["id", "category_id", "slug", "handle"];
const NAME_ALIASES: &[&str] = &["name", "title", "category_name", "label"];
const DESC_ALIASES: &[&str] = &["description", "desc", "category_description", "body"];

/// What category processing produced.
#[derive(Debug, Clone)]
pub struct CategoryOutput {
    pub corpus: TransformArtifact,
    pub category_count: usize,
}

/// Converts a merchant's categories file into its corpus artifact.
pub struct CategoryTransformer {
    blob: Arc<dyn BlobStore>,
    readers: Arc<ReaderRegistry>,
}

fn find_value<'a>(row: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|alias| {
        row.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(alias))
            .map(|(_, v)| v)
    })
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn category_record(row: &Map<String, Value>, merchant_id: &str, idx: usize) -> CorpusRecord {
    let fallback = format!("category-{merchant_id}-{idx}");
    let id = match find_value(row, ID_ALIASES).and_then(value_to_string) {
        Some(raw) => sanitize_id_or(&format!("category-{merchant_id}-{raw}"), &fallback),
        None => fallback,
    };

    let title = find_value(row, NAME_ALIASES)
        .and_then(value_to_string)
        .unwrap_or_else(|| "Untitled Category".to_string());
    let content = find_value(row, DESC_ALIASES)
        .and_then(value_to_string)
        .unwrap_or_else(|| title.clone());

    let mut struct_data = Map::new();
    struct_data.insert("type".to_string(), Value::String("category".to_string()));
    struct_data.insert(
        "merchant_id".to_string(),
        Value::String(merchant_id.to_string()),
    );
    for (key, value) in row {
        struct_data.insert(key.clone(), value.clone());
    }
    struct_data.insert("title".to_string(), Value::String(title));

    CorpusRecord::from_text(id, &content, struct_data)
}

impl CategoryTransformer {
    pub fn new(blob: Arc<dyn BlobStore>, readers: Arc<ReaderRegistry>) -> Self {
        Self { blob, readers }
    }

    /// Convert the categories file and write the corpus artifact.
    pub async fn process(
        &self,
        merchant_id: &str,
        categories_path: &str,
    ) -> Result<CategoryOutput, TransformError> {
        debug!(merchant_id, categories_path, "Reading categories file");
        let bytes = self.blob.read(categories_path).await?;
        let rows = self.readers.table_rows(&bytes, categories_path)?;

        let records: Vec<CorpusRecord> = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| category_record(row, merchant_id, idx))
            .collect();

        let corpus_path = paths::categories_corpus_path(merchant_id);
        self.blob
            .write(
                &corpus_path,
                to_ndjson(&records)?.as_bytes(),
                "application/x-ndjson",
            )
            .await?;

        info!(merchant_id, count = records.len(), "Wrote categories artifact");

        Ok(CategoryOutput {
            category_count: records.len(),
            corpus: TransformArtifact {
                kind: ArtifactKind::Corpus,
                path: corpus_path,
                record_count: records.len(),
                role: FileRole::Categories,
            },
        })
    }
}
