//! Product converter — curated products.json + bulk products.ndjson.
//!
//! Column names vary wildly across merchant exports, so essential fields
//! are resolved through case-insensitive alias lists. The curated output
//! keeps only rows with every field the storefront needs; the corpus
//! output keeps every row and every column.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::classify::FileRole;
use crate::error::TransformError;
use crate::storage::{BlobStore, paths};
use crate::transform::readers::ReaderRegistry;
use crate::transform::record::{
    ArtifactKind, CorpusRecord, TransformArtifact, sanitize_id_or, to_ndjson,
};

/// Aliases for the curated fields, in preference order.
const NAME_ALIASES: &[&str] = &["title", "name", "product_name", "product title", "product_title"];
const IMAGE_ALIASES: &[&str] = &[
    "image",
    "image_url",
    "image_src",
    "featured_image",
    "featured_image_url",
];
const LINK_ALIASES: &[&str] = &["url", "link", "handle", "product_url", "product_link"];
const PRICE_ALIASES: &[&str] = &["price", "variant_price", "amount", "cost"];
const COMPARE_PRICE_ALIASES: &[&str] = &["compare_at_price", "variant_compare_at_price", "original_price"];

/// Id/title/description source columns for the corpus output.
const ID_ALIASES: &[&str] = &["id", "sku", "product_id", "variant_id"];
const TITLE_ALIASES: &[&str] = &["title", "name", "product_name", "product_title"];
const DESC_ALIASES: &[&str] = &["description", "body_html", "body", "product_description"];

/// One curated product, agent- and storefront-facing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CuratedProduct {
    pub name: String,
    pub image_url: String,
    pub link: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_at_price: Option<f64>,
}

/// What product processing produced.
#[derive(Debug, Clone)]
pub struct ProductOutput {
    pub curated: TransformArtifact,
    pub corpus: TransformArtifact,
    /// Curated rows kept; rows missing required fields are excluded.
    pub product_count: usize,
}

/// Converts a merchant's products file into both artifacts.
pub struct ProductTransformer {
    blob: Arc<dyn BlobStore>,
    readers: Arc<ReaderRegistry>,
}

/// Case-insensitive lookup of the first alias present in a row.
fn find_value<'a>(row: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    for alias in aliases {
        if let Some((_, value)) = row
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(alias))
        {
            return Some(value);
        }
    }
    None
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse a price; tolerates `$38.00` and `1,299.00` strings.
pub(crate) fn parse_price(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = s.replace(['$', ','], "");
            let cleaned = cleaned.trim();
            if cleaned.is_empty() {
                None
            } else {
                cleaned.parse().ok()
            }
        }
        _ => None,
    }
}

fn curate_row(row: &Map<String, Value>) -> Option<CuratedProduct> {
    let name = find_value(row, NAME_ALIASES).and_then(value_to_string)?;
    // Fall back to any column mentioning the concept when aliases miss.
    let image_url = find_value(row, IMAGE_ALIASES)
        .and_then(value_to_string)
        .or_else(|| fallback_column(row, "image"))?;
    let link = find_value(row, LINK_ALIASES)
        .and_then(value_to_string)
        .or_else(|| fallback_column(row, "url"))?;
    let price = find_value(row, PRICE_ALIASES)
        .and_then(parse_price)
        .or_else(|| {
            row.iter()
                .find(|(k, _)| k.to_ascii_lowercase().contains("price"))
                .and_then(|(_, v)| parse_price(v))
        })?;
    let compare_at_price = find_value(row, COMPARE_PRICE_ALIASES).and_then(parse_price);

    Some(CuratedProduct {
        name,
        image_url,
        link,
        price,
        compare_at_price,
    })
}

fn fallback_column(row: &Map<String, Value>, needle: &str) -> Option<String> {
    row.iter()
        .find(|(k, _)| k.to_ascii_lowercase().contains(needle))
        .and_then(|(_, v)| value_to_string(v))
}

/// Build one corpus record from a row, keeping every source column.
fn corpus_record(row: &Map<String, Value>, idx: usize) -> CorpusRecord {
    let fallback = format!("product-{idx}");
    let id = match find_value(row, ID_ALIASES).and_then(value_to_string) {
        Some(raw) => sanitize_id_or(&raw, &fallback),
        None => fallback,
    };

    let title = find_value(row, TITLE_ALIASES)
        .and_then(value_to_string)
        .unwrap_or_else(|| "Untitled Product".to_string());
    let content = find_value(row, DESC_ALIASES)
        .and_then(value_to_string)
        .unwrap_or_else(|| title.clone());

    let mut struct_data = row.clone();
    struct_data.insert("title".to_string(), Value::String(title));

    CorpusRecord::from_text(id, &content, struct_data)
}

impl ProductTransformer {
    pub fn new(blob: Arc<dyn BlobStore>, readers: Arc<ReaderRegistry>) -> Self {
        Self { blob, readers }
    }

    /// Convert the products file at `products_path` and write both
    /// artifacts (full replacement).
    pub async fn process(
        &self,
        merchant_id: &str,
        products_path: &str,
    ) -> Result<ProductOutput, TransformError> {
        debug!(merchant_id, products_path, "Reading products file");
        let bytes = self.blob.read(products_path).await?;
        let rows = self.readers.table_rows(&bytes, products_path)?;
        info!(merchant_id, rows = rows.len(), "Loaded product rows");

        let curated: Vec<CuratedProduct> = rows
            .iter()
            .filter_map(|row| {
                let product = curate_row(row);
                if product.is_none() {
                    warn!(merchant_id, "Skipping product row missing required fields");
                }
                product
            })
            .collect();

        let records: Vec<CorpusRecord> = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| corpus_record(row, idx))
            .collect();

        let curated_path = paths::curated_products_path(merchant_id);
        self.blob
            .write(
                &curated_path,
                serde_json::to_string_pretty(&curated)?.as_bytes(),
                "application/json",
            )
            .await?;

        let corpus_path = paths::products_corpus_path(merchant_id);
        self.blob
            .write(
                &corpus_path,
                to_ndjson(&records)?.as_bytes(),
                "application/x-ndjson",
            )
            .await?;

        info!(
            merchant_id,
            curated = curated.len(),
            corpus = records.len(),
            "Wrote product artifacts"
        );

        Ok(ProductOutput {
            product_count: curated.len(),
            curated: TransformArtifact {
                kind: ArtifactKind::Curated,
                path: curated_path,
                record_count: curated.len(),
                role: FileRole::Products,
            },
            corpus: TransformArtifact {
                kind: ArtifactKind::Corpus,
                path: corpus_path,
                record_count: records.len(),
                role: FileRole::Products,
            },
        })
    }
}
