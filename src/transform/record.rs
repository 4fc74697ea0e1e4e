//! Corpus record model — the search index's import format.
//!
//! One record per line of NDJSON: a sanitized id, base64 text content,
//! and a free-form `struct_data` map carrying all source fields.

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::classify::FileRole;

static INVALID_ID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("static regex"));
static HYPHEN_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").expect("static regex"));

/// Sanitize a raw identifier to `[A-Za-z0-9_-]+`.
///
/// Invalid characters become hyphens, hyphen runs collapse to one, and
/// leading/trailing hyphens are stripped. Returns `None` when nothing
/// survives; callers fall back to a positional id.
pub fn sanitize_id(raw: &str) -> Option<String> {
    let replaced = INVALID_ID_CHARS.replace_all(raw, "-");
    let collapsed = HYPHEN_RUNS.replace_all(&replaced, "-");
    let trimmed = collapsed.trim_matches('-');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Sanitize `raw`, falling back to `fallback` (already clean) when the
/// sanitized form is empty.
pub fn sanitize_id_or(raw: &str, fallback: &str) -> String {
    sanitize_id(raw).unwrap_or_else(|| fallback.to_string())
}

/// Base64-wrapped text content of a corpus record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordContent {
    pub mime_type: String,
    pub raw_bytes: String,
}

/// One importable search index record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorpusRecord {
    pub id: String,
    pub content: RecordContent,
    pub struct_data: Map<String, Value>,
}

impl CorpusRecord {
    /// Build a record from plain text; the text is carried base64-encoded.
    pub fn from_text(id: String, text: &str, struct_data: Map<String, Value>) -> Self {
        Self {
            id,
            content: RecordContent {
                mime_type: "text/plain".to_string(),
                raw_bytes: BASE64.encode(text.as_bytes()),
            },
            struct_data,
        }
    }
}

/// Serialize records as NDJSON (one JSON object per line).
pub fn to_ndjson(records: &[CorpusRecord]) -> Result<String, serde_json::Error> {
    let mut lines = Vec::with_capacity(records.len());
    for record in records {
        lines.push(serde_json::to_string(record)?);
    }
    Ok(lines.join("\n"))
}

/// What kind of artifact a converter produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Small, agent-facing.
    Curated,
    /// Bulk, search-index-facing.
    Corpus,
}

/// A written transform output.
#[derive(Debug, Clone, Serialize)]
pub struct TransformArtifact {
    pub kind: ArtifactKind,
    pub path: String,
    pub record_count: usize,
    pub role: FileRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_is_idempotent_on_clean_ids() {
        for id in ["abc", "A-b_C9", "product-12"] {
            assert_eq!(sanitize_id(id).as_deref(), Some(id));
        }
    }

    #[test]
    fn sanitize_collapses_hyphen_runs() {
        let id = sanitize_id("Men's Shoes!!").unwrap();
        assert_eq!(id, "Men-s-Shoes");
        assert!(!id.contains("--"));
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn sanitize_strips_edges() {
        assert_eq!(sanitize_id("--x--").as_deref(), Some("x"));
        assert_eq!(sanitize_id("!!!"), None);
        assert_eq!(sanitize_id(""), None);
    }

    #[test]
    fn fallback_applies_only_when_empty() {
        assert_eq!(sanitize_id_or("sku 42", "product-0"), "sku-42");
        assert_eq!(sanitize_id_or("¡¡¡", "product-0"), "product-0");
    }

    #[test]
    fn record_encodes_text_as_base64() {
        let record = CorpusRecord::from_text("r1".to_string(), "hello", Map::new());
        assert_eq!(record.content.mime_type, "text/plain");
        assert_eq!(
            BASE64.decode(&record.content.raw_bytes).unwrap(),
            b"hello"
        );
    }

    #[test]
    fn ndjson_is_one_record_per_line() {
        let records = vec![
            CorpusRecord::from_text("a".to_string(), "x", Map::new()),
            CorpusRecord::from_text("b".to_string(), "y", Map::new()),
        ];
        let ndjson = to_ndjson(&records).unwrap();
        let lines: Vec<&str> = ndjson.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: CorpusRecord = serde_json::from_str(line).unwrap();
            assert!(!parsed.id.is_empty());
        }
    }
}
