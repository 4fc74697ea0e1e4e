//! Free-form document conversion with chunking.
//!
//! Documents can be large, so extracted text is split into chunks
//! before becoming corpus records. Files without a registered reader
//! are skipped rather than failing the run.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::classify::FileRole;
use crate::error::TransformError;
use crate::storage::{BlobStore, paths};
use crate::transform::readers::ReaderRegistry;
use crate::transform::record::{
    ArtifactKind, CorpusRecord, TransformArtifact, sanitize_id_or, to_ndjson,
};

/// Soft cap on characters per chunk. Paragraph boundaries are
/// preferred, a single paragraph above the cap is split on sentences.
const CHUNK_CHARS: usize = 10_000;

/// What document processing produced.
#[derive(Debug, Clone)]
pub struct DocumentOutput {
    /// Absent when every file was skipped or produced no text.
    pub artifact: Option<TransformArtifact>,
    pub document_count: usize,
    pub skipped_files: Vec<String>,
}

pub struct DocumentTransformer {
    blob: Arc<dyn BlobStore>,
    readers: Arc<ReaderRegistry>,
}

/// Split text into chunks of at most roughly `CHUNK_CHARS` characters.
fn chunk_text(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= CHUNK_CHARS {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        for piece in split_oversized(paragraph) {
            if !current.is_empty() && current.chars().count() + piece.chars().count() > CHUNK_CHARS
            {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(&piece);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Break a paragraph larger than the cap on sentence ends.
fn split_oversized(paragraph: &str) -> Vec<String> {
    if paragraph.chars().count() <= CHUNK_CHARS {
        return vec![paragraph.to_string()];
    }
    let mut pieces = Vec::new();
    let mut current = String::new();
    for sentence in paragraph.split_inclusive(['.', '!', '?']) {
        if !current.is_empty() && current.chars().count() + sentence.chars().count() > CHUNK_CHARS {
            pieces.push(std::mem::take(&mut current));
        }
        current.push_str(sentence);
        // A sentence alone above the cap gets flushed as-is.
        if current.chars().count() > CHUNK_CHARS {
            pieces.push(std::mem::take(&mut current));
        }
    }
    if !current.trim().is_empty() {
        pieces.push(current);
    }
    pieces
}

fn document_records(path: &str, text: &str, doc_idx: usize) -> Vec<CorpusRecord> {
    let filename = paths::basename(path);
    let stem = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem.to_string())
        .unwrap_or_else(|| filename.clone());

    let chunks = chunk_text(text);
    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(chunk_idx, chunk)| {
            let id = sanitize_id_or(
                &format!("{stem}-{chunk_idx}"),
                &format!("doc-{doc_idx}-{chunk_idx}"),
            );
            let title = if total > 1 {
                format!("{stem} (Part {})", chunk_idx + 1)
            } else {
                stem.clone()
            };

            let mut struct_data = Map::new();
            struct_data.insert("title".to_string(), Value::String(title));
            struct_data.insert("source".to_string(), Value::String("document".to_string()));
            struct_data.insert("filename".to_string(), Value::String(filename.clone()));
            struct_data.insert("chunk_index".to_string(), Value::from(chunk_idx));
            struct_data.insert("total_chunks".to_string(), Value::from(total));

            CorpusRecord::from_text(id, &chunk, struct_data)
        })
        .collect()
}

impl DocumentTransformer {
    pub fn new(blob: Arc<dyn BlobStore>, readers: Arc<ReaderRegistry>) -> Self {
        Self { blob, readers }
    }

    /// Convert every readable document and write one combined corpus
    /// artifact. Unreadable files are reported, not fatal.
    pub async fn process(
        &self,
        merchant_id: &str,
        document_paths: &[String],
    ) -> Result<DocumentOutput, TransformError> {
        let mut records = Vec::new();
        let mut skipped_files = Vec::new();
        let mut document_count = 0usize;

        for (doc_idx, path) in document_paths.iter().enumerate() {
            if !self.blob.exists(path).await? {
                warn!(merchant_id, path, "Document listed but missing, skipping");
                skipped_files.push(path.clone());
                continue;
            }
            let bytes = self.blob.read(path).await?;
            let text = match self.readers.document_text(&bytes, path) {
                Ok(text) => text,
                Err(TransformError::NoReader(_)) => {
                    warn!(merchant_id, path, "No reader for document, skipping");
                    skipped_files.push(path.clone());
                    continue;
                }
                Err(err) => return Err(err),
            };

            let doc_records = document_records(path, &text, doc_idx);
            if doc_records.is_empty() {
                debug!(merchant_id, path, "Document produced no text, skipping");
                skipped_files.push(path.clone());
                continue;
            }
            document_count += 1;
            records.extend(doc_records);
        }

        let artifact = if records.is_empty() {
            None
        } else {
            let corpus_path = paths::documents_corpus_path(merchant_id);
            self.blob
                .write(
                    &corpus_path,
                    to_ndjson(&records)?.as_bytes(),
                    "application/x-ndjson",
                )
                .await?;
            Some(TransformArtifact {
                kind: ArtifactKind::Corpus,
                path: corpus_path,
                record_count: records.len(),
                role: FileRole::Document,
            })
        };

        info!(
            merchant_id,
            documents = document_count,
            records = records.len(),
            skipped = skipped_files.len(),
            "Document conversion finished"
        );

        Ok(DocumentOutput {
            artifact,
            document_count,
            skipped_files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStore;
    use crate::transform::readers::DocumentReader;

    #[tokio::test]
    async fn readable_and_unreadable_documents() {
        let store = Arc::new(MemoryBlobStore::new());
        store
            .write(
                "merchants/m1/knowledge_base/faq.txt",
                b"How do returns work?\n\nShip it back within 30 days.",
                "text/plain",
            )
            .await
            .unwrap();
        store
            .write(
                "merchants/m1/knowledge_base/brochure.pdf",
                b"%PDF-1.4",
                "application/pdf",
            )
            .await
            .unwrap();

        let output = DocumentTransformer::new(store.clone(), Arc::new(ReaderRegistry::builtin()))
            .process(
                "m1",
                &[
                    "merchants/m1/knowledge_base/faq.txt".to_string(),
                    "merchants/m1/knowledge_base/brochure.pdf".to_string(),
                ],
            )
            .await
            .unwrap();

        assert_eq!(output.document_count, 1);
        assert_eq!(
            output.skipped_files,
            vec!["merchants/m1/knowledge_base/brochure.pdf".to_string()]
        );
        let artifact = output.artifact.unwrap();
        assert_eq!(artifact.path, "merchants/m1/training_files/documents.ndjson");
        assert_eq!(artifact.record_count, 1);

        let ndjson = store.read(&artifact.path).await.unwrap();
        let record: CorpusRecord =
            serde_json::from_str(String::from_utf8(ndjson).unwrap().lines().next().unwrap())
                .unwrap();
        assert_eq!(record.id, "faq-0");
        assert_eq!(record.struct_data["title"], "faq");
        assert_eq!(record.struct_data["filename"], "faq.txt");
        assert_eq!(record.struct_data["total_chunks"], 1);
    }

    #[tokio::test]
    async fn missing_file_is_skipped() {
        let store = Arc::new(MemoryBlobStore::new());
        let output = DocumentTransformer::new(store, Arc::new(ReaderRegistry::builtin()))
            .process("m1", &["merchants/m1/knowledge_base/gone.txt".to_string()])
            .await
            .unwrap();
        assert_eq!(output.document_count, 0);
        assert!(output.artifact.is_none());
        assert_eq!(output.skipped_files.len(), 1);
    }

    #[tokio::test]
    async fn long_text_chunks_with_part_titles() {
        let paragraph = "word ".repeat(1500);
        let text = format!("{paragraph}\n\n{paragraph}\n\n{paragraph}");
        let store = Arc::new(MemoryBlobStore::new());
        store
            .write(
                "merchants/m1/knowledge_base/guide.md",
                text.as_bytes(),
                "text/markdown",
            )
            .await
            .unwrap();

        let output = DocumentTransformer::new(store.clone(), Arc::new(ReaderRegistry::builtin()))
            .process("m1", &["merchants/m1/knowledge_base/guide.md".to_string()])
            .await
            .unwrap();

        let artifact = output.artifact.unwrap();
        assert!(artifact.record_count >= 2);
        let ndjson = String::from_utf8(store.read(&artifact.path).await.unwrap()).unwrap();
        let first: CorpusRecord = serde_json::from_str(ndjson.lines().next().unwrap()).unwrap();
        assert_eq!(first.struct_data["title"], "guide (Part 1)");
        assert_eq!(first.struct_data["chunk_index"], 0);
        assert_eq!(
            first.struct_data["total_chunks"],
            Value::from(artifact.record_count)
        );
    }

    #[test]
    fn chunking_respects_cap() {
        let text = "sentence. ".repeat(3000);
        let chunks = chunk_text(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            // Cap plus one trailing sentence of slack at most.
            assert!(chunk.chars().count() <= CHUNK_CHARS + 20);
        }
    }

    struct StubPdfReader;

    impl DocumentReader for StubPdfReader {
        fn supports(&self, ext: &str) -> bool {
            ext == "pdf"
        }
        fn extract(&self, _bytes: &[u8], _path: &str) -> Result<String, TransformError> {
            Ok("Extracted pdf text.".to_string())
        }
    }

    #[tokio::test]
    async fn injected_reader_extends_support() {
        let store = Arc::new(MemoryBlobStore::new());
        store
            .write(
                "merchants/m1/knowledge_base/brochure.pdf",
                b"%PDF-1.4",
                "application/pdf",
            )
            .await
            .unwrap();
        let readers = Arc::new(ReaderRegistry::builtin().with_document_reader(Box::new(StubPdfReader)));

        let output = DocumentTransformer::new(store, readers)
            .process(
                "m1",
                &["merchants/m1/knowledge_base/brochure.pdf".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(output.document_count, 1);
        assert!(output.skipped_files.is_empty());
    }
}
