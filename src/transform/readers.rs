//! Document reader seam — raw format parsing behind traits.
//!
//! Table readers turn products/categories files into rows; document
//! readers extract plain text from free-form uploads. JSON, CSV, and
//! plain text are built in; richer formats (PDF, DOCX, HTML) come from
//! injected readers. A file with no matching reader is skipped, never a
//! run failure.

use serde_json::{Map, Value};

use crate::error::TransformError;

/// File extension (lowercase, no dot) of a path.
pub fn extension(path: &str) -> String {
    match path.rsplit_once('.') {
        Some((_, ext)) if !ext.contains('/') => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Parses a tabular file into JSON-map rows.
pub trait TableReader: Send + Sync {
    fn supports(&self, ext: &str) -> bool;
    fn rows(&self, bytes: &[u8], path: &str) -> Result<Vec<Map<String, Value>>, TransformError>;
}

/// Extracts plain text from a document file.
pub trait DocumentReader: Send + Sync {
    fn supports(&self, ext: &str) -> bool;
    fn extract(&self, bytes: &[u8], path: &str) -> Result<String, TransformError>;
}

/// JSON table reader — expects a top-level array of objects.
pub struct JsonTableReader;

impl TableReader for JsonTableReader {
    fn supports(&self, ext: &str) -> bool {
        ext == "json"
    }

    fn rows(&self, bytes: &[u8], path: &str) -> Result<Vec<Map<String, Value>>, TransformError> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| TransformError::Parse {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let Value::Array(items) = value else {
            return Err(TransformError::Parse {
                path: path.to_string(),
                reason: "expected a top-level JSON array".to_string(),
            });
        };
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Object(map) => rows.push(map),
                other => {
                    return Err(TransformError::Parse {
                        path: path.to_string(),
                        reason: format!("expected object rows, found {other}"),
                    });
                }
            }
        }
        Ok(rows)
    }
}

/// CSV table reader — first row is the header.
pub struct CsvTableReader;

impl TableReader for CsvTableReader {
    fn supports(&self, ext: &str) -> bool {
        ext == "csv"
    }

    fn rows(&self, bytes: &[u8], path: &str) -> Result<Vec<Map<String, Value>>, TransformError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(bytes);
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| TransformError::Parse {
                path: path.to_string(),
                reason: e.to_string(),
            })?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| TransformError::Parse {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
            let mut row = Map::new();
            for (header, field) in headers.iter().zip(record.iter()) {
                let field = field.trim();
                if !field.is_empty() {
                    row.insert(header.clone(), Value::String(field.to_string()));
                }
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Plain text document reader.
pub struct PlainTextReader;

impl DocumentReader for PlainTextReader {
    fn supports(&self, ext: &str) -> bool {
        matches!(ext, "txt" | "md" | "text")
    }

    fn extract(&self, bytes: &[u8], _path: &str) -> Result<String, TransformError> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// All registered readers; the transform stage's single lookup point.
pub struct ReaderRegistry {
    tables: Vec<Box<dyn TableReader>>,
    documents: Vec<Box<dyn DocumentReader>>,
}

impl ReaderRegistry {
    /// Registry with the built-in readers only.
    pub fn builtin() -> Self {
        Self {
            tables: vec![Box::new(JsonTableReader), Box::new(CsvTableReader)],
            documents: vec![Box::new(PlainTextReader)],
        }
    }

    /// Register an additional table reader. First supporting reader
    /// wins; built-ins are checked before added ones.
    pub fn with_table_reader(mut self, reader: Box<dyn TableReader>) -> Self {
        self.tables.push(reader);
        self
    }

    pub fn with_document_reader(mut self, reader: Box<dyn DocumentReader>) -> Self {
        self.documents.push(reader);
        self
    }

    /// Parse a tabular file, erroring when no reader supports it.
    pub fn table_rows(
        &self,
        bytes: &[u8],
        path: &str,
    ) -> Result<Vec<Map<String, Value>>, TransformError> {
        let ext = extension(path);
        self.tables
            .iter()
            .find(|r| r.supports(&ext))
            .ok_or_else(|| TransformError::UnsupportedFileType(path.to_string()))?
            .rows(bytes, path)
    }

    /// Extract document text, or `NoReader` when the format is unknown.
    pub fn document_text(&self, bytes: &[u8], path: &str) -> Result<String, TransformError> {
        let ext = extension(path);
        self.documents
            .iter()
            .find(|r| r.supports(&ext))
            .ok_or_else(|| TransformError::NoReader(path.to_string()))?
            .extract(bytes, path)
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_extraction() {
        assert_eq!(extension("a/b/products.CSV"), "csv");
        assert_eq!(extension("no_extension"), "");
        assert_eq!(extension("a.tar.gz"), "gz");
    }

    #[test]
    fn json_reader_parses_object_array() {
        let rows = JsonTableReader
            .rows(br#"[{"name":"A","price":9.5},{"name":"B"}]"#, "products.json")
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "A");
        assert_eq!(rows[0]["price"], 9.5);
    }

    #[test]
    fn json_reader_rejects_non_array() {
        assert!(
            JsonTableReader
                .rows(br#"{"name":"A"}"#, "products.json")
                .is_err()
        );
    }

    #[test]
    fn csv_reader_uses_headers_and_drops_empty_fields() {
        let data = b"name,price,notes\nWidget,9.50,\nGadget,12.00,useful\n";
        let rows = CsvTableReader.rows(data, "products.csv").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "Widget");
        assert!(!rows[0].contains_key("notes"));
        assert_eq!(rows[1]["notes"], "useful");
    }

    #[test]
    fn registry_routes_by_extension() {
        let registry = ReaderRegistry::builtin();
        assert!(registry.table_rows(b"[]", "products.json").is_ok());
        assert!(registry.table_rows(b"x", "products.xlsx").is_err());
        assert_eq!(
            registry.document_text(b"hello", "readme.txt").unwrap(),
            "hello"
        );
        assert!(matches!(
            registry.document_text(b"%PDF", "guide.pdf"),
            Err(TransformError::NoReader(_))
        ));
    }
}
