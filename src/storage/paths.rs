//! Merchant namespace layout — path conventions shared by every stage.
//!
//! Downstream consumers (the chat agent, the search importer) locate
//! artifacts by these fixed paths, so they are derived here and nowhere
//! else.

/// Folders provisioned for each merchant. Uploads land in
/// `knowledge_base`; transform outputs go to `training_files` (corpus)
/// and `prompt-docs` (curated); `brand-images` holds logo uploads.
pub const MERCHANT_FOLDERS: &[&str] = &[
    "knowledge_base",
    "prompt-docs",
    "training_files",
    "brand-images",
];

/// Placeholder object written so empty folders are listable.
pub const KEEP_MARKER: &str = ".keep";

/// Prefix under which a merchant's uploaded files live.
pub fn uploads_prefix(merchant_id: &str) -> String {
    format!("merchants/{merchant_id}/knowledge_base/")
}

/// Curated products artifact (small, agent-facing).
pub fn curated_products_path(merchant_id: &str) -> String {
    format!("merchants/{merchant_id}/prompt-docs/products.json")
}

/// Bulk products corpus artifact.
pub fn products_corpus_path(merchant_id: &str) -> String {
    format!("merchants/{merchant_id}/training_files/products.ndjson")
}

/// Bulk categories corpus artifact.
pub fn categories_corpus_path(merchant_id: &str) -> String {
    format!("merchants/{merchant_id}/training_files/categories.ndjson")
}

/// Bulk documents corpus artifact.
pub fn documents_corpus_path(merchant_id: &str) -> String {
    format!("merchants/{merchant_id}/training_files/documents.ndjson")
}

/// Fixed, well-known path of the merchant configuration document.
pub fn config_path(merchant_id: &str) -> String {
    format!("merchants/{merchant_id}/merchant_config.json")
}

/// Folder marker path (`merchants/{id}/{folder}/.keep`).
pub fn folder_marker(merchant_id: &str, folder: &str) -> String {
    format!("merchants/{merchant_id}/{folder}/{KEEP_MARKER}")
}

/// Artifact URI handed to the search index importer.
pub fn artifact_uri(bucket: &str, path: &str) -> String {
    format!("blob://{bucket}/{path}")
}

/// Lowercased basename of an object path.
pub fn basename(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_merchant_scoped() {
        assert_eq!(uploads_prefix("m1"), "merchants/m1/knowledge_base/");
        assert_eq!(config_path("m1"), "merchants/m1/merchant_config.json");
        assert_eq!(
            products_corpus_path("m1"),
            "merchants/m1/training_files/products.ndjson"
        );
        assert_eq!(
            curated_products_path("m1"),
            "merchants/m1/prompt-docs/products.json"
        );
    }

    #[test]
    fn basename_lowercases() {
        assert_eq!(basename("merchants/m1/knowledge_base/Products.CSV"), "products.csv");
        assert_eq!(basename("plain.txt"), "plain.txt");
    }

    #[test]
    fn artifact_uri_format() {
        assert_eq!(
            artifact_uri("bkt", "merchants/m1/training_files/products.ndjson"),
            "blob://bkt/merchants/m1/training_files/products.ndjson"
        );
    }
}
