//! File classifier — buckets a merchant's uploads into roles.
//!
//! Pure function of the listing: no storage calls, no hidden state. The
//! caller fetches the uploads listing once and classifies it.

use serde::Serialize;

use crate::storage::paths;

/// Extension preference per role, best first.
const EXTENSION_PRIORITY: &[&str] = &[".json", ".csv", ".xlsx", ".xls"];

/// Roles a file can be assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    Products,
    Categories,
    Document,
}

impl FileRole {
    fn keyword(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Categories => "categories",
            Self::Document => "",
        }
    }
}

/// Classified view of one merchant's uploads namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedFileSet {
    /// At most one products file, best extension wins.
    pub products_file: Option<String>,
    /// At most one categories file, best extension wins.
    pub categories_file: Option<String>,
    /// Everything else except role files and placeholder entries.
    pub document_files: Vec<String>,
}

impl ClassifiedFileSet {
    /// Whether nothing classifiable was uploaded.
    pub fn is_empty(&self) -> bool {
        self.products_file.is_none()
            && self.categories_file.is_none()
            && self.document_files.is_empty()
    }
}

/// Pick the role file for `role`: first extension in priority order that
/// has a match, regardless of listing order.
fn select_role_file(listing: &[String], role: FileRole) -> Option<String> {
    let keyword = role.keyword();
    for ext in EXTENSION_PRIORITY {
        let wanted = format!("{keyword}{ext}");
        if let Some(found) = listing
            .iter()
            .find(|path| paths::basename(path) == wanted)
        {
            return Some(found.clone());
        }
    }
    None
}

/// Whether a basename matches any role keyword at any known extension.
fn is_role_file(name: &str) -> bool {
    for role in [FileRole::Products, FileRole::Categories] {
        for ext in EXTENSION_PRIORITY {
            if name == format!("{}{ext}", role.keyword()) {
                return true;
            }
        }
    }
    false
}

/// Classify a flat listing of object paths under the uploads prefix.
///
/// Deterministic for a given listing; safe to re-run after new uploads.
pub fn classify(listing: &[String]) -> ClassifiedFileSet {
    let products_file = select_role_file(listing, FileRole::Products);
    let categories_file = select_role_file(listing, FileRole::Categories);

    let document_files = listing
        .iter()
        .filter(|path| {
            let name = paths::basename(path);
            !is_role_file(&name) && !name.ends_with(paths::KEEP_MARKER)
        })
        .cloned()
        .collect();

    ClassifiedFileSet {
        products_file,
        categories_file,
        document_files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(names: &[&str]) -> Vec<String> {
        names
            .iter()
            .map(|n| format!("merchants/m1/knowledge_base/{n}"))
            .collect()
    }

    #[test]
    fn extension_priority_json_first() {
        let set = classify(&listing(&["products.xlsx", "products.csv", "products.json"]));
        assert_eq!(
            set.products_file.as_deref(),
            Some("merchants/m1/knowledge_base/products.json")
        );
    }

    #[test]
    fn extension_priority_csv_over_xlsx() {
        let set = classify(&listing(&["products.xlsx", "products.csv"]));
        assert_eq!(
            set.products_file.as_deref(),
            Some("merchants/m1/knowledge_base/products.csv")
        );
    }

    #[test]
    fn role_match_is_case_insensitive() {
        let set = classify(&listing(&["Products.CSV", "CATEGORIES.xlsx"]));
        assert!(set.products_file.is_some());
        assert!(set.categories_file.is_some());
        assert!(set.document_files.is_empty());
    }

    #[test]
    fn remainder_excludes_role_files_and_placeholders() {
        let set = classify(&listing(&[
            "products.csv",
            "categories.csv",
            "faq.pdf",
            "returns.docx",
            ".keep",
        ]));
        assert_eq!(set.document_files.len(), 2);
        assert!(set.document_files.iter().all(|p| !p.ends_with(".keep")));
    }

    #[test]
    fn classification_is_idempotent() {
        let files = listing(&["products.json", "products.csv", "about.txt", ".keep"]);
        let first = classify(&files);
        let second = classify(&files);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_listing_is_empty_set() {
        let set = classify(&[]);
        assert!(set.is_empty());
    }

    #[test]
    fn unrelated_csv_is_a_document() {
        let set = classify(&listing(&["inventory.csv"]));
        assert!(set.products_file.is_none());
        assert_eq!(set.document_files.len(), 1);
    }
}
