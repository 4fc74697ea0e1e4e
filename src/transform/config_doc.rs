//! Merchant configuration artifact.
//!
//! The runtime assistant reads one JSON document per merchant from a
//! fixed path. Generation merges over any existing document so a rerun
//! with partial profile data never erases earlier saves.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::TransformError;
use crate::search;
use crate::storage::{BlobStore, paths};

const DEFAULT_BOT_NAME: &str = "AI Assistant";
const DEFAULT_PRIMARY_COLOR: &str = "#667eea";
const DEFAULT_SECONDARY_COLOR: &str = "#764ba2";

/// Pointer to the curated products artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductsRef {
    pub bucket_name: String,
    pub file_path: String,
}

/// Pointer to the merchant's search datastores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchIndexRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_datastore_id: Option<String>,
    pub documents_datastore_id: String,
}

/// The full configuration document, as written to the blob store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MerchantConfig {
    pub merchant_id: String,
    pub user_id: String,
    pub shop_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shop_url: Option<String>,
    pub bot_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_customer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_questions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_products: Option<String>,
    pub primary_color: String,
    pub secondary_color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub products: ProductsRef,
    pub search_index: SearchIndexRef,
}

/// Profile fields a merchant can supply at onboarding time. All
/// optional; missing values fall back to defaults or earlier saves.
#[derive(Debug, Clone, Default)]
pub struct ConfigProfile {
    pub shop_url: Option<String>,
    pub bot_name: Option<String>,
    pub target_customer: Option<String>,
    pub top_questions: Option<String>,
    pub top_products: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub logo_url: Option<String>,
}

/// What config generation produced.
#[derive(Debug, Clone)]
pub struct ConfigOutput {
    pub config_path: String,
    pub config: MerchantConfig,
}

/// Builds and persists the merchant configuration document.
pub struct ConfigGenerator {
    blob: Arc<dyn BlobStore>,
    bucket_name: String,
}

/// Shallow merge: keys in `overrides` win, everything else in `base`
/// survives untouched. Nested objects are replaced wholesale.
fn merge_shallow(base: Map<String, Value>, overrides: Map<String, Value>) -> Map<String, Value> {
    let mut merged = base;
    for (key, value) in overrides {
        merged.insert(key, value);
    }
    merged
}

impl ConfigGenerator {
    pub fn new(blob: Arc<dyn BlobStore>, bucket_name: impl Into<String>) -> Self {
        Self {
            blob,
            bucket_name: bucket_name.into(),
        }
    }

    /// Generate the config document and write it to the well-known path.
    ///
    /// An existing document at that path is read first and the fresh
    /// values merged over it, so fields saved by a previous run whose
    /// inputs were omitted this time are preserved.
    pub async fn generate(
        &self,
        merchant_id: &str,
        user_id: &str,
        shop_name: &str,
        profile: &ConfigProfile,
        has_website_datastore: bool,
    ) -> Result<ConfigOutput, TransformError> {
        let fresh = MerchantConfig {
            merchant_id: merchant_id.to_string(),
            user_id: user_id.to_string(),
            shop_name: shop_name.to_string(),
            shop_url: profile.shop_url.clone(),
            bot_name: profile
                .bot_name
                .clone()
                .unwrap_or_else(|| DEFAULT_BOT_NAME.to_string()),
            target_customer: profile.target_customer.clone(),
            top_questions: profile.top_questions.clone(),
            top_products: profile.top_products.clone(),
            primary_color: profile
                .primary_color
                .clone()
                .unwrap_or_else(|| DEFAULT_PRIMARY_COLOR.to_string()),
            secondary_color: profile
                .secondary_color
                .clone()
                .unwrap_or_else(|| DEFAULT_SECONDARY_COLOR.to_string()),
            logo_url: profile.logo_url.clone(),
            products: ProductsRef {
                bucket_name: self.bucket_name.clone(),
                file_path: paths::curated_products_path(merchant_id),
            },
            search_index: SearchIndexRef {
                website_datastore_id: has_website_datastore
                    .then(|| search::website_datastore_id(merchant_id)),
                documents_datastore_id: search::documents_datastore_id(merchant_id),
            },
        };

        let config_path = paths::config_path(merchant_id);
        let merged = match self.read_existing(&config_path).await? {
            Some(existing) => {
                let mut overrides = to_object(serde_json::to_value(&fresh)?);
                // A default only fills a gap; it never replaces a value
                // saved by an earlier run.
                for (key, supplied) in [
                    ("bot_name", profile.bot_name.is_some()),
                    ("primary_color", profile.primary_color.is_some()),
                    ("secondary_color", profile.secondary_color.is_some()),
                ] {
                    if !supplied && existing.contains_key(key) {
                        overrides.remove(key);
                    }
                }
                let value = Value::Object(merge_shallow(existing, overrides));
                serde_json::from_value(value)?
            }
            None => fresh,
        };

        self.blob
            .write(
                &config_path,
                serde_json::to_string_pretty(&merged)?.as_bytes(),
                "application/json",
            )
            .await?;

        info!(merchant_id, config_path, "Wrote merchant config");

        Ok(ConfigOutput {
            config_path,
            config: merged,
        })
    }

    async fn read_existing(
        &self,
        config_path: &str,
    ) -> Result<Option<Map<String, Value>>, TransformError> {
        if !self.blob.exists(config_path).await? {
            return Ok(None);
        }
        let bytes = self.blob.read(config_path).await?;
        // A corrupt earlier document is discarded rather than blocking
        // regeneration.
        Ok(serde_json::from_slice::<Value>(&bytes)
            .ok()
            .map(to_object))
    }
}

fn to_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
