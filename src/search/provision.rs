//! Provisioning stage — ensure the merchant's datastores exist.
//!
//! Two datastores per merchant at most: a website-crawl datastore (only
//! when a shop URL is given) and a document-import datastore (always).
//! "Ensure" means lookup first, create on absence, and tolerate the
//! already-exists race between the two.

use std::sync::Arc;

use tracing::info;

use crate::error::SearchIndexError;
use crate::search::types::{
    CrawlRegistration, DatastoreInfo, DatastoreMode, DatastoreSpec, SearchIndex,
    documents_datastore_id, website_datastore_id,
};

/// Datastores provisioned for one merchant.
#[derive(Debug, Clone)]
pub struct ProvisionOutcome {
    /// Website-crawl datastore, present only when a shop URL was given.
    pub website: Option<DatastoreInfo>,
    /// Document-import datastore; corpus artifacts go here.
    pub documents: DatastoreInfo,
    /// Crawl registration result, when a website datastore was set up.
    pub crawl: Option<CrawlRegistration>,
}

/// Ensures datastores exist and wires up crawling.
pub struct Provisioner {
    index: Arc<dyn SearchIndex>,
}

impl Provisioner {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    /// Ensure a single datastore exists: lookup, create on absence, and
    /// re-read if creation races with another creator.
    pub async fn ensure_datastore(
        &self,
        spec: DatastoreSpec,
    ) -> Result<DatastoreInfo, SearchIndexError> {
        if let Some(existing) = self.index.get_datastore(&spec.id).await? {
            if existing.mode != spec.mode {
                return Err(SearchIndexError::ModeMismatch {
                    id: spec.id,
                    actual: existing.mode.to_string(),
                    required: spec.mode.to_string(),
                });
            }
            info!(id = %spec.id, "Datastore already exists");
            return Ok(existing);
        }

        match self.index.create_datastore(&spec).await {
            Ok(info) => {
                info!(id = %info.id, mode = %info.mode, "Created datastore");
                Ok(info)
            }
            Err(SearchIndexError::AlreadyExists { id }) => self
                .index
                .get_datastore(&id)
                .await?
                .ok_or(SearchIndexError::AlreadyExists { id }),
            Err(e) => Err(e),
        }
    }

    /// Provision everything a merchant needs: documents datastore always,
    /// website datastore plus crawl registration when a URL is given.
    pub async fn provision(
        &self,
        merchant_id: &str,
        shop_name: &str,
        shop_url: Option<&str>,
    ) -> Result<ProvisionOutcome, SearchIndexError> {
        let mut website = None;
        let mut crawl = None;

        if let Some(url) = shop_url {
            let site = self
                .ensure_datastore(DatastoreSpec {
                    id: website_datastore_id(merchant_id),
                    display_name: format!("{shop_name} - Website"),
                    mode: DatastoreMode::WebsiteCrawl,
                })
                .await?;
            crawl = Some(self.index.register_crawl_target(&site.id, url).await?);
            website = Some(site);
        }

        let documents = self
            .ensure_datastore(DatastoreSpec {
                id: documents_datastore_id(merchant_id),
                display_name: format!("{shop_name} - Documents"),
                mode: DatastoreMode::DocumentImport,
            })
            .await?;

        Ok(ProvisionOutcome {
            website,
            documents,
            crawl,
        })
    }

    pub fn index(&self) -> &Arc<dyn SearchIndex> {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::types::{DatastoreStatus, ImportMode, ImportReport};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// Minimal in-memory search index for provisioning tests.
    #[derive(Default)]
    struct FakeIndex {
        datastores: Mutex<HashMap<String, DatastoreInfo>>,
        crawl_targets: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SearchIndex for FakeIndex {
        async fn get_datastore(
            &self,
            id: &str,
        ) -> Result<Option<DatastoreInfo>, SearchIndexError> {
            Ok(self.datastores.lock().await.get(id).cloned())
        }

        async fn create_datastore(
            &self,
            spec: &DatastoreSpec,
        ) -> Result<DatastoreInfo, SearchIndexError> {
            let mut stores = self.datastores.lock().await;
            if stores.contains_key(&spec.id) {
                return Err(SearchIndexError::AlreadyExists {
                    id: spec.id.clone(),
                });
            }
            let info = DatastoreInfo {
                id: spec.id.clone(),
                display_name: spec.display_name.clone(),
                mode: spec.mode,
                status: DatastoreStatus::Created,
            };
            stores.insert(spec.id.clone(), info.clone());
            Ok(info)
        }

        async fn import_corpus(
            &self,
            _datastore_id: &str,
            _artifact_uri: &str,
            _mode: ImportMode,
        ) -> Result<ImportReport, SearchIndexError> {
            Ok(ImportReport::default())
        }

        async fn register_crawl_target(
            &self,
            datastore_id: &str,
            url: &str,
        ) -> Result<CrawlRegistration, SearchIndexError> {
            self.crawl_targets
                .lock()
                .await
                .push((datastore_id.to_string(), url.to_string()));
            Ok(CrawlRegistration {
                datastore_id: datastore_id.to_string(),
                url: url.to_string(),
                status: "registered".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn provisions_both_datastores_with_url() {
        let provisioner = Provisioner::new(Arc::new(FakeIndex::default()));
        let outcome = provisioner
            .provision("m1", "Acme", Some("https://acme.example"))
            .await
            .unwrap();

        let website = outcome.website.unwrap();
        assert_eq!(website.id, "m1-website-engine");
        assert_eq!(website.mode, DatastoreMode::WebsiteCrawl);
        assert_eq!(outcome.documents.id, "m1-docs-engine");
        assert_eq!(outcome.documents.mode, DatastoreMode::DocumentImport);
        assert_eq!(outcome.crawl.unwrap().status, "registered");
    }

    #[tokio::test]
    async fn no_url_means_documents_only() {
        let provisioner = Provisioner::new(Arc::new(FakeIndex::default()));
        let outcome = provisioner.provision("m1", "Acme", None).await.unwrap();
        assert!(outcome.website.is_none());
        assert!(outcome.crawl.is_none());
        assert_eq!(outcome.documents.id, "m1-docs-engine");
    }

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let index = Arc::new(FakeIndex::default());
        let provisioner = Provisioner::new(index.clone());

        let first = provisioner.provision("m1", "Acme", None).await.unwrap();
        assert_eq!(first.documents.status, DatastoreStatus::Created);

        let second = provisioner.provision("m1", "Acme", None).await.unwrap();
        // Second time around the datastore is found, not re-created.
        assert_eq!(second.documents.status, DatastoreStatus::Created);
        assert_eq!(index.datastores.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn mode_mismatch_is_rejected() {
        let index = Arc::new(FakeIndex::default());
        index.datastores.lock().await.insert(
            "m1-docs-engine".to_string(),
            DatastoreInfo {
                id: "m1-docs-engine".to_string(),
                display_name: "wrong".to_string(),
                mode: DatastoreMode::WebsiteCrawl,
                status: DatastoreStatus::Exists,
            },
        );
        let provisioner = Provisioner::new(index);
        let err = provisioner.provision("m1", "Acme", None).await.unwrap_err();
        assert!(matches!(err, SearchIndexError::ModeMismatch { .. }));
    }
}
