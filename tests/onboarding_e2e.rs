//! End-to-end tests for the onboarding pipeline over the REST surface.
//!
//! Each test spins up an Axum server on a random port with in-memory
//! backends, starts a run through the API, and polls status the way a
//! real client would.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use merchant_onboard::api::onboard_routes;
use merchant_onboard::config::OnboardConfig;
use merchant_onboard::context::AppContext;
use merchant_onboard::error::{SearchIndexError, TransformError};
use merchant_onboard::pipeline::{Orchestrator, ProgressTracker, RunDispatcher};
use merchant_onboard::registry::{LibSqlRegistry, MerchantRegistry};
use merchant_onboard::search::{
    CrawlRegistration, DatastoreInfo, DatastoreSpec, DatastoreStatus, ImportMode, ImportReport,
    Provisioner, SearchIndex,
};
use merchant_onboard::storage::{BlobStore, MemoryBlobStore};
use merchant_onboard::transform::ReaderRegistry;
use merchant_onboard::transform::readers::DocumentReader;

/// In-memory search index recording datastores and import calls.
#[derive(Default)]
struct StubIndex {
    datastores: Mutex<HashMap<String, DatastoreInfo>>,
    imports: Mutex<Vec<String>>,
    crawls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SearchIndex for StubIndex {
    async fn get_datastore(&self, id: &str) -> Result<Option<DatastoreInfo>, SearchIndexError> {
        Ok(self.datastores.lock().await.get(id).cloned())
    }

    async fn create_datastore(
        &self,
        spec: &DatastoreSpec,
    ) -> Result<DatastoreInfo, SearchIndexError> {
        let info = DatastoreInfo {
            id: spec.id.clone(),
            display_name: spec.display_name.clone(),
            mode: spec.mode,
            status: DatastoreStatus::Created,
        };
        self.datastores
            .lock()
            .await
            .insert(spec.id.clone(), info.clone());
        Ok(info)
    }

    async fn import_corpus(
        &self,
        _datastore_id: &str,
        artifact_uri: &str,
        _mode: ImportMode,
    ) -> Result<ImportReport, SearchIndexError> {
        self.imports.lock().await.push(artifact_uri.to_string());
        Ok(ImportReport {
            imported: Some(1),
            errors: Vec::new(),
        })
    }

    async fn register_crawl_target(
        &self,
        datastore_id: &str,
        url: &str,
    ) -> Result<CrawlRegistration, SearchIndexError> {
        self.crawls
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

/// Pretend-pdf reader so document conversion has something to extract.
struct StubPdfReader;

impl DocumentReader for StubPdfReader {
    fn supports(&self, ext: &str) -> bool {
        ext == "pdf"
    }

    fn extract(&self, _bytes: &[u8], _path: &str) -> Result<String, TransformError> {
        Ok("Returns are accepted within 30 days of delivery.".to_string())
    }
}

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    blob: Arc<MemoryBlobStore>,
    index: Arc<StubIndex>,
}

impl TestServer {
    async fn start() -> Self {
        let blob = Arc::new(MemoryBlobStore::new());
        let registry = Arc::new(LibSqlRegistry::new_memory().await.unwrap());
        registry.run_migrations().await.unwrap();
        let index = Arc::new(StubIndex::default());
        let tracker = Arc::new(ProgressTracker::new());
        let readers = Arc::new(ReaderRegistry::builtin().with_document_reader(Box::new(StubPdfReader)));

        let orchestrator = Arc::new(Orchestrator::new(
            blob.clone(),
            registry.clone(),
            Provisioner::new(index.clone()),
            tracker.clone(),
            readers,
            "test-bucket",
        ));
        let dispatcher = Arc::new(RunDispatcher::new(orchestrator, tracker.clone()));

        let ctx = AppContext {
            config: Arc::new(OnboardConfig::default()),
            blob: blob.clone(),
            registry: registry as Arc<dyn MerchantRegistry>,
            tracker,
            dispatcher,
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let app = onboard_routes(ctx);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            client: reqwest::Client::new(),
            blob,
            index,
        }
    }

    async fn start_run(&self, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}/api/onboard", self.base_url))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    /// Poll status until the run reaches a terminal overall state.
    async fn wait_for_terminal(&self, merchant_id: &str) -> Value {
        for _ in 0..200 {
            let response = self
                .client
                .get(format!(
                    "{}/api/onboard/status/{merchant_id}",
                    self.base_url
                ))
                .send()
                .await
                .unwrap();
            if response.status().is_success() {
                let body: Value = response.json().await.unwrap();
                let status = body["run"]["status"].as_str().unwrap_or("");
                if status == "completed" || status == "failed" {
                    return body;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run for {merchant_id} never reached a terminal state");
    }
}

fn step<'a>(run: &'a Value, name: &str) -> &'a Value {
    run["steps"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == name)
        .unwrap_or_else(|| panic!("no step named {name}"))
}

#[tokio::test]
async fn full_run_with_products_document_and_shop_url() {
    let server = TestServer::start().await;

    // 3 complete product rows plus 1 missing its price.
    server
        .blob
        .write(
            "merchants/acme/knowledge_base/products.csv",
            b"name,image,link,price\n\
              Runner,https://img/r.png,https://shop/r,59.99\n\
              Walker,https://img/w.png,https://shop/w,49.99\n\
              Sprinter,https://img/s.png,https://shop/s,79.99\n\
              Mystery,https://img/m.png,https://shop/m,\n",
            "text/csv",
        )
        .await
        .unwrap();
    server
        .blob
        .write(
            "merchants/acme/knowledge_base/returns.pdf",
            b"%PDF-1.4 stub",
            "application/pdf",
        )
        .await
        .unwrap();

    let response = server
        .start_run(json!({
            "merchant_id": "acme",
            "user_id": "u1",
            "shop_name": "Acme Shoes",
            "shop_url": "https://acme.example"
        }))
        .await;
    assert_eq!(response.status(), 202);
    let accepted: Value = response.json().await.unwrap();
    assert!(accepted["run_id"].as_str().unwrap().starts_with("acme_"));

    let status = server.wait_for_terminal("acme").await;
    let run = &status["run"];
    assert_eq!(run["status"], "completed");
    assert_eq!(run["percent_complete"], 100);

    assert_eq!(step(run, "process_products")["status"], "completed");
    assert_eq!(
        step(run, "process_products")["message"],
        "Processed 3 products"
    );
    assert_eq!(step(run, "process_categories")["status"], "skipped");
    assert_eq!(step(run, "convert_documents")["status"], "completed");
    assert_eq!(
        step(run, "convert_documents")["message"],
        "Converted 1 documents"
    );
    assert_eq!(step(run, "setup_search_index")["status"], "completed");
    assert_eq!(step(run, "generate_config")["status"], "completed");

    // Ledger view merged into the same response.
    let ledger = &status["ledger"];
    assert_eq!(ledger["onboarding_status"], "completed");
    assert_eq!(ledger["product_count"], 3);
    assert_eq!(ledger["document_count"], 1);

    // Both datastores exist; the crawl target points at the shop.
    let datastores = server.index.datastores.lock().await;
    assert!(datastores.contains_key("acme-website-engine"));
    assert!(datastores.contains_key("acme-docs-engine"));
    drop(datastores);
    assert_eq!(
        server.index.crawls.lock().await.as_slice(),
        [(
            "acme-website-engine".to_string(),
            "https://acme.example".to_string()
        )]
    );

    // Corpus artifacts were imported into the documents datastore.
    let imports = server.index.imports.lock().await;
    assert!(
        imports
            .iter()
            .any(|u| u == "blob://test-bucket/merchants/acme/training_files/products.ndjson")
    );
    assert!(
        imports
            .iter()
            .any(|u| u == "blob://test-bucket/merchants/acme/training_files/documents.ndjson")
    );
    drop(imports);

    // The curated products artifact excludes the row missing a price.
    let curated = server
        .blob
        .read("merchants/acme/prompt-docs/products.json")
        .await
        .unwrap();
    let curated: Value = serde_json::from_slice(&curated).unwrap();
    assert_eq!(curated.as_array().unwrap().len(), 3);

    let config = server
        .blob
        .read("merchants/acme/merchant_config.json")
        .await
        .unwrap();
    let config: Value = serde_json::from_slice(&config).unwrap();
    assert_eq!(config["shop_name"], "Acme Shoes");
    assert_eq!(
        config["search_index"]["website_datastore_id"],
        "acme-website-engine"
    );
    assert_eq!(
        config["search_index"]["documents_datastore_id"],
        "acme-docs-engine"
    );
}

#[tokio::test]
async fn empty_uploads_and_no_url_completes_with_skips() {
    let server = TestServer::start().await;

    let response = server
        .start_run(json!({
            "merchant_id": "bare",
            "user_id": "u1",
            "shop_name": "Bare Shop"
        }))
        .await;
    assert_eq!(response.status(), 202);

    let status = server.wait_for_terminal("bare").await;
    let run = &status["run"];
    assert_eq!(run["status"], "completed");
    assert_eq!(run["percent_complete"], 100);
    assert_eq!(step(run, "process_products")["status"], "skipped");
    assert_eq!(step(run, "process_categories")["status"], "skipped");
    assert_eq!(step(run, "convert_documents")["status"], "skipped");

    // Only the document-import datastore, no website crawling.
    let datastores = server.index.datastores.lock().await;
    assert!(datastores.contains_key("bare-docs-engine"));
    assert!(!datastores.contains_key("bare-website-engine"));
    drop(datastores);
    assert!(server.index.crawls.lock().await.is_empty());
    assert!(server.index.imports.lock().await.is_empty());
}

#[tokio::test]
async fn fatal_products_failure_short_circuits_later_steps() {
    let server = TestServer::start().await;
    server
        .blob
        .write(
            "merchants/broken/knowledge_base/products.json",
            b"this is not json",
            "application/json",
        )
        .await
        .unwrap();

    server
        .start_run(json!({
            "merchant_id": "broken",
            "user_id": "u1",
            "shop_name": "Broken"
        }))
        .await;

    let status = server.wait_for_terminal("broken").await;
    let run = &status["run"];
    assert_eq!(run["status"], "failed");
    assert_eq!(step(run, "process_products")["status"], "failed");
    assert_eq!(step(run, "setup_search_index")["status"], "pending");
    assert_eq!(step(run, "generate_config")["status"], "pending");
    assert_eq!(step(run, "finalize")["status"], "pending");

    assert!(server.index.datastores.lock().await.is_empty());
    assert_eq!(status["ledger"]["onboarding_status"], "failed");
    assert!(status["ledger"]["last_error"].is_string());
}

#[tokio::test]
async fn status_is_404_only_when_nothing_exists() {
    let server = TestServer::start().await;
    let response = server
        .client
        .get(format!("{}/api/onboard/status/ghost", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn merchant_read_is_ownership_checked() {
    let server = TestServer::start().await;
    server
        .start_run(json!({
            "merchant_id": "owned",
            "user_id": "alice",
            "shop_name": "Owned"
        }))
        .await;
    server.wait_for_terminal("owned").await;

    let owner = server
        .client
        .get(format!(
            "{}/api/merchants/owned?user_id=alice",
            server.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(owner.status(), 200);
    let record: Value = owner.json().await.unwrap();
    assert_eq!(record["merchant_id"], "owned");

    let stranger = server
        .client
        .get(format!(
            "{}/api/merchants/owned?user_id=mallory",
            server.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(stranger.status(), 404);
}

#[tokio::test]
async fn upload_url_validates_folder() {
    let server = TestServer::start().await;

    let ok = server
        .client
        .post(format!("{}/api/files/upload-url", server.base_url))
        .json(&json!({
            "merchant_id": "m1",
            "folder": "knowledge_base",
            "filename": "products.csv",
            "content_type": "text/csv"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), 200);
    let body: Value = ok.json().await.unwrap();
    assert_eq!(
        body["object_path"],
        "merchants/m1/knowledge_base/products.csv"
    );
    assert!(body["upload_url"].as_str().unwrap().contains("expires="));

    let bad = server
        .client
        .post(format!("{}/api/files/upload-url", server.base_url))
        .json(&json!({
            "merchant_id": "m1",
            "folder": "secrets",
            "filename": "x.csv"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), 400);
}
