//! REST client for the search index service.
//!
//! Vendor-neutral HTTP surface: datastores are a resource collection,
//! imports and crawl targets are sub-resources. Permission failures are
//! mapped to the distinguished `PermissionDenied` kind so callers never
//! have to string-match provider messages.

use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::SearchIndexError;
use crate::search::types::{
    CrawlRegistration, DatastoreInfo, DatastoreMode, DatastoreSpec, DatastoreStatus, ImportMode,
    ImportReport, SearchIndex,
};

/// HTTP-backed `SearchIndex` implementation.
pub struct RestSearchIndex {
    client: reqwest::Client,
    endpoint: String,
    api_token: SecretString,
}

#[derive(Debug, Deserialize)]
struct WireDatastore {
    id: String,
    display_name: String,
    mode: DatastoreMode,
    status: DatastoreStatus,
}

#[derive(Debug, Deserialize)]
struct WireImport {
    #[serde(default)]
    imported: Option<u64>,
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireCrawl {
    status: String,
}

impl RestSearchIndex {
    /// Build a client. `timeout` bounds each call; provisioning and
    /// import operations are long-running, so pass a generous one.
    pub fn new(
        endpoint: impl Into<String>,
        api_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, SearchIndexError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchIndexError::Request(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.endpoint)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(self.api_token.expose_secret())
    }

    /// Map a non-success response to the structured error taxonomy.
    async fn error_for(&self, response: reqwest::Response) -> SearchIndexError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
                SearchIndexError::PermissionDenied { detail: body }
            }
            _ => SearchIndexError::Request(format!("{status}: {body}")),
        }
    }
}

#[async_trait::async_trait]
impl SearchIndex for RestSearchIndex {
    async fn get_datastore(&self, id: &str) -> Result<Option<DatastoreInfo>, SearchIndexError> {
        let response = self
            .authed(self.client.get(self.url(&format!("/v1/datastores/{id}"))))
            .send()
            .await
            .map_err(|e| SearchIndexError::Request(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(self.error_for(response).await);
        }
        let wire: WireDatastore = response
            .json()
            .await
            .map_err(|e| SearchIndexError::InvalidResponse(e.to_string()))?;
        Ok(Some(DatastoreInfo {
            id: wire.id,
            display_name: wire.display_name,
            mode: wire.mode,
            status: wire.status,
        }))
    }

    async fn create_datastore(
        &self,
        spec: &DatastoreSpec,
    ) -> Result<DatastoreInfo, SearchIndexError> {
        debug!(id = %spec.id, mode = %spec.mode, "Creating datastore");
        let response = self
            .authed(self.client.post(self.url("/v1/datastores")))
            .json(&json!({
                "id": spec.id,
                "display_name": spec.display_name,
                "mode": spec.mode,
            }))
            .send()
            .await
            .map_err(|e| SearchIndexError::Request(e.to_string()))?;

        if response.status() == StatusCode::CONFLICT {
            return Err(SearchIndexError::AlreadyExists {
                id: spec.id.clone(),
            });
        }
        if !response.status().is_success() {
            return Err(self.error_for(response).await);
        }
        let wire: WireDatastore = response
            .json()
            .await
            .map_err(|e| SearchIndexError::InvalidResponse(e.to_string()))?;
        Ok(DatastoreInfo {
            id: wire.id,
            display_name: wire.display_name,
            mode: wire.mode,
            status: wire.status,
        })
    }

    async fn import_corpus(
        &self,
        datastore_id: &str,
        artifact_uri: &str,
        mode: ImportMode,
    ) -> Result<ImportReport, SearchIndexError> {
        debug!(datastore_id, artifact_uri, "Importing corpus artifact");
        let response = self
            .authed(
                self.client
                    .post(self.url(&format!("/v1/datastores/{datastore_id}/imports"))),
            )
            .json(&json!({
                "artifact_uri": artifact_uri,
                "mode": mode,
            }))
            .send()
            .await
            .map_err(|e| SearchIndexError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.error_for(response).await);
        }
        let wire: WireImport = response
            .json()
            .await
            .map_err(|e| SearchIndexError::InvalidResponse(e.to_string()))?;
        Ok(ImportReport {
            imported: wire.imported,
            errors: wire.errors,
        })
    }

    async fn register_crawl_target(
        &self,
        datastore_id: &str,
        url: &str,
    ) -> Result<CrawlRegistration, SearchIndexError> {
        debug!(datastore_id, url, "Registering crawl target");
        let response = self
            .authed(
                self.client
                    .post(self.url(&format!("/v1/datastores/{datastore_id}/crawl-targets"))),
            )
            .json(&json!({ "url": url }))
            .send()
            .await
            .map_err(|e| SearchIndexError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.error_for(response).await);
        }
        let wire: WireCrawl = response
            .json()
            .await
            .map_err(|e| SearchIndexError::InvalidResponse(e.to_string()))?;
        Ok(CrawlRegistration {
            datastore_id: datastore_id.to_string(),
            url: url.to_string(),
            status: wire.status,
        })
    }
}
