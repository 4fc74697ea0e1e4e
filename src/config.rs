//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

/// Service configuration, populated from the environment in `main`.
#[derive(Debug, Clone)]
pub struct OnboardConfig {
    /// Logical bucket name embedded in artifact URIs and config documents.
    pub bucket_name: String,
    /// Root directory for the local blob store backend.
    pub blob_root: String,
    /// Public base URL used when issuing signed upload URLs.
    pub public_base_url: String,
    /// Search index service endpoint.
    pub search_endpoint: String,
    /// API token for the search index service.
    pub search_api_token: SecretString,
    /// Path to the merchant registry database file.
    pub registry_db_path: String,
    /// HTTP bind port.
    pub port: u16,
    /// Signed upload URL time-to-live.
    pub upload_url_ttl: Duration,
    /// Per-call timeout for search index operations (provisioning and
    /// imports are long-running on the provider side).
    pub search_timeout: Duration,
}

impl Default for OnboardConfig {
    fn default() -> Self {
        Self {
            bucket_name: "merchant-assets".to_string(),
            blob_root: "./data/blobs".to_string(),
            public_base_url: "http://localhost:8080".to_string(),
            search_endpoint: "http://localhost:9200".to_string(),
            search_api_token: SecretString::from(String::new()),
            registry_db_path: "./data/merchants.db".to_string(),
            port: 8080,
            upload_url_ttl: Duration::from_secs(3600),
            search_timeout: Duration::from_secs(1800), // 30 minutes
        }
    }
}

impl OnboardConfig {
    /// Build a config from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bucket_name: env_or("ONBOARD_BUCKET_NAME", &defaults.bucket_name),
            blob_root: env_or("ONBOARD_BLOB_ROOT", &defaults.blob_root),
            public_base_url: env_or("ONBOARD_PUBLIC_BASE_URL", &defaults.public_base_url),
            search_endpoint: env_or("ONBOARD_SEARCH_ENDPOINT", &defaults.search_endpoint),
            search_api_token: SecretString::from(
                std::env::var("ONBOARD_SEARCH_API_TOKEN").unwrap_or_default(),
            ),
            registry_db_path: env_or("ONBOARD_DB_PATH", &defaults.registry_db_path),
            port: std::env::var("ONBOARD_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            upload_url_ttl: std::env::var("ONBOARD_UPLOAD_URL_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.upload_url_ttl),
            search_timeout: std::env::var("ONBOARD_SEARCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.search_timeout),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = OnboardConfig::default();
        assert_eq!(config.port, 8080);
        assert!(config.upload_url_ttl >= Duration::from_secs(60));
        assert!(config.search_timeout >= Duration::from_secs(600));
    }
}
