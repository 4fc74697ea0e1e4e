use std::sync::Arc;

use merchant_onboard::api::onboard_routes;
use merchant_onboard::config::OnboardConfig;
use merchant_onboard::context::AppContext;
use merchant_onboard::pipeline::{Orchestrator, ProgressTracker, RunDispatcher};
use merchant_onboard::registry::{LibSqlRegistry, MerchantRegistry};
use merchant_onboard::search::{Provisioner, RestSearchIndex};
use merchant_onboard::storage::{BlobStore, LocalBlobStore};
use merchant_onboard::transform::ReaderRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Arc::new(OnboardConfig::from_env());

    eprintln!("Merchant Onboard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Bucket: {}", config.bucket_name);
    eprintln!("   Blob root: {}", config.blob_root);
    eprintln!("   Search endpoint: {}", config.search_endpoint);
    eprintln!("   API: http://0.0.0.0:{}/api/onboard", config.port);

    // ── Storage ─────────────────────────────────────────────────────────
    let blob: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(
        &config.blob_root,
        config.public_base_url.clone(),
    )?);

    // ── Registry ────────────────────────────────────────────────────────
    let registry: Arc<dyn MerchantRegistry> = Arc::new(
        LibSqlRegistry::new_local(std::path::Path::new(&config.registry_db_path)).await?,
    );
    eprintln!("   Registry: {}", config.registry_db_path);

    // ── Search index ────────────────────────────────────────────────────
    let index = Arc::new(RestSearchIndex::new(
        config.search_endpoint.clone(),
        config.search_api_token.clone(),
        config.search_timeout,
    )?);

    // ── Pipeline ────────────────────────────────────────────────────────
    let tracker = Arc::new(ProgressTracker::new());
    let readers = Arc::new(ReaderRegistry::builtin());
    let orchestrator = Arc::new(Orchestrator::new(
        blob.clone(),
        registry.clone(),
        Provisioner::new(index),
        tracker.clone(),
        readers,
        config.bucket_name.clone(),
    ));
    let dispatcher = Arc::new(RunDispatcher::new(orchestrator, tracker.clone()));

    let ctx = AppContext {
        config: config.clone(),
        blob,
        registry,
        tracker,
        dispatcher,
    };

    let app = onboard_routes(ctx);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Onboarding server started");
    axum::serve(listener, app).await?;

    Ok(())
}
