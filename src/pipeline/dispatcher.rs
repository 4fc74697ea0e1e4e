//! Background run dispatcher — fire-and-forget onboarding runs.
//!
//! The HTTP start endpoint must return immediately, so the dispatcher
//! registers the run with the tracker first (making the run id and the
//! already-running gate synchronous) and then hands the actual work to
//! a spawned task.

use std::sync::Arc;

use tracing::info;

use crate::error::{Error, OnboardError};
use crate::pipeline::orchestrator::{OnboardRequest, Orchestrator};
use crate::pipeline::progress::ProgressTracker;

pub struct RunDispatcher {
    orchestrator: Arc<Orchestrator>,
    tracker: Arc<ProgressTracker>,
}

impl RunDispatcher {
    pub fn new(orchestrator: Arc<Orchestrator>, tracker: Arc<ProgressTracker>) -> Self {
        Self {
            orchestrator,
            tracker,
        }
    }

    /// Start a run in the background. Returns the run id once the run
    /// is registered; `AlreadyRunning` if one is in flight for this
    /// merchant.
    pub async fn dispatch(&self, request: OnboardRequest) -> Result<String, Error> {
        let merchant_id = request.merchant_id.clone();
        if self.tracker.is_running(&merchant_id).await {
            return Err(OnboardError::AlreadyRunning(merchant_id).into());
        }

        let run_id = self.tracker.start(&merchant_id, &request.user_id).await;
        info!(merchant_id, run_id, "Dispatching onboarding run");

        let orchestrator = self.orchestrator.clone();
        let task_run_id = run_id.clone();
        tokio::spawn(async move {
            let run = orchestrator.execute(request, task_run_id).await;
            info!(
                merchant_id = %run.merchant_id,
                run_id = %run.run_id,
                status = %run.status,
                "Background onboarding run finished"
            );
        });

        Ok(run_id)
    }

    /// Whether the merchant's run has ended. A failed overall status is
    /// not enough: a non-fatal step failure pins the status at failed
    /// while the run keeps executing.
    pub async fn is_finished(&self, merchant_id: &str) -> bool {
        self.tracker.has_finished(merchant_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{LibSqlRegistry, MerchantFields, MerchantRegistry};
    use crate::search::{
        CrawlRegistration, DatastoreInfo, DatastoreSpec, DatastoreStatus, ImportMode, ImportReport,
        Provisioner, SearchIndex,
    };
    use crate::storage::MemoryBlobStore;
    use crate::transform::ReaderRegistry;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Index that stalls on first contact, to hold a run in flight.
    struct NullIndex {
        delay: Duration,
    }

    #[async_trait]
    impl SearchIndex for NullIndex {
        async fn get_datastore(
            &self,
            _id: &str,
        ) -> Result<Option<DatastoreInfo>, crate::error::SearchIndexError> {
            tokio::time::sleep(self.delay).await;
            Ok(None)
        }

        async fn create_datastore(
            &self,
            spec: &DatastoreSpec,
        ) -> Result<DatastoreInfo, crate::error::SearchIndexError> {
            Ok(DatastoreInfo {
                id: spec.id.clone(),
                display_name: spec.display_name.clone(),
                mode: spec.mode,
                status: DatastoreStatus::Created,
            })
        }

        async fn import_corpus(
            &self,
            _datastore_id: &str,
            _artifact_uri: &str,
            _mode: ImportMode,
        ) -> Result<ImportReport, crate::error::SearchIndexError> {
            Ok(ImportReport::default())
        }

        async fn register_crawl_target(
            &self,
            datastore_id: &str,
            url: &str,
        ) -> Result<CrawlRegistration, crate::error::SearchIndexError> {
            Ok(CrawlRegistration {
                datastore_id: datastore_id.to_string(),
                url: url.to_string(),
                status: "registered".to_string(),
            })
        }
    }

    async fn dispatcher(index_delay: Duration) -> RunDispatcher {
        let registry = Arc::new(LibSqlRegistry::new_memory().await.unwrap());
        registry.run_migrations().await.unwrap();
        let tracker = Arc::new(ProgressTracker::new());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(MemoryBlobStore::new()),
            registry,
            Provisioner::new(Arc::new(NullIndex { delay: index_delay })),
            tracker.clone(),
            Arc::new(ReaderRegistry::builtin()),
            "test-bucket",
        ));
        RunDispatcher::new(orchestrator, tracker.clone())
    }

    fn request(merchant_id: &str) -> OnboardRequest {
        OnboardRequest {
            merchant_id: merchant_id.to_string(),
            user_id: "u1".to_string(),
            shop_name: "Acme".to_string(),
            shop_url: None,
            fields: MerchantFields::default(),
        }
    }

    #[tokio::test]
    async fn dispatch_returns_run_id_and_finishes() {
        let dispatcher = dispatcher(Duration::ZERO).await;
        let run_id = dispatcher.dispatch(request("m1")).await.unwrap();
        assert!(run_id.starts_with("m1_"));

        // The run happens in the background; poll until terminal.
        for _ in 0..100 {
            if dispatcher.is_finished("m1").await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("background run never finished");
    }

    #[tokio::test]
    async fn second_dispatch_while_running_is_rejected() {
        // The stalled index keeps the first run in flight.
        let dispatcher = dispatcher(Duration::from_secs(30)).await;
        dispatcher.dispatch(request("m1")).await.unwrap();
        let err = dispatcher.dispatch(request("m1")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Onboard(OnboardError::AlreadyRunning(_))
        ));

        // A different merchant is unaffected.
        dispatcher.dispatch(request("m2")).await.unwrap();
    }
}
