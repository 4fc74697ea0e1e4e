//! Application context — explicit dependency injection for the service.

use std::sync::Arc;

use crate::config::OnboardConfig;
use crate::pipeline::{ProgressTracker, RunDispatcher};
use crate::registry::MerchantRegistry;
use crate::storage::BlobStore;

/// Everything the API layer needs, built once in `main` and cloned into
/// each route handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<OnboardConfig>,
    pub blob: Arc<dyn BlobStore>,
    pub registry: Arc<dyn MerchantRegistry>,
    pub tracker: Arc<ProgressTracker>,
    pub dispatcher: Arc<RunDispatcher>,
}
