//! Onboarding Orchestrator — runs the fixed step sequence for one
//! merchant.
//!
//! Every step failure is converted into a status update at the step
//! boundary, so a polling client always sees a coherent run snapshot.
//! Which failures abort the run and which are merely recorded is the
//! per-step policy encoded in `run_steps`.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::classify::{ClassifiedFileSet, classify};
use crate::error::{Error, OnboardError, TransformError};
use crate::pipeline::progress::{OnboardingRun, ProgressTracker};
use crate::pipeline::step::{OnboardingStep, StepStatus};
use crate::registry::{LedgerStep, MerchantFields, MerchantRegistry, StepUpdate};
use crate::search::{ImportMode, Provisioner};
use crate::storage::{BlobStore, paths};
use crate::transform::{
    CategoryTransformer, ConfigGenerator, ConfigProfile, DocumentTransformer, ProductTransformer,
    ReaderRegistry, TransformArtifact,
};

/// Everything needed to start a run for one merchant.
#[derive(Debug, Clone)]
pub struct OnboardRequest {
    pub merchant_id: String,
    pub user_id: String,
    pub shop_name: String,
    pub shop_url: Option<String>,
    /// Additional profile fields persisted on the merchant row.
    pub fields: MerchantFields,
}

impl OnboardRequest {
    fn ledger_fields(&self) -> MerchantFields {
        let mut fields = self.fields.clone();
        fields.shop_name = Some(self.shop_name.clone());
        if fields.shop_url.is_none() {
            fields.shop_url = self.shop_url.clone();
        }
        fields
    }

    fn config_profile(&self) -> ConfigProfile {
        ConfigProfile {
            shop_url: self.shop_url.clone().or_else(|| self.fields.shop_url.clone()),
            bot_name: self.fields.bot_name.clone(),
            target_customer: self.fields.target_customer.clone(),
            top_questions: self.fields.top_questions.clone(),
            top_products: self.fields.top_products.clone(),
            primary_color: self.fields.primary_color.clone(),
            secondary_color: self.fields.secondary_color.clone(),
            logo_url: self.fields.logo_url.clone(),
        }
    }
}

/// Sequences the onboarding steps and applies the failure policy.
pub struct Orchestrator {
    blob: Arc<dyn BlobStore>,
    registry: Arc<dyn MerchantRegistry>,
    provisioner: Provisioner,
    tracker: Arc<ProgressTracker>,
    readers: Arc<ReaderRegistry>,
    bucket_name: String,
}

impl Orchestrator {
    pub fn new(
        blob: Arc<dyn BlobStore>,
        registry: Arc<dyn MerchantRegistry>,
        provisioner: Provisioner,
        tracker: Arc<ProgressTracker>,
        readers: Arc<ReaderRegistry>,
        bucket_name: impl Into<String>,
    ) -> Self {
        Self {
            blob,
            registry,
            provisioner,
            tracker,
            readers,
            bucket_name: bucket_name.into(),
        }
    }

    /// Run the full step sequence. Returns the final run snapshot;
    /// fatal step failures end up inside the snapshot, not as `Err`.
    /// The only `Err` is the already-running gate, raised before any
    /// state is touched.
    pub async fn run(&self, request: OnboardRequest) -> Result<OnboardingRun, Error> {
        let merchant_id = request.merchant_id.clone();
        if self.tracker.is_running(&merchant_id).await {
            return Err(OnboardError::AlreadyRunning(merchant_id).into());
        }
        let run_id = self.tracker.start(&merchant_id, &request.user_id).await;
        Ok(self.execute(request, run_id).await)
    }

    /// Execute the steps of a run the tracker already knows about.
    /// Used by the dispatcher, which starts the tracker entry itself so
    /// it can hand the run id back before the work happens.
    pub async fn execute(&self, request: OnboardRequest, run_id: String) -> OnboardingRun {
        let merchant_id = request.merchant_id.clone();
        info!(merchant_id, run_id, "Onboarding run started");

        if let Err(fatal) = self.run_steps(&request).await {
            let step = fatal.step();
            let message = fatal.to_string();
            error!(merchant_id, %step, error = %message, "Onboarding run failed");
            // Ledger first, so a client that polls the failed status
            // never reads a ledger that still says pending. An error
            // here can only be logged, the run is already failed.
            if let Err(e) = self
                .registry
                .mark_step(
                    &merchant_id,
                    LedgerStep::Onboarding,
                    false,
                    &StepUpdate {
                        error: Some(message.clone()),
                        ..Default::default()
                    },
                )
                .await
            {
                error!(merchant_id, error = %e, "Failed to record run failure in ledger");
            }
            self.tracker
                .advance(&merchant_id, step, StepStatus::Failed, None, Some(message))
                .await;
        } else {
            info!(merchant_id, run_id, "Onboarding run finished");
        }
        self.tracker.finish(&merchant_id).await;

        // The run was started before execute, so the snapshot exists
        // unless something removed it mid-run.
        match self.tracker.get(&merchant_id).await {
            Some(run) => run,
            None => {
                error!(merchant_id, "Run snapshot vanished mid-run");
                OnboardingRun::vanished(&merchant_id, &request.user_id, run_id)
            }
        }
    }

    /// The fixed sequence. Returns `Err` only for fatal failures.
    async fn run_steps(&self, request: &OnboardRequest) -> Result<(), OnboardError> {
        let merchant_id = &request.merchant_id;
        let mut corpus_artifacts: Vec<TransformArtifact> = Vec::new();

        self.create_merchant_record(request).await?;
        self.create_folders(merchant_id).await?;

        let classified = self.classified_uploads(merchant_id).await?;

        if let Some(artifact) = self.process_products(merchant_id, &classified).await? {
            corpus_artifacts.push(artifact);
        }
        corpus_artifacts.extend(self.process_categories(merchant_id, &classified).await);
        corpus_artifacts.extend(self.convert_documents(merchant_id, &classified).await);

        let has_website = self
            .setup_search_index(request, &corpus_artifacts)
            .await?;
        self.generate_config(request, has_website).await?;
        self.finalize(merchant_id).await?;

        Ok(())
    }

    async fn begin(&self, merchant_id: &str, step: OnboardingStep) {
        self.tracker
            .advance(merchant_id, step, StepStatus::InProgress, None, None)
            .await;
    }

    async fn complete(&self, merchant_id: &str, step: OnboardingStep, message: impl Into<String>) {
        self.tracker
            .advance(
                merchant_id,
                step,
                StepStatus::Completed,
                Some(message.into()),
                None,
            )
            .await;
    }

    async fn skip(&self, merchant_id: &str, step: OnboardingStep, message: impl Into<String>) {
        self.tracker
            .advance(
                merchant_id,
                step,
                StepStatus::Skipped,
                Some(message.into()),
                None,
            )
            .await;
    }

    async fn fail_step(&self, merchant_id: &str, step: OnboardingStep, error: String) {
        self.tracker
            .advance(merchant_id, step, StepStatus::Failed, None, Some(error))
            .await;
    }

    /// Mark a mid-run ledger step; a registry error here is logged and
    /// swallowed so bookkeeping cannot take down an otherwise healthy run.
    async fn mark_ledger(
        &self,
        merchant_id: &str,
        step: LedgerStep,
        completed: bool,
        update: &StepUpdate,
    ) {
        if let Err(e) = self
            .registry
            .mark_step(merchant_id, step, completed, update)
            .await
        {
            warn!(merchant_id, %step, error = %e, "Ledger update failed");
        }
    }

    // Step 1 — fatal.
    async fn create_merchant_record(&self, request: &OnboardRequest) -> Result<(), OnboardError> {
        let merchant_id = &request.merchant_id;
        self.begin(merchant_id, OnboardingStep::CreateMerchantRecord)
            .await;

        self.registry
            .upsert_record(merchant_id, &request.user_id, &request.ledger_fields())
            .await
            .map_err(OnboardError::MerchantRecord)?;

        self.mark_ledger(
            merchant_id,
            LedgerStep::MerchantRecord,
            true,
            &StepUpdate::default(),
        )
        .await;
        self.complete(
            merchant_id,
            OnboardingStep::CreateMerchantRecord,
            "Merchant record saved",
        )
        .await;
        Ok(())
    }

    // Step 2 — fatal, with an already-done short-circuit off the ledger.
    async fn create_folders(&self, merchant_id: &str) -> Result<(), OnboardError> {
        self.begin(merchant_id, OnboardingStep::CreateFolders).await;

        let already_done = match self.registry.get_record(merchant_id, None).await {
            Ok(Some(record)) => record.folders.completed,
            Ok(None) => false,
            Err(e) => {
                warn!(merchant_id, error = %e, "Ledger read failed, creating folders anyway");
                false
            }
        };
        if already_done {
            info!(merchant_id, "Folder structure already exists");
            self.complete(
                merchant_id,
                OnboardingStep::CreateFolders,
                "Folder structure already exists",
            )
            .await;
            return Ok(());
        }

        for folder in paths::MERCHANT_FOLDERS {
            self.blob
                .write(
                    &paths::folder_marker(merchant_id, folder),
                    b"",
                    "application/octet-stream",
                )
                .await
                .map_err(OnboardError::Folders)?;
        }

        self.mark_ledger(merchant_id, LedgerStep::Folders, true, &StepUpdate::default())
            .await;
        self.complete(
            merchant_id,
            OnboardingStep::CreateFolders,
            "Folder structure created",
        )
        .await;
        Ok(())
    }

    /// One listing fetch feeds steps 3–5. A listing failure is fatal at
    /// the products step, the first consumer of the classification, so
    /// that step is moved to in_progress here rather than in
    /// `process_products`.
    async fn classified_uploads(
        &self,
        merchant_id: &str,
    ) -> Result<ClassifiedFileSet, OnboardError> {
        self.begin(merchant_id, OnboardingStep::ProcessProducts)
            .await;
        let listing = self
            .blob
            .list(&paths::uploads_prefix(merchant_id))
            .await
            .map_err(|e| OnboardError::Products(TransformError::Storage(e)))?;
        let classified = classify(&listing);
        info!(
            merchant_id,
            products = classified.products_file.is_some(),
            categories = classified.categories_file.is_some(),
            documents = classified.document_files.len(),
            "Classified uploads"
        );
        Ok(classified)
    }

    // Step 3 — skippable without a file, fatal on transform error.
    // Already in_progress via `classified_uploads`.
    async fn process_products(
        &self,
        merchant_id: &str,
        classified: &ClassifiedFileSet,
    ) -> Result<Option<TransformArtifact>, OnboardError> {
        let Some(products_file) = &classified.products_file else {
            self.skip(
                merchant_id,
                OnboardingStep::ProcessProducts,
                "No products file found",
            )
            .await;
            return Ok(None);
        };

        let output = ProductTransformer::new(self.blob.clone(), self.readers.clone())
            .process(merchant_id, products_file)
            .await
            .map_err(OnboardError::Products)?;

        self.mark_ledger(
            merchant_id,
            LedgerStep::Products,
            true,
            &StepUpdate {
                counts: crate::registry::StepCounts {
                    product_count: Some(output.product_count as i64),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .await;
        self.complete(
            merchant_id,
            OnboardingStep::ProcessProducts,
            format!("Processed {} products", output.product_count),
        )
        .await;
        Ok(Some(output.corpus))
    }

    // Step 4 — skippable without a file, non-fatal on error.
    async fn process_categories(
        &self,
        merchant_id: &str,
        classified: &ClassifiedFileSet,
    ) -> Option<TransformArtifact> {
        self.begin(merchant_id, OnboardingStep::ProcessCategories)
            .await;

        let Some(categories_file) = &classified.categories_file else {
            self.skip(
                merchant_id,
                OnboardingStep::ProcessCategories,
                "No categories file found",
            )
            .await;
            return None;
        };

        match CategoryTransformer::new(self.blob.clone(), self.readers.clone())
            .process(merchant_id, categories_file)
            .await
        {
            Ok(output) => {
                self.mark_ledger(
                    merchant_id,
                    LedgerStep::Categories,
                    true,
                    &StepUpdate {
                        counts: crate::registry::StepCounts {
                            category_count: Some(output.category_count as i64),
                            ..Default::default()
                        },
                        ..Default::default()
                    },
                )
                .await;
                self.complete(
                    merchant_id,
                    OnboardingStep::ProcessCategories,
                    format!("Processed {} categories", output.category_count),
                )
                .await;
                Some(output.corpus)
            }
            Err(e) => {
                warn!(merchant_id, error = %e, "Category processing failed, continuing");
                let message = e.to_string();
                self.mark_ledger(
                    merchant_id,
                    LedgerStep::Categories,
                    false,
                    &StepUpdate {
                        error: Some(message.clone()),
                        ..Default::default()
                    },
                )
                .await;
                self.fail_step(merchant_id, OnboardingStep::ProcessCategories, message)
                    .await;
                None
            }
        }
    }

    // Step 5 — skippable without documents, non-fatal on error.
    async fn convert_documents(
        &self,
        merchant_id: &str,
        classified: &ClassifiedFileSet,
    ) -> Option<TransformArtifact> {
        self.begin(merchant_id, OnboardingStep::ConvertDocuments)
            .await;

        if classified.document_files.is_empty() {
            self.skip(
                merchant_id,
                OnboardingStep::ConvertDocuments,
                "No documents found",
            )
            .await;
            return None;
        }

        match DocumentTransformer::new(self.blob.clone(), self.readers.clone())
            .process(merchant_id, &classified.document_files)
            .await
        {
            Ok(output) => {
                let Some(artifact) = output.artifact else {
                    // Every file was skipped; nothing converted.
                    self.skip(
                        merchant_id,
                        OnboardingStep::ConvertDocuments,
                        format!("No convertible documents ({} skipped)", output.skipped_files.len()),
                    )
                    .await;
                    return None;
                };

                self.mark_ledger(
                    merchant_id,
                    LedgerStep::Documents,
                    true,
                    &StepUpdate {
                        counts: crate::registry::StepCounts {
                            document_count: Some(output.document_count as i64),
                            ..Default::default()
                        },
                        ..Default::default()
                    },
                )
                .await;
                let message = if output.skipped_files.is_empty() {
                    format!("Converted {} documents", output.document_count)
                } else {
                    format!(
                        "Converted {} documents ({} skipped)",
                        output.document_count,
                        output.skipped_files.len()
                    )
                };
                self.complete(merchant_id, OnboardingStep::ConvertDocuments, message)
                    .await;
                Some(artifact)
            }
            Err(e) => {
                warn!(merchant_id, error = %e, "Document conversion failed, continuing");
                let message = e.to_string();
                self.mark_ledger(
                    merchant_id,
                    LedgerStep::Documents,
                    false,
                    &StepUpdate {
                        error: Some(message.clone()),
                        ..Default::default()
                    },
                )
                .await;
                self.fail_step(merchant_id, OnboardingStep::ConvertDocuments, message)
                    .await;
                None
            }
        }
    }

    // Step 6 — datastore creation fatal, corpus imports best-effort.
    // Returns whether a website datastore was provisioned.
    async fn setup_search_index(
        &self,
        request: &OnboardRequest,
        corpus_artifacts: &[TransformArtifact],
    ) -> Result<bool, OnboardError> {
        let merchant_id = &request.merchant_id;
        self.begin(merchant_id, OnboardingStep::SetupSearchIndex)
            .await;

        let outcome = self
            .provisioner
            .provision(merchant_id, &request.shop_name, request.shop_url.as_deref())
            .await
            .map_err(OnboardError::Provisioning)?;

        if let Err(e) = self
            .registry
            .set_datastore_ref(
                merchant_id,
                &outcome.documents.id,
                &outcome.documents.status.to_string(),
            )
            .await
        {
            warn!(merchant_id, error = %e, "Failed to record datastore reference");
        }

        let mut import_errors = Vec::new();
        for artifact in corpus_artifacts {
            let uri = paths::artifact_uri(&self.bucket_name, &artifact.path);
            match self
                .provisioner
                .index()
                .import_corpus(&outcome.documents.id, &uri, ImportMode::Full)
                .await
            {
                Ok(report) => {
                    info!(
                        merchant_id,
                        uri,
                        imported = report.imported,
                        "Imported corpus artifact"
                    );
                    import_errors.extend(report.errors);
                }
                Err(e) if e.is_permission_denied() => {
                    warn!(merchant_id, uri, error = %e, "Corpus import denied");
                    import_errors.push(format!(
                        "Import of {uri} was denied: grant the service account \
                         import access to the search index and re-run onboarding"
                    ));
                }
                Err(e) => {
                    warn!(merchant_id, uri, error = %e, "Corpus import failed");
                    import_errors.push(format!("Import of {uri} failed: {e}"));
                }
            }
        }

        self.mark_ledger(
            merchant_id,
            LedgerStep::SearchIndex,
            true,
            &StepUpdate::default(),
        )
        .await;

        let message = if import_errors.is_empty() {
            "Search datastores ready".to_string()
        } else {
            format!(
                "Search datastores ready; {} import(s) failed: {}",
                import_errors.len(),
                import_errors.join("; ")
            )
        };
        self.complete(merchant_id, OnboardingStep::SetupSearchIndex, message)
            .await;
        Ok(outcome.website.is_some())
    }

    // Step 7 — fatal.
    async fn generate_config(
        &self,
        request: &OnboardRequest,
        has_website: bool,
    ) -> Result<(), OnboardError> {
        let merchant_id = &request.merchant_id;
        self.begin(merchant_id, OnboardingStep::GenerateConfig)
            .await;

        let output = ConfigGenerator::new(self.blob.clone(), self.bucket_name.clone())
            .generate(
                merchant_id,
                &request.user_id,
                &request.shop_name,
                &request.config_profile(),
                has_website,
            )
            .await
            .map_err(|e| OnboardError::ConfigGeneration(e.to_string()))?;

        self.mark_ledger(
            merchant_id,
            LedgerStep::Config,
            true,
            &StepUpdate {
                config_path: Some(output.config_path.clone()),
                ..Default::default()
            },
        )
        .await;
        self.complete(
            merchant_id,
            OnboardingStep::GenerateConfig,
            format!("Configuration written to {}", output.config_path),
        )
        .await;
        Ok(())
    }

    // Step 8 — fatal; this mark is what flips the durable overall status.
    async fn finalize(&self, merchant_id: &str) -> Result<(), OnboardError> {
        self.begin(merchant_id, OnboardingStep::Finalize).await;

        self.registry
            .mark_step(
                merchant_id,
                LedgerStep::Onboarding,
                true,
                &StepUpdate::default(),
            )
            .await
            .map_err(OnboardError::Finalize)?;

        self.complete(merchant_id, OnboardingStep::Finalize, "Onboarding complete")
            .await;
        Ok(())
    }
}
