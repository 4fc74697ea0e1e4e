//! Progress Tracker — in-memory live view of the current run.
//!
//! Ephemeral by design: entries live only as long as the process, and a
//! new run for a merchant overwrites the old entry. The durable record
//! is the Step Ledger; this exists so polling clients see live per-step
//! progress while a run executes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::warn;

use crate::pipeline::step::{OnboardingStep, RunStatus, StepStatus};

/// One step's live record within a run.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub name: OnboardingStep,
    pub status: StepStatus,
    pub message: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl StepRecord {
    fn new(step: OnboardingStep) -> Self {
        Self {
            name: step,
            status: StepStatus::Pending,
            message: default_message(step).to_string(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }
}

fn default_message(step: OnboardingStep) -> &'static str {
    match step {
        OnboardingStep::CreateMerchantRecord => "Creating merchant record",
        OnboardingStep::CreateFolders => "Creating folder structure",
        OnboardingStep::ProcessProducts => "Processing product files",
        OnboardingStep::ProcessCategories => "Processing category files",
        OnboardingStep::ConvertDocuments => "Converting documents",
        OnboardingStep::SetupSearchIndex => "Provisioning search datastores",
        OnboardingStep::GenerateConfig => "Generating merchant configuration",
        OnboardingStep::Finalize => "Finalizing onboarding",
    }
}

/// Snapshot of one merchant's current run.
#[derive(Debug, Clone, Serialize)]
pub struct OnboardingRun {
    pub run_id: String,
    pub merchant_id: String,
    pub user_id: String,
    pub status: RunStatus,
    /// 0–100, derived: steps completed or skipped over total.
    pub percent_complete: u8,
    pub current_step: Option<OnboardingStep>,
    /// Always all 8 steps, in execution order.
    pub steps: Vec<StepRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<String>,
    /// Set once the orchestrator ends the run; later updates drop.
    #[serde(skip)]
    ended: bool,
}

impl OnboardingRun {
    fn new(merchant_id: &str, user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            run_id: format!("{merchant_id}_{}", now.timestamp()),
            merchant_id: merchant_id.to_string(),
            user_id: user_id.to_string(),
            status: RunStatus::Pending,
            percent_complete: 0,
            current_step: None,
            steps: OnboardingStep::ALL.iter().copied().map(StepRecord::new).collect(),
            created_at: now,
            updated_at: now,
            error: None,
            ended: false,
        }
    }

    /// Placeholder snapshot for a run whose tracker entry disappeared.
    pub(crate) fn vanished(merchant_id: &str, user_id: &str, run_id: String) -> Self {
        let mut run = Self::new(merchant_id, user_id);
        run.run_id = run_id;
        run.status = RunStatus::Failed;
        run.error = Some("Run state lost".to_string());
        run.ended = true;
        run
    }

    fn step_mut(&mut self, step: OnboardingStep) -> &mut StepRecord {
        // ALL and steps share declaration order; the index always exists.
        let idx = OnboardingStep::ALL
            .iter()
            .position(|s| *s == step)
            .unwrap_or(0);
        &mut self.steps[idx]
    }

    /// Recompute overall status and percent from the step statuses.
    ///
    /// Overall is `completed` iff every step is completed or skipped,
    /// `failed` iff any step failed, otherwise `in_progress`. A `failed`
    /// overall status does not end the run by itself: non-fatal step
    /// failures pin the status at failed while later steps keep
    /// advancing. The run ends when every step is terminal, or when the
    /// orchestrator calls `finish` after a fatal abort.
    fn recompute(&mut self) {
        let done = self
            .steps
            .iter()
            .filter(|s| s.status.counts_as_done())
            .count();
        self.percent_complete = (done * 100 / self.steps.len()) as u8;

        if self.steps.iter().all(|s| s.status.counts_as_done()) {
            self.status = RunStatus::Completed;
            self.percent_complete = 100;
        } else if self.steps.iter().any(|s| s.status == StepStatus::Failed) {
            self.status = RunStatus::Failed;
        } else {
            self.status = RunStatus::InProgress;
        }

        if self.steps.iter().all(|s| s.status.is_terminal()) {
            self.ended = true;
        }
    }
}

/// Tracks at most one live run per merchant.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    runs: RwLock<HashMap<String, OnboardingRun>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking a fresh run, replacing any prior run for the
    /// merchant. Returns the new run id.
    pub async fn start(&self, merchant_id: &str, user_id: &str) -> String {
        let run = OnboardingRun::new(merchant_id, user_id);
        let run_id = run.run_id.clone();
        self.runs
            .write()
            .await
            .insert(merchant_id.to_string(), run);
        run_id
    }

    /// Move one step to a new status and recompute the run's overall
    /// status and percent.
    ///
    /// Tolerant by contract with the orchestrator: updates for unknown
    /// merchants, finished runs, or invalid transitions are logged and
    /// dropped rather than surfaced, so status bookkeeping can never
    /// fail a run.
    pub async fn advance(
        &self,
        merchant_id: &str,
        step: OnboardingStep,
        status: StepStatus,
        message: Option<String>,
        error: Option<String>,
    ) {
        let mut runs = self.runs.write().await;
        let Some(run) = runs.get_mut(merchant_id) else {
            warn!(merchant_id, %step, "No tracked run for merchant");
            return;
        };
        if run.ended {
            warn!(merchant_id, %step, "Run already finished, dropping update");
            return;
        }

        let now = Utc::now();
        let record = run.step_mut(step);
        if !record.status.can_transition_to(status) {
            warn!(
                merchant_id,
                %step,
                from = %record.status,
                to = %status,
                "Invalid step transition, dropping update"
            );
            return;
        }

        record.status = status;
        match status {
            StepStatus::InProgress => record.started_at = Some(now),
            StepStatus::Completed | StepStatus::Skipped => {
                record.completed_at = Some(now);
                record.error = None;
            }
            StepStatus::Failed => {
                record.completed_at = Some(now);
                record.error = error.clone();
            }
            StepStatus::Pending => {}
        }
        if let Some(message) = message {
            record.message = message;
        }

        if status == StepStatus::InProgress {
            run.current_step = Some(step);
        }
        if status == StepStatus::Failed {
            run.error = error;
        }
        run.recompute();
        run.updated_at = now;
    }

    /// Snapshot the live run for a merchant, if any.
    pub async fn get(&self, merchant_id: &str) -> Option<OnboardingRun> {
        self.runs.read().await.get(merchant_id).cloned()
    }

    /// End the run for a merchant. The orchestrator calls this once the
    /// step sequence is over; after a fatal abort the remaining steps
    /// stay pending, so ending is an explicit signal rather than a state
    /// derived from the steps.
    pub async fn finish(&self, merchant_id: &str) {
        let mut runs = self.runs.write().await;
        if let Some(run) = runs.get_mut(merchant_id) {
            run.ended = true;
            run.updated_at = Utc::now();
        }
    }

    /// Whether the merchant's tracked run has ended.
    pub async fn has_finished(&self, merchant_id: &str) -> bool {
        self.runs
            .read()
            .await
            .get(merchant_id)
            .is_some_and(|run| run.ended)
    }

    /// Whether a run for this merchant is currently executing.
    pub async fn is_running(&self, merchant_id: &str) -> bool {
        self.runs
            .read()
            .await
            .get(merchant_id)
            .is_some_and(|run| !run.ended)
    }

    /// Drop the tracked run for a merchant.
    pub async fn remove(&self, merchant_id: &str) {
        self.runs.write().await.remove(merchant_id);
    }
}
