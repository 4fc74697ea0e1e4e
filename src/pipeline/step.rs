//! Run step model — the fixed step sequence and per-step state machine.

use serde::{Deserialize, Serialize};

/// The fixed, ordered steps of one onboarding run.
///
/// Executed strictly in declaration order. The wire names (snake_case)
/// are the contract with polling clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    CreateMerchantRecord,
    CreateFolders,
    ProcessProducts,
    ProcessCategories,
    ConvertDocuments,
    SetupSearchIndex,
    GenerateConfig,
    Finalize,
}

impl OnboardingStep {
    /// All steps in execution order.
    pub const ALL: [OnboardingStep; 8] = [
        Self::CreateMerchantRecord,
        Self::CreateFolders,
        Self::ProcessProducts,
        Self::ProcessCategories,
        Self::ConvertDocuments,
        Self::SetupSearchIndex,
        Self::GenerateConfig,
        Self::Finalize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateMerchantRecord => "create_merchant_record",
            Self::CreateFolders => "create_folders",
            Self::ProcessProducts => "process_products",
            Self::ProcessCategories => "process_categories",
            Self::ConvertDocuments => "convert_documents",
            Self::SetupSearchIndex => "setup_search_index",
            Self::GenerateConfig => "generate_config",
            Self::Finalize => "finalize",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|step| step.as_str() == s)
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-step status within one run.
///
/// `pending → in_progress → {completed | failed | skipped}`. A step
/// never jumps straight from pending to a terminal state, and terminal
/// states are final for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: StepStatus) -> bool {
        use StepStatus::*;
        matches!(
            (self, target),
            (Pending, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Skipped)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Terminal without blocking overall completion.
    pub fn counts_as_done(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// Overall status of one run, derived from its step statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for step in OnboardingStep::ALL {
            assert_eq!(OnboardingStep::parse(step.as_str()), Some(step));
            // serde and Display agree
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(json, format!("\"{step}\""));
        }
        assert_eq!(OnboardingStep::parse("no_such_step"), None);
    }

    #[test]
    fn execution_order_is_fixed() {
        let names: Vec<&str> = OnboardingStep::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            [
                "create_merchant_record",
                "create_folders",
                "process_products",
                "process_categories",
                "convert_documents",
                "setup_search_index",
                "generate_config",
                "finalize",
            ]
        );
    }

    #[test]
    fn valid_transitions() {
        use StepStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Failed));
        assert!(InProgress.can_transition_to(Skipped));
    }

    #[test]
    fn invalid_transitions() {
        use StepStatus::*;
        // No jump from pending straight to a terminal state
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Skipped));
        // Terminal states are final
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Skipped.can_transition_to(Pending));
        // Self-transition
        assert!(!InProgress.can_transition_to(InProgress));
    }

    #[test]
    fn terminal_and_done() {
        use StepStatus::*;
        assert!(Completed.is_terminal() && Completed.counts_as_done());
        assert!(Skipped.is_terminal() && Skipped.counts_as_done());
        assert!(Failed.is_terminal() && !Failed.counts_as_done());
        assert!(!Pending.is_terminal());
        assert!(!InProgress.is_terminal());
    }
}
