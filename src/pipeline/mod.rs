//! Onboarding pipeline — step model, live progress, the orchestrator,
//! and the background dispatcher.

pub mod dispatcher;
pub mod orchestrator;
pub mod progress;
pub mod step;

pub use dispatcher::RunDispatcher;
pub use orchestrator::{OnboardRequest, Orchestrator};
pub use progress::{OnboardingRun, ProgressTracker, StepRecord};
pub use step::{OnboardingStep, RunStatus, StepStatus};
