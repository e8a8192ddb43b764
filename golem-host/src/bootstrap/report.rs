use super::BootstrapAction;
use serde::Serialize;
use serde_json::{json, Map, Value};

pub type Details = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Error,
}

/// What one step did
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Effect already present, nothing run
    Skipped { message: String },
    Succeeded { message: String, details: Details },
    Failed { message: String, error: String, details: Details },
}

impl StepOutcome {
    pub fn skipped(message: impl Into<String>) -> Self {
        StepOutcome::Skipped { message: message.into() }
    }

    pub fn succeeded(message: impl Into<String>, details: Details) -> Self {
        StepOutcome::Succeeded { message: message.into(), details }
    }

    pub fn failed(message: impl Into<String>, error: impl Into<String>, details: Details) -> Self {
        StepOutcome::Failed { message: message.into(), error: error.into(), details }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            StepOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// One entry of the audit trail
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BootstrapStep {
    pub step: usize,
    pub action: BootstrapAction,
    pub status: StepStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub details: Details,
}

impl BootstrapStep {
    pub(super) fn record(step: usize, action: BootstrapAction, outcome: StepOutcome) -> Self {
        let (status, message, details) = match outcome {
            StepOutcome::Skipped { message } => {
                let mut details = Details::new();
                details.insert("skipped".into(), json!(true));
                (StepStatus::Success, message, details)
            }
            StepOutcome::Succeeded { message, details } => (StepStatus::Success, message, details),
            StepOutcome::Failed { message, error, mut details } => {
                details.insert("error".into(), json!(error));
                (StepStatus::Error, message, details)
            }
        };
        Self { step, action, status, message, details }
    }

    pub fn skipped(&self) -> bool {
        self.details.get("skipped").and_then(Value::as_bool).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BootstrapReport {
    pub status: StepStatus,
    pub message: String,
    /// Steps that succeeded (or were skipped) before the run ended
    pub steps_completed: usize,
    pub total_steps: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub steps: Vec<BootstrapStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl BootstrapReport {
    pub(super) fn failed(steps: Vec<BootstrapStep>, failed_step: usize, error: String) -> Self {
        Self {
            status: StepStatus::Error,
            message: format!("Bootstrap failed at step {failed_step}"),
            steps_completed: failed_step - 1,
            total_steps: BootstrapAction::ALL.len(),
            failed_step: Some(failed_step),
            error: Some(error),
            steps,
            completed_at: None,
            note: None,
        }
    }

    pub(super) fn succeeded(steps: Vec<BootstrapStep>) -> Self {
        Self {
            status: StepStatus::Success,
            message: "Bootstrap completed successfully".to_string(),
            steps_completed: steps.len(),
            total_steps: BootstrapAction::ALL.len(),
            failed_step: None,
            error: None,
            steps,
            completed_at: Some(chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()),
            note: Some(
                "Use /verify-installation to check if everything is working, then /start-golem to start the provider"
                    .to_string(),
            ),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}
