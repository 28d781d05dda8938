//! Domain errors for the orchestration core.
//!
//! Only structural problems and API misuse are errors. Budget pressure,
//! traceability gaps and policy ambiguity are ordinary result values.

use thiserror::Error;

use super::models::report::FailureReason;
use super::models::task::TaskStatus;

/// Format a cycle path as a human-readable string: `A -> B -> C -> A`.
fn format_cycle_path(path: &[String]) -> String {
    path.join(" -> ")
}

/// Errors raised by the orchestration core.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("Task dependency cycle in phase '{phase}': {}", format_cycle_path(.path))]
    DependencyCycle { phase: String, path: Vec<String> },

    #[error("Task '{task}' in phase '{phase}' depends on unknown task '{dependency}'")]
    UnknownDependency {
        phase: String,
        task: String,
        dependency: String,
    },

    #[error("Duplicate task id '{task}' in phase '{phase}'")]
    DuplicateTask { phase: String, task: String },

    #[error("Plan has no phases")]
    EmptyPlan,

    #[error("No default template for phase '{0}'")]
    UnknownPhaseTemplate(String),

    #[error("Store '{store}' unreachable: {reason}")]
    StoreUnreachable { store: String, reason: String },

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Corrupted session snapshot: {0}")]
    CorruptedSnapshot(String),

    #[error("Work executor unreachable: {0}")]
    ExecutorUnreachable(String),

    #[error("Invalid transition for task '{task}' from {from} to {to}")]
    InvalidTaskTransition {
        task: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Phase '{phase}' has unresolved findings for: {}", .labels.join(", "))]
    UnresolvedFindings { phase: String, labels: Vec<String> },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("No active session")]
    NoActiveSession,

    #[error("Session is {0} and accepts no further work")]
    SessionTerminal(String),
}

pub type DomainResult<T> = Result<T, OrchestrationError>;

impl OrchestrationError {
    /// Structural fatals end the session; everything else leaves it alive.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::DependencyCycle { .. } => Some(FailureReason::DependencyCycle),
            Self::UnknownDependency { .. } => Some(FailureReason::UnknownDependency),
            Self::DuplicateTask { .. } => Some(FailureReason::DuplicateTask),
            Self::EmptyPlan => Some(FailureReason::EmptyPlan),
            Self::UnknownPhaseTemplate(_) => Some(FailureReason::UnknownPhaseTemplate),
            Self::StoreUnreachable { .. } => Some(FailureReason::StoreUnreachable),
            Self::CorruptedSnapshot(_) => Some(FailureReason::CorruptedSnapshot),
            Self::ExecutorUnreachable(_) => Some(FailureReason::ExecutorUnreachable),
            _ => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.failure_reason().is_some()
    }

    /// Invariant protected by the check that raised this error.
    pub fn violated_invariant(&self) -> &'static str {
        match self {
            Self::DependencyCycle { .. } => "task graph must be acyclic",
            Self::UnknownDependency { .. } => "dependencies must name tasks in the same phase",
            Self::DuplicateTask { .. } => "task ids are unique within a phase",
            Self::EmptyPlan | Self::UnknownPhaseTemplate(_) => {
                "every session is decomposed into at least one known phase"
            }
            Self::StoreUnreachable { .. } | Self::ResourceNotFound(_) => {
                "collaborator stores must answer every query"
            }
            Self::CorruptedSnapshot(_) => "a resumed session matches the state it was saved in",
            Self::ExecutorUnreachable(_) => "every dispatched task reports a completion",
            Self::InvalidTaskTransition { .. } => "task status only moves forward",
            Self::UnresolvedFindings { .. } => {
                "a phase cannot complete with unresolved validator findings"
            }
            Self::TaskNotFound(_) | Self::NoActiveSession | Self::SessionTerminal(_) => {
                "operations target a live session"
            }
        }
    }
}

impl From<serde_json::Error> for OrchestrationError {
    fn from(err: serde_json::Error) -> Self {
        Self::CorruptedSnapshot(err.to_string())
    }
}
