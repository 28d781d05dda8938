use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::models::Task;
use crate::domain::ports::errors::ExecutorError;

/// Outcome reported by the executor for one dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompletionStatus {
    Succeeded,
    Failed { reason: String },
}

/// Completion event for a dispatched task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub task_id: String,
    pub status: CompletionStatus,
    /// Whether a failed task may be dispatched again
    pub retryable: bool,
}

impl CompletionEvent {
    pub fn succeeded(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: CompletionStatus::Succeeded,
            retryable: false,
        }
    }

    pub fn failed(task_id: impl Into<String>, reason: impl Into<String>, retryable: bool) -> Self {
        Self {
            task_id: task_id.into(),
            status: CompletionStatus::Failed {
                reason: reason.into(),
            },
            retryable,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, CompletionStatus::Succeeded)
    }
}

/// Performs the actual work behind a task.
///
/// Implementations may run work inline or hand it to a pool. They never
/// touch orchestration state; the outcome is reported back as a value.
#[async_trait]
pub trait WorkExecutor: Send + Sync {
    async fn dispatch(&self, task: Task) -> Result<CompletionEvent, ExecutorError>;
}
