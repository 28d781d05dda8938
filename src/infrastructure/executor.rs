//! Built-in work executors.

use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use crate::domain::models::Task;
use crate::domain::ports::{CompletionEvent, ExecutorError, WorkExecutor};

/// Executor that performs no work and reports every task as succeeded.
/// Used by the CLI to walk a plan end to end.
#[derive(Debug, Clone, Default)]
pub struct DryRunExecutor {
    delay: Duration,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause before each completion, to make batching visible in logs.
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl WorkExecutor for DryRunExecutor {
    async fn dispatch(&self, task: Task) -> Result<CompletionEvent, ExecutorError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        info!(
            task_id = %task.id,
            activity = %task.active_form,
            cost = task.cost,
            "dry run"
        );
        Ok(CompletionEvent::succeeded(task.id))
    }
}
