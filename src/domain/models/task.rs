//! Task domain model.
//!
//! Tasks are atomic units of work inside a phase. They form a DAG through
//! `depends_on` and only move forward, except for the explicit
//! blocked/retry transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::domain::errors::{DomainResult, OrchestrationError};

use super::plan::TaskSpec;
use super::resource::ResourceTier;

/// Status of a task in the scheduling pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Declared, not yet dispatched
    Pending,
    /// Dispatched to the work executor
    InProgress,
    /// Finished successfully
    Completed,
    /// Waiting for operator intervention
    Blocked,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<TaskStatus> {
        match self {
            Self::Pending => vec![Self::InProgress, Self::Blocked],
            // Back to pending is the retry path.
            Self::InProgress => vec![Self::Completed, Self::Pending, Self::Blocked],
            Self::Blocked => vec![Self::Pending],
            Self::Completed => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a task is blocked. Always carries the specifics an operator needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockReason {
    /// Budget could not cover the task even after a forced checkpoint.
    BudgetShortfall { required: u64, shortfall: u64, tier: ResourceTier },
    /// Executor reported failure and the retry allowance is used up.
    ExecutionFailed { attempts: u32, reason: String },
    /// Deadline expired on the final attempt.
    TimedOut { attempts: u32, timeout_secs: u64 },
    /// The session was cancelled while the task was not terminal.
    Cancelled { reason: String },
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BudgetShortfall { required, shortfall, tier } => write!(
                f,
                "budget short by {shortfall} units (needs {required}, tier {tier})"
            ),
            Self::ExecutionFailed { attempts, reason } => {
                write!(f, "failed after {attempts} attempt(s): {reason}")
            }
            Self::TimedOut { attempts, timeout_secs } => {
                write!(f, "timed out after {attempts} attempt(s) ({timeout_secs}s deadline)")
            }
            Self::Cancelled { reason } => write!(f, "cancelled: {reason}"),
        }
    }
}

/// An atomic unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    /// Present-progressive label for display ("Writing tests").
    pub active_form: String,
    pub status: TaskStatus,
    pub depends_on: Vec<String>,
    /// Estimated budget cost.
    pub cost: u64,
    pub tier: ResourceTier,
    pub parallelizable: bool,
    /// Traceability labels this task contributes to.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Dispatch attempts so far.
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub block_reason: Option<BlockReason>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        let description = description.into();
        Self {
            id: id.into(),
            active_form: description.clone(),
            description,
            status: TaskStatus::Pending,
            depends_on: Vec::new(),
            cost: 0,
            tier: ResourceTier::default(),
            parallelizable: false,
            labels: Vec::new(),
            attempts: 0,
            block_reason: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn from_spec(spec: &TaskSpec) -> Self {
        let mut task = Self::new(&spec.id, &spec.description);
        if let Some(active_form) = &spec.active_form {
            task.active_form = active_form.clone();
        }
        task.depends_on = spec.depends_on.clone();
        task.cost = spec.cost;
        task.tier = spec.tier;
        task.parallelizable = spec.parallelizable;
        task.labels = spec.labels.clone();
        task
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn with_cost(mut self, cost: u64, tier: ResourceTier) -> Self {
        self.cost = cost;
        self.tier = tier;
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallelizable = true;
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }

    /// Move to `to`, rejecting anything outside the forward-only graph.
    pub fn transition_to(&mut self, to: TaskStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(OrchestrationError::InvalidTaskTransition {
                task: self.id.clone(),
                from: self.status,
                to,
            });
        }
        match to {
            TaskStatus::InProgress => {
                self.attempts += 1;
                self.started_at = Some(now);
            }
            TaskStatus::Completed => {
                self.completed_at = Some(now);
                self.block_reason = None;
            }
            TaskStatus::Pending => self.block_reason = None,
            TaskStatus::Blocked => {}
        }
        self.status = to;
        Ok(())
    }

    /// Block with a reason; a thin wrapper that keeps the reason and status in sync.
    pub fn block(&mut self, reason: BlockReason, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition_to(TaskStatus::Blocked, now)?;
        self.block_reason = Some(reason);
        Ok(())
    }

    /// Pending and every dependency completed.
    pub fn is_ready(&self, completed: &HashSet<&str>) -> bool {
        self.status == TaskStatus::Pending && self.depends_on.iter().all(|d| completed.contains(d.as_str()))
    }

    /// A completion needed more than one attempt.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }
}
