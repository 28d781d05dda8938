//! Phase domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::domain::errors::{DomainResult, OrchestrationError};

use super::plan::BudgetRange;
use super::policy::PolicyId;
use super::task::{Task, TaskStatus};
use super::traceability::Finding;

/// Lifecycle of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    Active,
    /// Waiting on the operator (blocked tasks or traceability gaps).
    Blocked,
    Completed,
    Failed,
}

impl Default for PhaseStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ordered stage of the workflow. Owns its tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub ordinal: usize,
    pub status: PhaseStatus,
    pub budget_estimate: BudgetRange,
    pub budget_consumed: u64,
    /// Tasks in declaration order.
    pub tasks: Vec<Task>,
    /// Labels validated at the gate besides those carried by tasks.
    #[serde(default)]
    pub trace_labels: Vec<String>,
    /// Unresolved validator findings from the last gate run.
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub findings_resolved: usize,
    /// Policy in force when the phase completed.
    #[serde(default)]
    pub completed_policy: Option<PolicyId>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Phase {
    pub fn new(name: impl Into<String>, ordinal: usize, tasks: Vec<Task>) -> Self {
        let budget_estimate = BudgetRange::from_costs(tasks.iter().map(|t| t.cost));
        Self {
            name: name.into(),
            ordinal,
            status: PhaseStatus::Pending,
            budget_estimate,
            budget_consumed: 0,
            tasks,
            trace_labels: Vec::new(),
            findings: Vec::new(),
            findings_resolved: 0,
            completed_policy: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Pending tasks whose dependencies are all completed, in declaration order.
    pub fn ready_task_ids(&self) -> Vec<String> {
        let completed: HashSet<&str> = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| t.id.as_str())
            .collect();
        self.tasks
            .iter()
            .filter(|t| t.is_ready(&completed))
            .map(|t| t.id.clone())
            .collect()
    }

    pub fn count_with(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    pub fn all_tasks_completed(&self) -> bool {
        self.tasks.iter().all(|t| t.status == TaskStatus::Completed)
    }

    pub fn blocked_tasks(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.status == TaskStatus::Blocked).collect()
    }

    /// Labels scoped to this phase: declared labels plus every task label.
    pub fn artifact_labels(&self) -> Vec<String> {
        let labels: BTreeSet<&str> = self
            .trace_labels
            .iter()
            .chain(self.tasks.iter().flat_map(|t| t.labels.iter()))
            .map(String::as_str)
            .collect();
        labels.into_iter().map(ToString::to_string).collect()
    }

    pub fn activate(&mut self, now: DateTime<Utc>) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.status = PhaseStatus::Active;
    }

    pub fn block_on_findings(&mut self, findings: Vec<Finding>) {
        self.findings = findings;
        self.status = PhaseStatus::Blocked;
    }

    /// Close the phase. Refused while findings are unresolved.
    pub fn complete(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.findings.is_empty() {
            return Err(OrchestrationError::UnresolvedFindings {
                phase: self.name.clone(),
                labels: self.findings.iter().map(|f| f.label.clone()).collect(),
            });
        }
        self.status = PhaseStatus::Completed;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Drop findings after a clean gate run, counting them as resolved.
    pub fn resolve_findings(&mut self) -> usize {
        let resolved = self.findings.len();
        self.findings.clear();
        self.findings_resolved += resolved;
        resolved
    }
}
