//! Session aggregate.
//!
//! A session owns its phases (and through them, tasks) plus the references
//! to resources currently loaded into context. Exactly one phase is active
//! at a time; `current_phase` only advances past a completed phase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::phase::{Phase, PhaseStatus};
use super::plan::WorkRequest;
use super::policy::PolicyId;
use super::report::FailureReport;
use super::task::{Task, TaskStatus};

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    /// Alive but waiting for operator remediation.
    Blocked,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States of the controller's workflow machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Pending,
    Decomposing,
    Scheduling,
    Executing,
    Checkpointing,
    Completed,
    Failed,
}

impl ControllerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Decomposing => "decomposing",
            Self::Scheduling => "scheduling",
            Self::Executing => "executing",
            Self::Checkpointing => "checkpointing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running counters for the end-of-run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub retries: u32,
    pub evictions: u32,
    pub policy_switches: u32,
    pub signals_emitted: u32,
}

/// Root aggregate of one orchestrated workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub request: WorkRequest,
    pub status: SessionStatus,
    pub state: ControllerState,
    /// Index into `phases` of the phase being worked.
    pub current_phase: usize,
    pub phases: Vec<Phase>,
    /// Cumulative budget consumed, start-up overhead excluded.
    pub budget_consumed: u64,
    /// Ids of resources currently loaded.
    #[serde(default)]
    pub loaded_resources: Vec<String>,
    pub policy: PolicyId,
    #[serde(default)]
    pub failure: Option<FailureReport>,
    #[serde(default)]
    pub stats: SessionStats,
}

impl Session {
    pub fn new(request: WorkRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            request,
            status: SessionStatus::Active,
            state: ControllerState::Pending,
            current_phase: 0,
            phases: Vec::new(),
            budget_consumed: 0,
            loaded_resources: Vec::new(),
            policy: PolicyId::default(),
            failure: None,
            stats: SessionStats::default(),
        }
    }

    pub fn current(&self) -> Option<&Phase> {
        self.phases.get(self.current_phase)
    }

    pub fn current_mut(&mut self) -> Option<&mut Phase> {
        self.phases.get_mut(self.current_phase)
    }

    pub fn phase(&self, name: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// The phase that is active or blocked, if any. Never more than one.
    pub fn active_phase(&self) -> Option<&Phase> {
        self.phases
            .iter()
            .find(|p| matches!(p.status, PhaseStatus::Active | PhaseStatus::Blocked))
    }

    pub fn phases_completed(&self) -> usize {
        self.phases.iter().filter(|p| p.status == PhaseStatus::Completed).count()
    }

    pub fn all_phases_completed(&self) -> bool {
        !self.phases.is_empty() && self.phases.iter().all(|p| p.status == PhaseStatus::Completed)
    }

    pub fn tasks_with(&self, status: TaskStatus) -> usize {
        self.phases.iter().map(|p| p.count_with(status)).sum()
    }

    /// Locate a task anywhere in the session.
    pub fn find_task(&self, task_id: &str) -> Option<(usize, &Task)> {
        self.phases
            .iter()
            .enumerate()
            .find_map(|(i, p)| p.task(task_id).map(|t| (i, t)))
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}
