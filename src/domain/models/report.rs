//! Structured reports emitted by the controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::policy::PolicyId;
use super::session::{ControllerState, SessionStatus};
use super::task::BlockReason;
use super::traceability::Finding;

/// Emitted when a phase reaches `Completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase: String,
    pub tasks_completed: usize,
    pub budget_consumed: u64,
    pub findings_resolved: usize,
    pub policy: PolicyId,
}

/// Machine-readable failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    DependencyCycle,
    UnknownDependency,
    DuplicateTask,
    EmptyPlan,
    UnknownPhaseTemplate,
    StoreUnreachable,
    CorruptedSnapshot,
    ExecutorUnreachable,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DependencyCycle => "dependency_cycle",
            Self::UnknownDependency => "unknown_dependency",
            Self::DuplicateTask => "duplicate_task",
            Self::EmptyPlan => "empty_plan",
            Self::UnknownPhaseTemplate => "unknown_phase_template",
            Self::StoreUnreachable => "store_unreachable",
            Self::CorruptedSnapshot => "corrupted_snapshot",
            Self::ExecutorUnreachable => "executor_unreachable",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted when the session aborts on a structural fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub failing_state: ControllerState,
    pub reason: FailureReason,
    /// The invariant the failure protects.
    pub invariant: String,
    pub detail: String,
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed in {} ({}): {} [invariant: {}]",
            self.failing_state, self.reason, self.detail, self.invariant
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedTask {
    pub id: String,
    pub reason: BlockReason,
}

/// What the operator has to fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockedReason {
    /// Tasks could not finish.
    Tasks { tasks: Vec<BlockedTask> },
    /// All tasks finished but labels lack artifacts.
    Traceability { findings: Vec<Finding> },
}

/// A phase waiting on operator remediation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedReport {
    pub phase: String,
    pub reason: BlockedReason,
}

impl fmt::Display for BlockedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            BlockedReason::Tasks { tasks } => {
                write!(f, "phase '{}' blocked on tasks: ", self.phase)?;
                let parts: Vec<String> = tasks.iter().map(|t| format!("{} {}", t.id, t.reason)).collect();
                f.write_str(&parts.join("; "))
            }
            BlockedReason::Traceability { findings } => {
                write!(f, "phase '{}' blocked on traceability: ", self.phase)?;
                let parts: Vec<String> = findings.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join("; "))
            }
        }
    }
}

/// Result of driving a single phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    Completed(PhaseReport),
    Blocked(BlockedReport),
    /// The session was cancelled while the phase ran.
    Cancelled,
}

/// End-of-run accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub phases_completed: usize,
    pub phases_total: usize,
    pub tasks_completed: usize,
    pub tasks_blocked: usize,
    pub retries: u32,
    pub budget_used: u64,
    pub budget_available: u64,
    pub evictions: u32,
    pub policy_switches: u32,
    pub signals_emitted: u32,
    pub active_policy: PolicyId,
    pub duration_secs: i64,
    /// Per-phase completion reports, in phase order.
    pub reports: Vec<PhaseReport>,
}

/// Result of driving the whole workflow. Structural fatals surface as errors instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "report", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    Completed(SessionSummary),
    Blocked(BlockedReport),
    Cancelled(SessionSummary),
}
