//! Structured reports.

use super::PhaseController;
use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::{
    BlockedReason, BlockedReport, BlockedTask, PhaseReport, PhaseStatus, SessionSummary, TaskStatus,
};

impl PhaseController {
    pub(super) fn phase_report(&self, index: usize) -> DomainResult<PhaseReport> {
        let session = self.session_ref()?;
        let phase = session
            .phases
            .get(index)
            .ok_or_else(|| OrchestrationError::CorruptedSnapshot(format!("no phase at index {index}")))?;
        Ok(PhaseReport {
            phase: phase.name.clone(),
            tasks_completed: phase.count_with(TaskStatus::Completed),
            budget_consumed: phase.budget_consumed,
            findings_resolved: phase.findings_resolved,
            policy: phase.completed_policy.unwrap_or(session.policy),
        })
    }

    pub(super) fn blocked_tasks_report(&self, index: usize) -> DomainResult<BlockedReport> {
        let session = self.session_ref()?;
        let phase = session
            .phases
            .get(index)
            .ok_or_else(|| OrchestrationError::CorruptedSnapshot(format!("no phase at index {index}")))?;
        let tasks = phase
            .blocked_tasks()
            .into_iter()
            .filter_map(|t| {
                t.block_reason.clone().map(|reason| BlockedTask {
                    id: t.id.clone(),
                    reason,
                })
            })
            .collect();
        Ok(BlockedReport {
            phase: phase.name.clone(),
            reason: BlockedReason::Tasks { tasks },
        })
    }

    /// Current blocked report for the session, if it is waiting on the operator.
    pub fn blocked_report(&self) -> Option<BlockedReport> {
        let session = self.session.as_ref()?;
        let phase = session.current()?;
        if phase.status != PhaseStatus::Blocked {
            return None;
        }
        if phase.findings.is_empty() {
            return self.blocked_tasks_report(session.current_phase).ok();
        }
        Some(BlockedReport {
            phase: phase.name.clone(),
            reason: BlockedReason::Traceability {
                findings: phase.findings.clone(),
            },
        })
    }

    /// End-of-run accounting for the current session.
    pub fn summary(&self) -> DomainResult<SessionSummary> {
        let session = self.session_ref()?;
        let reports = (0..session.phases.len())
            .filter(|&i| session.phases[i].status == PhaseStatus::Completed)
            .map(|i| self.phase_report(i))
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(SessionSummary {
            session_id: session.id,
            status: session.status,
            phases_completed: session.phases_completed(),
            phases_total: session.phases.len(),
            tasks_completed: session.tasks_with(TaskStatus::Completed),
            tasks_blocked: session.tasks_with(TaskStatus::Blocked),
            retries: session.stats.retries,
            budget_used: self.ledger.used(),
            budget_available: self.ledger.available(),
            evictions: session.stats.evictions,
            policy_switches: session.stats.policy_switches,
            signals_emitted: session.stats.signals_emitted,
            active_policy: session.policy,
            duration_secs: (session.updated_at - session.created_at).num_seconds(),
            reports,
        })
    }
}
