//! Operator actions on a live or blocked session.

use tracing::{info, warn};

use super::PhaseController;
use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::{
    BlockReason, ControllerState, PhaseStatus, PolicyDecision, RequestMarkers, SessionStatus,
    SessionSummary, Signal, SignalKind, TaskStatus,
};

impl PhaseController {
    /// Put a blocked task back to pending so the next run dispatches it again.
    pub fn retry_task(&mut self, task_id: &str) -> DomainResult<()> {
        self.ensure_live()?;
        let now = self.clock.now();
        let session = self.session_mut()?;
        let (index, _) = session
            .find_task(task_id)
            .ok_or_else(|| OrchestrationError::TaskNotFound(task_id.to_string()))?;
        let task = session.phases[index]
            .task_mut(task_id)
            .ok_or_else(|| OrchestrationError::TaskNotFound(task_id.to_string()))?;
        let previous = task.block_reason.clone();
        task.transition_to(TaskStatus::Pending, now)?;
        task.attempts = 0;
        info!(
            session_id = %session.id,
            task_id,
            previous = ?previous,
            "task re-queued by operator"
        );
        Ok(())
    }

    /// Feed an observed user behaviour into the signal buffer.
    pub fn record_interaction(&mut self, kind: SignalKind) -> DomainResult<Option<Signal>> {
        self.ensure_live()?;
        let now = self.clock.now();
        let evicted = self.signals.record(kind, now);
        self.session_mut()?.stats.signals_emitted += 1;
        Ok(evicted)
    }

    /// Re-run policy selection with fresh request markers, subject to the
    /// anti-thrash guard.
    pub fn reselect_policy(&mut self, markers: RequestMarkers) -> DomainResult<PolicyDecision> {
        self.ensure_live()?;
        self.select_policy(Some(markers))
            .ok_or(OrchestrationError::NoActiveSession)
    }

    /// Cancel the session: every non-terminal task is blocked with the
    /// reason and in-flight reservations are released. The traceability
    /// gate is not consulted.
    pub fn cancel(&mut self, reason: &str) -> DomainResult<SessionSummary> {
        self.ensure_live()?;
        self.cancel.cancel();
        self.cancel_session(reason);
        self.summary()
    }

    pub(super) fn cancel_session(&mut self, reason: &str) {
        let now = self.clock.now();
        let released: Vec<_> = self.in_flight.drain().map(|(_, r)| r).collect();
        for (amount, tier) in released {
            self.ledger.release_from(amount, tier);
        }

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let mut cancelled = 0usize;
        for phase in &mut session.phases {
            for task in &mut phase.tasks {
                if matches!(task.status, TaskStatus::Pending | TaskStatus::InProgress) {
                    let block = BlockReason::Cancelled {
                        reason: reason.to_string(),
                    };
                    if task.block(block, now).is_ok() {
                        cancelled += 1;
                    }
                }
            }
        }
        let current = session.current_phase;
        if let Some(phase) = session.phases.get_mut(current) {
            if !phase.status.is_terminal() {
                phase.status = PhaseStatus::Failed;
            }
        }
        session.status = SessionStatus::Cancelled;
        session.state = ControllerState::Failed;
        session.touch(now);
        warn!(session_id = %session.id, reason, tasks_cancelled = cancelled, "session cancelled");
        self.sync_budget();
    }
}
