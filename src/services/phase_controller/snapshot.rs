//! Suspend and resume.
//!
//! A snapshot holds everything needed to continue a session exactly where
//! it stopped: the session aggregate (phase pointer, task statuses, active
//! policy), the ledger state, the signal buffer and the selector state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

use super::PhaseController;
use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::{PhaseStatus, Session, Signal, TaskStatus};
use crate::services::budget_ledger::{BudgetLedger, LedgerState};
use crate::services::policy_selector::{PolicySelector, SelectorState};
use crate::services::signal_aggregator::SignalAggregator;

/// Current snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub session: Session,
    pub ledger: LedgerState,
    pub signals: Vec<Signal>,
    pub selector: SelectorState,
}

impl SessionSnapshot {
    /// Check internal consistency. Any mismatch means the snapshot cannot be
    /// trusted to reproduce the session.
    pub fn validate(&self) -> DomainResult<()> {
        let corrupt = |msg: String| Err(OrchestrationError::CorruptedSnapshot(msg));

        if self.version != SNAPSHOT_VERSION {
            return corrupt(format!(
                "unsupported version {} (expected {SNAPSHOT_VERSION})",
                self.version
            ));
        }

        let session = &self.session;
        if session.current_phase > session.phases.len() {
            return corrupt(format!(
                "phase pointer {} beyond {} phases",
                session.current_phase,
                session.phases.len()
            ));
        }

        for (i, phase) in session.phases.iter().enumerate() {
            if phase.ordinal != i {
                return corrupt(format!(
                    "phase '{}' has ordinal {} at position {i}",
                    phase.name, phase.ordinal
                ));
            }
            if i < session.current_phase && phase.status != PhaseStatus::Completed {
                return corrupt(format!(
                    "phase '{}' precedes the pointer but is {}",
                    phase.name, phase.status
                ));
            }
            if i > session.current_phase && phase.status != PhaseStatus::Pending {
                return corrupt(format!(
                    "phase '{}' follows the pointer but is {}",
                    phase.name, phase.status
                ));
            }
            if let Some(task) = phase.tasks.iter().find(|t| t.status == TaskStatus::InProgress) {
                return corrupt(format!("task '{}' was saved mid-dispatch", task.id));
            }
            let ids: BTreeSet<&str> = phase.tasks.iter().map(|t| t.id.as_str()).collect();
            if ids.len() != phase.tasks.len() {
                return corrupt(format!("phase '{}' has duplicate task ids", phase.name));
            }
            for task in &phase.tasks {
                if let Some(dep) = task.depends_on.iter().find(|d| !ids.contains(d.as_str())) {
                    return corrupt(format!("task '{}' references unknown task '{dep}'", task.id));
                }
            }
        }

        let ledger_used = self
            .ledger
            .reserved
            .values()
            .fold(0u64, |acc, v| acc.saturating_add(*v));
        if ledger_used != session.budget_consumed {
            return corrupt(format!(
                "ledger holds {ledger_used} units but session records {}",
                session.budget_consumed
            ));
        }
        let loaded: BTreeSet<&str> = self.ledger.loads.iter().map(|l| l.resource_id.as_str()).collect();
        let referenced: BTreeSet<&str> = session.loaded_resources.iter().map(String::as_str).collect();
        if loaded != referenced || loaded.len() != self.ledger.loads.len() {
            return corrupt("loaded resources disagree with the ledger".to_string());
        }
        if self.selector.current != session.policy {
            return corrupt(format!(
                "selector policy {} differs from session policy {}",
                self.selector.current, session.policy
            ));
        }
        Ok(())
    }
}

impl PhaseController {
    /// Capture the current session. Only taken between batches, so nothing
    /// is ever mid-dispatch.
    pub fn snapshot(&self) -> DomainResult<SessionSnapshot> {
        let session = self.session_ref()?;
        Ok(SessionSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: self.clock.now(),
            session: session.clone(),
            ledger: self.ledger.state().clone(),
            signals: self.signals.signals().copied().collect(),
            selector: self.selector.state(),
        })
    }

    /// Restore a saved session. A snapshot that fails validation is a
    /// structural fatal and leaves the controller without a session.
    pub fn resume(&mut self, snapshot: SessionSnapshot) -> DomainResult<&Session> {
        if let Err(err) = snapshot.validate() {
            self.session = None;
            return Err(err);
        }

        for phase in &snapshot.session.phases {
            self.resolver.validate_graph(&phase.name, &phase.tasks).map_err(|err| {
                OrchestrationError::CorruptedSnapshot(err.to_string())
            })?;
        }

        self.ledger = BudgetLedger::from_state(self.config.budget.clone(), snapshot.ledger);
        if self.ledger.used() > self.ledger.available() {
            return Err(OrchestrationError::CorruptedSnapshot(format!(
                "ledger usage {} exceeds available pool {}",
                self.ledger.used(),
                self.ledger.available()
            )));
        }
        self.signals = SignalAggregator::with_signals(self.config.signals.clone(), snapshot.signals);
        self.selector = PolicySelector::from_state(self.config.policy.clone(), snapshot.selector);
        self.in_flight.clear();
        self.threshold_events.clear();
        self.cancel = super::CancelHandle::default();

        let session = snapshot.session;
        info!(
            session_id = %session.id,
            phase = session.current_phase,
            status = %session.status,
            budget_used = session.budget_consumed,
            policy = session.policy.as_str(),
            "session resumed"
        );
        self.session = Some(session);
        self.session_ref()
    }
}
