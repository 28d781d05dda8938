//! Scheduling and execution of a single phase.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use super::PhaseController;
use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::{
    BlockReason, BlockedReason, BlockedReport, ControllerState, PhaseOutcome, PhaseStatus, SignalKind,
    TaskStatus,
};
use crate::domain::ports::{CompletionEvent, CompletionStatus, ExecutorError};
use crate::services::traceability_validator::ValidatorError;

/// What a worker reports back to the controller loop.
#[derive(Debug)]
pub(super) enum WorkerOutcome {
    Completed(CompletionEvent),
    TimedOut,
    Unreachable(String),
}

#[derive(Debug)]
struct WorkerReport {
    task_id: String,
    outcome: WorkerOutcome,
}

enum BatchEnd {
    Drained,
    Cancelled,
}

impl PhaseController {
    /// Run phase `index` until it completes, blocks or is cancelled.
    pub(super) async fn run_phase(&mut self, index: usize) -> DomainResult<PhaseOutcome> {
        self.begin_phase(index)?;

        loop {
            if self.cancel.is_cancelled() {
                self.cancel_session("cancelled by operator");
                return Ok(PhaseOutcome::Cancelled);
            }

            let batch = self.next_batch(index)?;
            if batch.is_empty() {
                break;
            }

            let dispatchable = self.reserve_batch(index, &batch)?;
            if dispatchable.is_empty() {
                continue;
            }

            if let BatchEnd::Cancelled = self.dispatch_batch(index, dispatchable).await? {
                self.cancel_session("cancelled by operator");
                return Ok(PhaseOutcome::Cancelled);
            }
        }

        self.settle_phase(index).await
    }

    fn begin_phase(&mut self, index: usize) -> DomainResult<()> {
        let now = self.clock.now();
        let session = self.session_mut()?;
        let session_id = session.id;
        let phase = session
            .phases
            .get_mut(index)
            .ok_or_else(|| OrchestrationError::CorruptedSnapshot(format!("no phase at index {index}")))?;
        phase.activate(now);
        info!(session_id = %session_id, phase = %phase.name, ordinal = phase.ordinal, "phase active");

        self.set_state(ControllerState::Scheduling);
        if let Some(decision) = self.select_policy(None) {
            debug!(policy = decision.policy.as_str(), switched = decision.switched, "policy at phase start");
        }
        Ok(())
    }

    /// Ready tasks to dispatch together, in graph order. A parallelizable
    /// head pulls in every other ready parallelizable task up to the
    /// parallelism cap; otherwise the head runs alone.
    fn next_batch(&self, index: usize) -> DomainResult<Vec<String>> {
        let session = self.session_ref()?;
        let Some(phase) = session.phases.get(index) else {
            return Ok(Vec::new());
        };
        let ready: HashSet<String> = phase.ready_task_ids().into_iter().collect();
        if ready.is_empty() {
            return Ok(Vec::new());
        }
        let ready: Vec<String> = self
            .resolver
            .topological_sort(&phase.name, &phase.tasks)?
            .into_iter()
            .filter(|id| ready.contains(id))
            .collect();
        let Some(head) = ready.first() else {
            return Ok(Vec::new());
        };

        let head_parallel = phase.task(head).is_some_and(|t| t.parallelizable);
        if !head_parallel {
            return Ok(vec![head.clone()]);
        }
        Ok(ready
            .into_iter()
            .filter(|id| phase.task(id).is_some_and(|t| t.parallelizable))
            .take(self.config.scheduler.max_parallel.max(1))
            .collect())
    }

    async fn dispatch_batch(&mut self, index: usize, ids: Vec<String>) -> DomainResult<BatchEnd> {
        self.set_state(ControllerState::Executing);
        let now = self.clock.now();
        let deadline = Duration::from_secs(self.config.scheduler.task_timeout_secs);
        let (tx, mut rx) = mpsc::channel::<WorkerReport>(ids.len().max(1));
        let mut handles: BTreeMap<String, JoinHandle<()>> = BTreeMap::new();

        for id in ids {
            let task = {
                let session = self.session_mut()?;
                let session_id = session.id;
                let task = session
                    .phases
                    .get_mut(index)
                    .and_then(|p| p.task_mut(&id))
                    .ok_or_else(|| OrchestrationError::TaskNotFound(id.clone()))?;
                task.transition_to(TaskStatus::InProgress, now)?;
                info!(
                    session_id = %session_id,
                    task_id = %task.id,
                    attempt = task.attempts,
                    activity = %task.active_form,
                    "task dispatched"
                );
                task.clone()
            };

            let executor = Arc::clone(&self.executor);
            let tx = tx.clone();
            let task_id = id.clone();
            let handle = tokio::spawn(async move {
                let outcome = match timeout(deadline, executor.dispatch(task)).await {
                    Ok(Ok(event)) => WorkerOutcome::Completed(event),
                    Ok(Err(ExecutorError::Failed(reason))) => {
                        WorkerOutcome::Completed(CompletionEvent::failed(task_id.clone(), reason, true))
                    }
                    Ok(Err(ExecutorError::Unreachable(reason))) => WorkerOutcome::Unreachable(reason),
                    Err(_) => WorkerOutcome::TimedOut,
                };
                // Receiver only goes away when the batch was abandoned.
                let _ = tx.send(WorkerReport { task_id, outcome }).await;
            });
            handles.insert(id, handle);
        }
        drop(tx);

        let cancel = self.cancel.clone();
        while !handles.is_empty() {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                report = rx.recv() => Some(report),
            };

            match next {
                None => {
                    handles.values().for_each(JoinHandle::abort);
                    return Ok(BatchEnd::Cancelled);
                }
                Some(None) => {
                    // Every sender is gone: the remaining workers died silently.
                    let lost: Vec<String> = std::mem::take(&mut handles).into_keys().collect();
                    for task_id in lost {
                        let event = CompletionEvent::failed(task_id.clone(), "worker exited without reporting", true);
                        self.apply_outcome(index, &task_id, WorkerOutcome::Completed(event))?;
                    }
                }
                Some(Some(report)) => {
                    handles.remove(&report.task_id);
                    if let WorkerOutcome::Unreachable(reason) = report.outcome {
                        handles.values().for_each(JoinHandle::abort);
                        let siblings: Vec<String> = handles.into_keys().collect();
                        self.abort_batch(index, &report.task_id, &siblings, &reason);
                        return Err(self.fail(OrchestrationError::ExecutorUnreachable(reason)));
                    }
                    self.apply_outcome(index, &report.task_id, report.outcome)?;
                }
            }
        }

        self.set_state(ControllerState::Scheduling);
        Ok(BatchEnd::Drained)
    }

    /// Apply one completion atomically: task status, budget, signal.
    pub(super) fn apply_outcome(&mut self, index: usize, task_id: &str, outcome: WorkerOutcome) -> DomainResult<()> {
        let now = self.clock.now();
        let max_attempts = self.config.scheduler.max_attempts;
        let timeout_secs = self.config.scheduler.task_timeout_secs;
        let reservation = self.in_flight.remove(task_id);

        let session = self.session.as_mut().ok_or(OrchestrationError::NoActiveSession)?;
        let session_id = session.id;
        let phase = session
            .phases
            .get_mut(index)
            .ok_or_else(|| OrchestrationError::TaskNotFound(task_id.to_string()))?;
        let task = phase
            .task_mut(task_id)
            .ok_or_else(|| OrchestrationError::TaskNotFound(task_id.to_string()))?;

        let (retryable, failure) = match outcome {
            WorkerOutcome::Completed(event) => match event.status {
                CompletionStatus::Succeeded => {
                    task.transition_to(TaskStatus::Completed, now)?;
                    let signal = if task.was_retried() {
                        SignalKind::SelfCorrection
                    } else {
                        SignalKind::SmoothCompletion
                    };
                    info!(
                        session_id = %session_id,
                        task_id,
                        attempts = task.attempts,
                        signal = signal.as_str(),
                        "task completed"
                    );
                    phase.budget_consumed += reservation.map_or(0, |(amount, _)| amount);
                    self.signals.record(signal, now);
                    session.stats.signals_emitted += 1;
                    return Ok(());
                }
                CompletionStatus::Failed { reason } => (event.retryable, BlockReason::ExecutionFailed {
                    attempts: task.attempts,
                    reason,
                }),
            },
            WorkerOutcome::TimedOut => (true, BlockReason::TimedOut {
                attempts: task.attempts,
                timeout_secs,
            }),
            WorkerOutcome::Unreachable(reason) => (false, BlockReason::ExecutionFailed {
                attempts: task.attempts,
                reason,
            }),
        };

        if let Some((amount, tier)) = reservation {
            self.ledger.release_from(amount, tier);
        }

        if retryable && task.attempts < max_attempts {
            warn!(session_id = %session_id, task_id, attempt = task.attempts, %failure, "task failed, retrying");
            task.transition_to(TaskStatus::Pending, now)?;
            session.stats.retries += 1;
        } else {
            warn!(session_id = %session_id, task_id, %failure, "task blocked");
            task.block(failure, now)?;
        }
        self.sync_budget();
        Ok(())
    }

    /// Fatal executor failure mid-batch: block the failing task, cancel its
    /// siblings and give back every reservation they held.
    fn abort_batch(&mut self, index: usize, failed: &str, siblings: &[String], reason: &str) {
        let now = self.clock.now();
        let mut released = Vec::new();
        for id in std::iter::once(failed).chain(siblings.iter().map(String::as_str)) {
            if let Some(reservation) = self.in_flight.remove(id) {
                released.push(reservation);
            }
        }
        for (amount, tier) in released {
            self.ledger.release_from(amount, tier);
        }

        if let Some(phase) = self.session.as_mut().and_then(|s| s.phases.get_mut(index)) {
            if let Some(task) = phase.task_mut(failed) {
                let attempts = task.attempts;
                let blocked = task.block(
                    BlockReason::ExecutionFailed {
                        attempts,
                        reason: reason.to_string(),
                    },
                    now,
                );
                if let Err(e) = blocked {
                    warn!(task = failed, error = %e, "could not block failed task");
                }
            }
            for id in siblings {
                if let Some(task) = phase.task_mut(id) {
                    let blocked = task.block(
                        BlockReason::Cancelled {
                            reason: format!("aborted after fatal error: {reason}"),
                        },
                        now,
                    );
                    if let Err(e) = blocked {
                        warn!(task = %id, error = %e, "could not cancel sibling task");
                    }
                }
            }
        }
        warn!(failed, siblings = siblings.len(), "batch aborted");
        self.sync_budget();
    }

    /// No ready tasks left: block on tasks, block on traceability, or close.
    async fn settle_phase(&mut self, index: usize) -> DomainResult<PhaseOutcome> {
        let (name, labels, tasks_done) = {
            let session = self.session_ref()?;
            let phase = session
                .phases
                .get(index)
                .ok_or_else(|| OrchestrationError::CorruptedSnapshot(format!("no phase at index {index}")))?;
            (phase.name.clone(), phase.artifact_labels(), phase.all_tasks_completed())
        };

        if !tasks_done {
            let report = self.blocked_tasks_report(index)?;
            if let Some(phase) = self.session_mut()?.phases.get_mut(index) {
                phase.status = PhaseStatus::Blocked;
            }
            return Ok(PhaseOutcome::Blocked(report));
        }

        debug!(phase = %name, labels = labels.len(), "running traceability gate");
        let report = match self.validator.validate(&labels).await {
            Ok(report) => report,
            Err(ValidatorError::StoreUnreachable {
                store,
                label,
                kind,
                reason,
            }) => {
                return Err(self.fail(OrchestrationError::StoreUnreachable {
                    store,
                    reason: format!("{reason} (looking up {kind} for {label})"),
                }));
            }
            Err(ValidatorError::IndexUnreachable { store, reason }) => {
                return Err(self.fail(OrchestrationError::StoreUnreachable { store, reason }));
            }
        };

        for advisory in &report.advisories {
            warn!(phase = %name, label = %advisory.label, "documentation missing (advisory)");
        }

        let now = self.clock.now();
        let session = self.session_mut()?;
        let phase = session
            .phases
            .get_mut(index)
            .ok_or_else(|| OrchestrationError::CorruptedSnapshot(format!("no phase at index {index}")))?;

        if !report.is_clean() {
            for finding in &report.incomplete {
                warn!(phase = %name, %finding, "traceability incomplete");
            }
            phase.block_on_findings(report.incomplete.clone());
            return Ok(PhaseOutcome::Blocked(BlockedReport {
                phase: name,
                reason: BlockedReason::Traceability {
                    findings: report.incomplete,
                },
            }));
        }

        phase.resolve_findings();
        phase.complete(now)?;
        phase.completed_policy = Some(session.policy);
        Ok(PhaseOutcome::Completed(self.phase_report(index)?))
    }
}
