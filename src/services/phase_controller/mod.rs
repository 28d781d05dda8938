//! Phase Controller - the session orchestrator.
//!
//! Drives a request through its phases as a deterministic state machine.
//! The controller is the single writer over the session, the budget ledger
//! and the signal aggregator: dispatched work may run concurrently, but
//! every completion is applied by the controller's own loop, one at a time.
//!
//! - **decomposition**: request -> validated phases and task graphs
//! - **scheduling**: ready-task batching, dispatch, completion handling
//! - **checkpoint**: budget reservation, forced eviction, resource loads
//! - **remediation**: operator actions on a live or blocked session
//! - **reporting**: phase, blocked, failure and summary reports
//! - **snapshot**: suspend and resume

mod checkpoint;
mod decomposition;
mod remediation;
mod reporting;
mod scheduling;
mod snapshot;

pub use snapshot::{SessionSnapshot, SNAPSHOT_VERSION};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info};

use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::{
    Config, ControllerState, FailureReport, PhaseOutcome, PhaseStatus, PolicyDecision,
    RequestMarkers, ResourceTier, Session, SessionStatus, WorkRequest, WorkflowOutcome,
};
use crate::domain::ports::{ArtifactStore, Clock, PlanSource, ResourceStore, SystemClock, WorkExecutor};
use crate::services::budget_ledger::{BudgetLedger, ThresholdEvent};
use crate::services::dependency_resolver::DependencyResolver;
use crate::services::policy_selector::{PolicySelector, SelectionInput};
use crate::services::signal_aggregator::SignalAggregator;
use crate::services::traceability_validator::TraceabilityValidator;

#[derive(Debug, Default)]
struct CancelState {
    requested: AtomicBool,
    notify: Notify,
}

/// Cloneable handle that cancels the running workflow from another task.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelState>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
        // Stores a permit if the controller is not waiting yet.
        self.inner.notify.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    async fn cancelled(&self) {
        while !self.is_cancelled() {
            self.inner.notify.notified().await;
        }
    }
}

/// The phase controller.
pub struct PhaseController {
    config: Config,
    ledger: BudgetLedger,
    signals: SignalAggregator,
    selector: PolicySelector,
    validator: TraceabilityValidator,
    resolver: DependencyResolver,
    resources: Arc<dyn ResourceStore>,
    executor: Arc<dyn WorkExecutor>,
    plan_source: Option<Arc<dyn PlanSource>>,
    clock: Arc<dyn Clock>,
    session: Option<Session>,
    /// Reservations held by dispatched tasks, released on retry or block.
    in_flight: HashMap<String, (u64, ResourceTier)>,
    threshold_events: Vec<ThresholdEvent>,
    cancel: CancelHandle,
}

impl PhaseController {
    pub fn new(
        config: Config,
        resources: Arc<dyn ResourceStore>,
        artifact_stores: Vec<Arc<dyn ArtifactStore>>,
        executor: Arc<dyn WorkExecutor>,
    ) -> Self {
        let validator = TraceabilityValidator::new(artifact_stores)
            .with_required_documentation(config.traceability.require_documentation);
        Self {
            ledger: BudgetLedger::new(config.budget.clone()),
            signals: SignalAggregator::new(config.signals.clone()),
            selector: PolicySelector::new(config.policy.clone()),
            validator,
            resolver: DependencyResolver::new(),
            resources,
            executor,
            plan_source: None,
            clock: Arc::new(SystemClock),
            session: None,
            in_flight: HashMap::new(),
            threshold_events: Vec::new(),
            cancel: CancelHandle::default(),
            config,
        }
    }

    /// Use pre-decomposed plans when the source has one.
    pub fn with_plan_source(mut self, source: Arc<dyn PlanSource>) -> Self {
        self.plan_source = Some(source);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub const fn ledger(&self) -> &BudgetLedger {
        &self.ledger
    }

    pub const fn signals(&self) -> &SignalAggregator {
        &self.signals
    }

    pub const fn selector(&self) -> &PolicySelector {
        &self.selector
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Threshold crossings seen so far, in order.
    pub fn threshold_events(&self) -> &[ThresholdEvent] {
        &self.threshold_events
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    // ========================================================================
    // Workflow Lifecycle
    // ========================================================================

    /// Open a session for `request` and decompose it. Structural plan errors
    /// fail the session before any task is dispatched.
    pub async fn start(&mut self, request: WorkRequest) -> DomainResult<&Session> {
        let now = self.clock.now();
        let session = Session::new(request, now);
        info!(session_id = %session.id, description = %session.request.description, "session started");

        self.ledger.reset();
        self.signals.clear();
        self.in_flight.clear();
        self.threshold_events.clear();
        self.cancel = CancelHandle::default();
        self.session = Some(session);

        self.select_policy(None);
        self.set_state(ControllerState::Decomposing);

        let request = self.session_ref()?.request.clone();
        let phases = match self.decompose(&request).await {
            Ok(phases) => phases,
            Err(err) => return Err(self.fail(err)),
        };

        let session = self.session_mut()?;
        session.phases = phases;
        session.current_phase = 0;
        session.state = ControllerState::Scheduling;
        info!(
            session_id = %session.id,
            phases = session.phases.len(),
            "decomposition complete"
        );
        self.session_ref()
    }

    /// Start a session and drive it as far as it can go.
    pub async fn run(&mut self, request: WorkRequest) -> DomainResult<WorkflowOutcome> {
        self.start(request).await?;
        self.continue_workflow().await
    }

    /// Drive phases in declared order from the current pointer. Re-entering
    /// a blocked phase re-runs its ready tasks and its traceability gate.
    pub async fn continue_workflow(&mut self) -> DomainResult<WorkflowOutcome> {
        {
            let session = self.session_mut()?;
            if session.status.is_terminal() {
                return Err(OrchestrationError::SessionTerminal(session.status.to_string()));
            }
            session.status = SessionStatus::Active;
        }

        loop {
            let (index, total) = {
                let session = self.session_ref()?;
                (session.current_phase, session.phases.len())
            };
            if index >= total {
                break;
            }

            match self.run_phase(index).await? {
                PhaseOutcome::Completed(report) => {
                    let session = self.session_mut()?;
                    session.current_phase += 1;
                    info!(
                        session_id = %session.id,
                        phase = %report.phase,
                        tasks_completed = report.tasks_completed,
                        budget_consumed = report.budget_consumed,
                        findings_resolved = report.findings_resolved,
                        policy = report.policy.as_str(),
                        "phase completed"
                    );
                }
                PhaseOutcome::Blocked(report) => {
                    let session = self.session_mut()?;
                    session.status = SessionStatus::Blocked;
                    session.state = ControllerState::Scheduling;
                    info!(session_id = %session.id, blocked = %report, "session blocked");
                    return Ok(WorkflowOutcome::Blocked(report));
                }
                PhaseOutcome::Cancelled => {
                    return Ok(WorkflowOutcome::Cancelled(self.summary()?));
                }
            }
        }

        let now = self.clock.now();
        let session = self.session_mut()?;
        session.status = SessionStatus::Completed;
        session.state = ControllerState::Completed;
        session.touch(now);
        info!(session_id = %session.id, "workflow completed");
        Ok(WorkflowOutcome::Completed(self.summary()?))
    }

    // ========================================================================
    // Core State Machine Helpers
    // ========================================================================

    fn session_ref(&self) -> DomainResult<&Session> {
        self.session.as_ref().ok_or(OrchestrationError::NoActiveSession)
    }

    fn session_mut(&mut self) -> DomainResult<&mut Session> {
        self.session.as_mut().ok_or(OrchestrationError::NoActiveSession)
    }

    fn set_state(&mut self, state: ControllerState) {
        let now = self.clock.now();
        if let Some(session) = self.session.as_mut() {
            session.state = state;
            session.touch(now);
        }
    }

    /// Mirror ledger usage and loads into the session.
    fn sync_budget(&mut self) {
        let used = self.ledger.used();
        let loaded: Vec<String> = self.ledger.loads().iter().map(|l| l.resource_id.clone()).collect();
        if let Some(session) = self.session.as_mut() {
            session.budget_consumed = used;
            session.loaded_resources = loaded;
        }
    }

    /// Select a policy from the request markers and current classification.
    fn select_policy(&mut self, markers: Option<RequestMarkers>) -> Option<PolicyDecision> {
        let now = self.clock.now();
        let session = self.session.as_mut()?;
        let input = SelectionInput {
            markers: markers.unwrap_or(session.request.markers),
            project_mode: session.request.project_mode,
            classification: self.signals.classify(now),
        };
        let decision = self.selector.select(&input, now);
        session.policy = decision.policy;
        if decision.switched {
            session.stats.policy_switches += 1;
        }
        Some(decision)
    }

    /// Record a structural fatal on the session and hand the error back.
    fn fail(&mut self, err: OrchestrationError) -> OrchestrationError {
        let Some(reason) = err.failure_reason() else {
            return err;
        };
        let now = self.clock.now();
        if let Some(session) = self.session.as_mut() {
            let report = FailureReport {
                failing_state: session.state,
                reason,
                invariant: err.violated_invariant().to_string(),
                detail: err.to_string(),
            };
            error!(
                session_id = %session.id,
                failing_state = %report.failing_state,
                reason = %report.reason,
                invariant = %report.invariant,
                "session failed: {}",
                report.detail
            );
            let current = session.current_phase;
            if let Some(phase) = session.phases.get_mut(current) {
                phase.status = PhaseStatus::Failed;
            }
            session.status = SessionStatus::Failed;
            session.state = ControllerState::Failed;
            session.failure = Some(report);
            session.touch(now);
        }
        err
    }
}
