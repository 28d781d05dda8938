//! Common test utilities for integration tests
//!
//! Provides a scripted work executor, store fixtures, a fixed plan source
//! and controller builders shared across the integration test files.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use conductor::domain::models::{
    ArtifactKind, BudgetConfig, Config, PhasePlan, Plan, Task, TaskSpec, WorkRequest,
};
use conductor::domain::ports::{
    ArtifactStore, CompletionEvent, ExecutorError, ManualClock, PlanSource, StoreError,
    WorkExecutor,
};
use conductor::infrastructure::stores::{InMemoryArtifactStore, InMemoryResourceStore};
use conductor::services::PhaseController;

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// What the scripted executor does for one dispatch.
#[derive(Debug, Clone)]
pub enum Step {
    Succeed,
    Fail { retryable: bool },
    Error(ExecutorError),
    /// Never completes; only a timeout or cancellation ends it.
    Hang,
    /// Succeed after a pause.
    Delay(Duration),
}

/// Executor driven by per-task scripts. Tasks without a script succeed.
#[derive(Default)]
pub struct ScriptedExecutor {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    log: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, task_id: &str, steps: impl IntoIterator<Item = Step>) -> Self {
        self.scripts
            .lock()
            .expect("scripts lock")
            .insert(task_id.to_string(), steps.into_iter().collect());
        self
    }

    /// Log entries `start:<id>` and `finish:<id>` in the order they happened.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().expect("log lock").clone()
    }

    /// Task ids in dispatch order.
    pub fn dispatched(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|e| e.strip_prefix("start:").map(ToString::to_string))
            .collect()
    }

    pub fn dispatch_count(&self, task_id: &str) -> usize {
        self.dispatched().iter().filter(|id| *id == task_id).count()
    }

    /// Highest number of tasks running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn next_step(&self, task_id: &str) -> Step {
        self.scripts
            .lock()
            .expect("scripts lock")
            .get_mut(task_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Step::Succeed)
    }

    fn record(&self, entry: String) {
        self.log.lock().expect("log lock").push(entry);
    }
}

#[async_trait]
impl WorkExecutor for ScriptedExecutor {
    async fn dispatch(&self, task: Task) -> Result<CompletionEvent, ExecutorError> {
        let step = self.next_step(&task.id);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        self.record(format!("start:{}", task.id));

        // Give siblings in the same batch a chance to start.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let result = match step {
            Step::Succeed => Ok(CompletionEvent::succeeded(task.id.clone())),
            Step::Fail { retryable } => Ok(CompletionEvent::failed(task.id.clone(), "scripted failure", retryable)),
            Step::Error(err) => Err(err),
            Step::Hang => std::future::pending().await,
            Step::Delay(pause) => {
                tokio::time::sleep(pause).await;
                Ok(CompletionEvent::succeeded(task.id.clone()))
            }
        };

        self.running.fetch_sub(1, Ordering::SeqCst);
        self.record(format!("finish:{}", task.id));
        result
    }
}

/// Plan source that always returns the same plan.
pub struct FixedPlanSource(pub Plan);

#[async_trait]
impl PlanSource for FixedPlanSource {
    async fn plan_for(&self, _request: &WorkRequest) -> Result<Option<Plan>, StoreError> {
        Ok(Some(self.0.clone()))
    }
}

/// Config sized for tests: a 100k pool, short task timeout.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.budget = BudgetConfig::with_available(100_000);
    config.scheduler.max_parallel = 4;
    config.scheduler.task_timeout_secs = 1;
    config.scheduler.max_attempts = 2;
    config
}

/// Fixed starting instant so snapshots and cooldowns are reproducible.
pub fn start_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).single().expect("valid timestamp")
}

pub fn complete_label(store: &InMemoryArtifactStore, label: &str) {
    store.add_all(label, &ArtifactKind::ALL);
}

/// Everything a controller test needs to poke at.
pub struct Harness {
    pub controller: PhaseController,
    pub executor: Arc<ScriptedExecutor>,
    pub artifacts: Arc<InMemoryArtifactStore>,
    pub resources: Arc<InMemoryResourceStore>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(config: Config, executor: ScriptedExecutor) -> Self {
        let executor = Arc::new(executor);
        let artifacts = Arc::new(InMemoryArtifactStore::new("memory-artifacts"));
        let resources = Arc::new(InMemoryResourceStore::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        let artifact_stores: Vec<Arc<dyn ArtifactStore>> = vec![artifacts.clone()];
        let controller = PhaseController::new(
            config,
            resources.clone(),
            artifact_stores,
            executor.clone(),
        )
        .with_clock(clock.clone());
        Self {
            controller,
            executor,
            artifacts,
            resources,
            clock,
        }
    }

    /// Harness whose controller decomposes every request into `plan`.
    pub fn with_plan(config: Config, executor: ScriptedExecutor, plan: Plan) -> Self {
        let mut harness = Self::new(config, executor);
        harness.controller = harness
            .controller
            .with_plan_source(Arc::new(FixedPlanSource(plan)));
        harness
    }
}

/// Single-phase plan.
pub fn one_phase(name: &str, tasks: Vec<TaskSpec>) -> Plan {
    Plan::new(vec![PhasePlan::new(name, tasks)])
}
