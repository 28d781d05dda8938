//! Integration tests for the phase controller: scheduling, remediation,
//! budget checkpoints, cancellation and snapshot resume.

mod common;

use std::time::Duration;

use common::{complete_label, one_phase, test_config, Harness, ScriptedExecutor, Step};
use conductor::domain::errors::OrchestrationError;
use conductor::domain::models::{
    ArtifactKind, ArtifactLocation, BlockReason, BlockedReason, FailureReason, LexicalMarker,
    PhasePlan, PhaseStatus, Plan, PolicyId, ProjectMode, RequestMarkers, ResourceTier,
    SessionStatus, SignalKind, SwitchSuppression, TaskSpec, TaskStatus, WorkRequest,
    WorkflowOutcome,
};
use conductor::domain::ports::ExecutorError;
use conductor::infrastructure::{load_snapshot, save_snapshot};
use conductor::services::{BudgetThreshold, LoadOutcome, SNAPSHOT_VERSION};

fn request() -> WorkRequest {
    WorkRequest::new("add login throttling")
}

fn task_status(harness: &Harness, id: &str) -> TaskStatus {
    harness
        .controller
        .session()
        .and_then(|s| s.find_task(id))
        .map(|(_, t)| t.status)
        .expect("task exists")
}

fn block_reason(harness: &Harness, id: &str) -> Option<BlockReason> {
    harness
        .controller
        .session()
        .and_then(|s| s.find_task(id))
        .and_then(|(_, t)| t.block_reason.clone())
}

fn position(log: &[String], entry: &str) -> usize {
    log.iter().position(|e| e == entry).expect("log entry present")
}

// ============================================================================
// Scheduling
// ============================================================================

#[tokio::test]
async fn test_parallel_tasks_share_a_batch_and_dependents_wait() {
    common::setup_test_logging();
    let plan = one_phase(
        "execute",
        vec![
            TaskSpec::new("T1", "schema").parallel(),
            TaskSpec::new("T2", "migration").after(["T1"]),
            TaskSpec::new("T3", "fixtures").parallel(),
        ],
    );
    let mut harness = Harness::with_plan(test_config(), ScriptedExecutor::new(), plan);

    let outcome = harness.controller.run(request()).await.unwrap();
    let WorkflowOutcome::Completed(summary) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };

    assert_eq!(summary.tasks_completed, 3);
    assert_eq!(harness.executor.peak_concurrency(), 2);
    let log = harness.executor.log();
    assert!(position(&log, "start:T2") > position(&log, "finish:T1"));
    assert!(position(&log, "start:T3") < position(&log, "finish:T1"));
}

#[tokio::test]
async fn test_phases_run_in_declared_order() {
    let plan = Plan::new(vec![
        PhasePlan::new("plan", vec![TaskSpec::new("P1", "outline")]),
        PhasePlan::new("execute", vec![TaskSpec::new("E1", "build")]),
        PhasePlan::new("synchronize", vec![TaskSpec::new("S1", "report")]),
    ]);
    let mut harness = Harness::with_plan(test_config(), ScriptedExecutor::new(), plan);

    let outcome = harness.controller.run(request()).await.unwrap();

    assert_eq!(harness.executor.dispatched(), vec!["P1", "E1", "S1"]);
    let WorkflowOutcome::Completed(summary) = outcome else {
        panic!("expected completion");
    };
    let phases: Vec<&str> = summary.reports.iter().map(|r| r.phase.as_str()).collect();
    assert_eq!(phases, vec!["plan", "execute", "synchronize"]);
    assert_eq!(summary.phases_completed, 3);
    assert_eq!(summary.phases_total, 3);
}

#[tokio::test]
async fn test_parallelism_cap_limits_batch_size() {
    let mut config = test_config();
    config.scheduler.max_parallel = 2;
    let tasks = (1..=5)
        .map(|i| TaskSpec::new(format!("T{i}"), "independent").parallel())
        .collect();
    let mut harness = Harness::with_plan(config, ScriptedExecutor::new(), one_phase("execute", tasks));

    harness.controller.run(request()).await.unwrap();

    assert_eq!(harness.executor.peak_concurrency(), 2);
    assert_eq!(harness.executor.dispatched().len(), 5);
}

#[tokio::test]
async fn test_sequential_dispatch_follows_graph_order() {
    // Graph order is V, M, U even though U is declared first.
    let plan = one_phase(
        "execute",
        vec![
            TaskSpec::new("U", "publish").after(["M"]),
            TaskSpec::new("V", "lint"),
            TaskSpec::new("M", "build"),
        ],
    );
    let executor = ScriptedExecutor::new()
        .script("V", [Step::Fail { retryable: false }, Step::Succeed])
        .script("U", [Step::Fail { retryable: false }, Step::Succeed]);
    let mut harness = Harness::with_plan(test_config(), executor, plan);

    let outcome = harness.controller.run(request()).await.unwrap();
    assert!(matches!(outcome, WorkflowOutcome::Blocked(_)));
    assert_eq!(harness.executor.dispatched(), vec!["V", "M", "U"]);

    // Both are ready again; V still ranks ahead of U.
    harness.controller.retry_task("U").unwrap();
    harness.controller.retry_task("V").unwrap();
    let outcome = harness.controller.continue_workflow().await.unwrap();

    assert!(matches!(outcome, WorkflowOutcome::Completed(_)));
    assert_eq!(harness.executor.dispatched(), vec!["V", "M", "U", "V", "U"]);
}

#[tokio::test]
async fn test_template_run_switches_policy_once_expertise_is_clear() {
    let mut harness = Harness::new(test_config(), ScriptedExecutor::new());

    let outcome = harness.controller.run(request()).await.unwrap();
    let WorkflowOutcome::Completed(summary) = outcome else {
        panic!("expected completion");
    };

    assert_eq!(summary.tasks_completed, 9);
    assert_eq!(summary.signals_emitted, 9);
    assert_eq!(summary.policy_switches, 1);
    assert_eq!(summary.active_policy, PolicyId::Efficiency);
    assert_eq!(summary.budget_used, 23_500);
    let policies: Vec<PolicyId> = summary.reports.iter().map(|r| r.policy).collect();
    assert_eq!(
        policies,
        vec![PolicyId::Mentor, PolicyId::Efficiency, PolicyId::Efficiency]
    );
}

#[tokio::test]
async fn test_unknown_phase_template_fails_before_dispatch() {
    let mut harness = Harness::new(test_config(), ScriptedExecutor::new());

    let err = harness
        .controller
        .run(request().with_phases(["plan", "deploy"]))
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestrationError::UnknownPhaseTemplate(ref p) if p == "deploy"));
    assert!(harness.executor.dispatched().is_empty());
    let session = harness.controller.session().unwrap();
    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(
        session.failure.as_ref().map(|f| f.reason),
        Some(FailureReason::UnknownPhaseTemplate)
    );
}

#[tokio::test]
async fn test_dependency_cycle_fails_before_any_dispatch() {
    let plan = Plan::new(vec![
        PhasePlan::new("plan", vec![TaskSpec::new("P1", "outline")]),
        PhasePlan::new(
            "execute",
            vec![
                TaskSpec::new("A", "a").after(["B"]),
                TaskSpec::new("B", "b").after(["A"]),
            ],
        ),
    ]);
    let mut harness = Harness::with_plan(test_config(), ScriptedExecutor::new(), plan);

    let err = harness.controller.run(request()).await.unwrap_err();

    assert!(matches!(err, OrchestrationError::DependencyCycle { ref phase, .. } if phase == "execute"));
    assert!(harness.executor.dispatched().is_empty());
    let session = harness.controller.session().unwrap();
    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(
        session.failure.as_ref().map(|f| f.reason),
        Some(FailureReason::DependencyCycle)
    );
}

// ============================================================================
// Failures, retries and remediation
// ============================================================================

#[tokio::test]
async fn test_retryable_failure_is_retried_then_completes() {
    let plan = one_phase("execute", vec![TaskSpec::new("T1", "flaky")]);
    let executor = ScriptedExecutor::new().script("T1", [Step::Fail { retryable: true }, Step::Succeed]);
    let mut harness = Harness::with_plan(test_config(), executor, plan);

    let outcome = harness.controller.run(request()).await.unwrap();
    let WorkflowOutcome::Completed(summary) = outcome else {
        panic!("expected completion");
    };

    assert_eq!(harness.executor.dispatch_count("T1"), 2);
    assert_eq!(summary.retries, 1);
    let signal = harness.controller.signals().signals().last().map(|s| s.kind);
    assert_eq!(signal, Some(SignalKind::SelfCorrection));
}

#[tokio::test]
async fn test_non_retryable_failure_blocks_until_operator_retry() {
    let plan = one_phase(
        "execute",
        vec![TaskSpec::new("T1", "compile"), TaskSpec::new("T2", "test").after(["T1"])],
    );
    let executor = ScriptedExecutor::new().script("T1", [Step::Fail { retryable: false }]);
    let mut harness = Harness::with_plan(test_config(), executor, plan);

    let outcome = harness.controller.run(request()).await.unwrap();
    let WorkflowOutcome::Blocked(report) = outcome else {
        panic!("expected a blocked phase");
    };
    let BlockedReason::Tasks { tasks } = &report.reason else {
        panic!("expected blocked tasks");
    };
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, "T1");
    assert_eq!(
        tasks[0].reason,
        BlockReason::ExecutionFailed {
            attempts: 1,
            reason: "scripted failure".to_string(),
        }
    );
    assert_eq!(task_status(&harness, "T2"), TaskStatus::Pending);
    assert_eq!(harness.controller.session().unwrap().status, SessionStatus::Blocked);
    assert!(harness.controller.blocked_report().is_some());

    harness.controller.retry_task("T1").unwrap();
    let outcome = harness.controller.continue_workflow().await.unwrap();

    assert!(matches!(outcome, WorkflowOutcome::Completed(_)));
    assert_eq!(harness.executor.dispatched(), vec!["T1", "T1", "T2"]);
}

#[tokio::test]
async fn test_retry_of_unknown_task_is_rejected() {
    let plan = one_phase("execute", vec![TaskSpec::new("T1", "compile")]);
    let executor = ScriptedExecutor::new().script("T1", [Step::Fail { retryable: false }]);
    let mut harness = Harness::with_plan(test_config(), executor, plan);
    harness.controller.run(request()).await.unwrap();

    let err = harness.controller.retry_task("T9").unwrap_err();
    assert!(matches!(err, OrchestrationError::TaskNotFound(ref id) if id == "T9"));
}

#[tokio::test]
async fn test_hanging_task_times_out_on_each_attempt() {
    let plan = one_phase("execute", vec![TaskSpec::new("T1", "stuck").cost(1_000, ResourceTier::Medium)]);
    let executor = ScriptedExecutor::new().script("T1", [Step::Hang, Step::Hang]);
    let mut harness = Harness::with_plan(test_config(), executor, plan);

    let outcome = harness.controller.run(request()).await.unwrap();

    assert!(matches!(outcome, WorkflowOutcome::Blocked(_)));
    assert_eq!(harness.executor.dispatch_count("T1"), 2);
    assert_eq!(
        block_reason(&harness, "T1"),
        Some(BlockReason::TimedOut {
            attempts: 2,
            timeout_secs: 1,
        })
    );
    assert_eq!(harness.controller.ledger().used(), 0);
}

#[tokio::test]
async fn test_unreachable_executor_aborts_siblings_and_releases_budget() {
    let plan = one_phase(
        "execute",
        vec![
            TaskSpec::new("T1", "remote").parallel().cost(1_000, ResourceTier::High),
            TaskSpec::new("T2", "local").parallel().cost(2_000, ResourceTier::Medium),
        ],
    );
    let executor = ScriptedExecutor::new()
        .script("T1", [Step::Error(ExecutorError::Unreachable("connection refused".into()))])
        .script("T2", [Step::Delay(Duration::from_millis(500))]);
    let mut harness = Harness::with_plan(test_config(), executor, plan);

    let err = harness.controller.run(request()).await.unwrap_err();

    assert!(matches!(err, OrchestrationError::ExecutorUnreachable(_)));
    assert_eq!(harness.controller.ledger().used(), 0);
    assert!(matches!(block_reason(&harness, "T2"), Some(BlockReason::Cancelled { .. })));
    let session = harness.controller.session().unwrap();
    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(
        session.failure.as_ref().map(|f| f.reason),
        Some(FailureReason::ExecutorUnreachable)
    );
    assert_eq!(session.phases[0].status, PhaseStatus::Failed);
}

// ============================================================================
// Traceability gate
// ============================================================================

#[tokio::test]
async fn test_missing_documentation_blocks_until_added() {
    let plan = Plan::new(vec![PhasePlan::new("synchronize", vec![TaskSpec::new("S1", "sync")])
        .with_labels(["AUTH-001"])]);
    let mut harness = Harness::with_plan(test_config(), ScriptedExecutor::new(), plan);
    harness.artifacts.add_all(
        "AUTH-001",
        &[ArtifactKind::Requirement, ArtifactKind::Verification, ArtifactKind::Implementation],
    );

    let outcome = harness.controller.run(request()).await.unwrap();
    let WorkflowOutcome::Blocked(report) = outcome else {
        panic!("expected a traceability block");
    };
    let BlockedReason::Traceability { findings } = &report.reason else {
        panic!("expected traceability findings");
    };
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].label, "AUTH-001");
    assert_eq!(findings[0].missing, vec![ArtifactKind::Documentation]);
    assert_eq!(task_status(&harness, "S1"), TaskStatus::Completed);

    harness.artifacts.add(
        "AUTH-001",
        ArtifactKind::Documentation,
        ArtifactLocation::at_line("docs/auth.md", 3),
    );
    let outcome = harness.controller.continue_workflow().await.unwrap();
    let WorkflowOutcome::Completed(summary) = outcome else {
        panic!("expected completion after adding docs");
    };

    assert_eq!(summary.reports[0].findings_resolved, 1);
    assert_eq!(harness.executor.dispatch_count("S1"), 1);
}

#[tokio::test]
async fn test_documentation_gap_is_advisory_when_not_required() {
    let mut config = test_config();
    config.traceability.require_documentation = false;
    let plan = Plan::new(vec![PhasePlan::new("synchronize", vec![TaskSpec::new("S1", "sync")])
        .with_labels(["AUTH-001"])]);
    let mut harness = Harness::with_plan(config, ScriptedExecutor::new(), plan);
    harness.artifacts.add_all(
        "AUTH-001",
        &[ArtifactKind::Requirement, ArtifactKind::Verification, ArtifactKind::Implementation],
    );

    let outcome = harness.controller.run(request()).await.unwrap();

    assert!(matches!(outcome, WorkflowOutcome::Completed(_)));
}

#[tokio::test]
async fn test_request_labels_gate_the_synchronize_phase() {
    let mut harness = Harness::new(test_config(), ScriptedExecutor::new());
    complete_label(&harness.artifacts, "AUTH-001");

    let outcome = harness
        .controller
        .run(request().with_labels(["AUTH-001", "AUTH-002"]))
        .await
        .unwrap();

    let WorkflowOutcome::Blocked(report) = outcome else {
        panic!("expected AUTH-002 to block");
    };
    assert_eq!(report.phase, "synchronize");
    let BlockedReason::Traceability { findings } = report.reason else {
        panic!("expected traceability findings");
    };
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].label, "AUTH-002");
    assert_eq!(findings[0].missing.len(), 4);
}

#[tokio::test]
async fn test_offline_artifact_store_is_fatal() {
    let plan = Plan::new(vec![PhasePlan::new("synchronize", vec![TaskSpec::new("S1", "sync")])
        .with_labels(["AUTH-001"])]);
    let mut harness = Harness::with_plan(test_config(), ScriptedExecutor::new(), plan);
    harness.artifacts.set_offline(true);

    let err = harness.controller.run(request()).await.unwrap_err();

    assert!(matches!(err, OrchestrationError::StoreUnreachable { ref store, .. } if store == "memory-artifacts"));
    assert_eq!(harness.controller.session().unwrap().status, SessionStatus::Failed);
}

// ============================================================================
// Budget
// ============================================================================

#[tokio::test]
async fn test_checkpoint_evicts_low_tier_resource_to_fit_task() {
    let mut config = test_config();
    config.budget = conductor::domain::models::BudgetConfig::with_available(10_000);
    let plan = one_phase("execute", vec![TaskSpec::new("T1", "big").cost(7_000, ResourceTier::High)]);
    let mut harness = Harness::with_plan(config, ScriptedExecutor::new(), plan);
    harness.resources.insert("guide", 3_000, ResourceTier::Low);
    harness.resources.insert("glossary", 2_000, ResourceTier::Critical);

    harness.controller.start(request()).await.unwrap();
    assert!(matches!(
        harness.controller.load_resource("guide").await.unwrap(),
        LoadOutcome::Loaded { .. }
    ));
    harness.controller.load_resource("glossary").await.unwrap();
    let outcome = harness.controller.continue_workflow().await.unwrap();

    let WorkflowOutcome::Completed(summary) = outcome else {
        panic!("expected completion after eviction");
    };
    assert_eq!(summary.evictions, 1);
    assert_eq!(summary.budget_used, 9_000);
    assert!(!harness.controller.ledger().is_loaded("guide"));
    assert!(harness.controller.ledger().is_loaded("glossary"));
    let thresholds: Vec<BudgetThreshold> = harness
        .controller
        .threshold_events()
        .iter()
        .map(|e| e.threshold)
        .collect();
    assert_eq!(thresholds, vec![BudgetThreshold::Warning]);
}

#[tokio::test]
async fn test_shortfall_blocks_task_until_operator_frees_budget() {
    let mut config = test_config();
    config.budget = conductor::domain::models::BudgetConfig::with_available(10_000);
    let plan = one_phase("execute", vec![TaskSpec::new("T1", "big").cost(9_000, ResourceTier::High)]);
    let mut harness = Harness::with_plan(config, ScriptedExecutor::new(), plan);
    harness.resources.insert("glossary", 2_000, ResourceTier::Critical);

    harness.controller.start(request()).await.unwrap();
    harness.controller.load_resource("glossary").await.unwrap();
    let outcome = harness.controller.continue_workflow().await.unwrap();

    assert!(matches!(outcome, WorkflowOutcome::Blocked(_)));
    assert!(harness.executor.dispatched().is_empty());
    assert_eq!(
        block_reason(&harness, "T1"),
        Some(BlockReason::BudgetShortfall {
            required: 9_000,
            shortfall: 1_000,
            tier: ResourceTier::High,
        })
    );

    assert!(harness.controller.evict_resource("glossary").unwrap().is_some());
    harness.controller.retry_task("T1").unwrap();
    let outcome = harness.controller.continue_workflow().await.unwrap();

    assert!(matches!(outcome, WorkflowOutcome::Completed(_)));
    assert_eq!(harness.controller.ledger().used(), 9_000);
}

#[tokio::test]
async fn test_repeat_load_refreshes_instead_of_charging_twice() {
    let mut harness = Harness::new(test_config(), ScriptedExecutor::new());
    harness.resources.insert("guide", 3_000, ResourceTier::Medium);
    harness.controller.start(request()).await.unwrap();

    harness.controller.load_resource("guide").await.unwrap();
    let second = harness.controller.load_resource("guide").await.unwrap();

    assert_eq!(second, LoadOutcome::Refreshed);
    assert_eq!(harness.controller.ledger().used(), 3_000);
    assert_eq!(harness.controller.session().unwrap().loaded_resources, vec!["guide"]);
}

#[tokio::test]
async fn test_missing_resource_is_not_fatal() {
    let mut harness = Harness::new(test_config(), ScriptedExecutor::new());
    harness.controller.start(request()).await.unwrap();

    let err = harness.controller.load_resource("nope").await.unwrap_err();

    assert!(matches!(err, OrchestrationError::ResourceNotFound(ref id) if id == "nope"));
    assert_eq!(harness.controller.session().unwrap().status, SessionStatus::Active);
}

#[tokio::test]
async fn test_offline_resource_store_fails_session() {
    let mut harness = Harness::new(test_config(), ScriptedExecutor::new());
    harness.controller.start(request()).await.unwrap();
    harness.resources.set_offline(true);

    let err = harness.controller.load_resource("guide").await.unwrap_err();

    assert!(matches!(err, OrchestrationError::StoreUnreachable { ref store, .. } if store == "memory"));
    assert_eq!(harness.controller.session().unwrap().status, SessionStatus::Failed);
}

// ============================================================================
// Policy
// ============================================================================

#[tokio::test]
async fn test_team_mode_selects_collaboration_at_start() {
    let plan = one_phase("execute", vec![TaskSpec::new("T1", "work")]);
    let mut harness = Harness::with_plan(test_config(), ScriptedExecutor::new(), plan);

    let session = harness
        .controller
        .start(request().with_project_mode(ProjectMode::Team))
        .await
        .unwrap();

    assert_eq!(session.policy, PolicyId::Collaboration);
    assert_eq!(session.stats.policy_switches, 1);
}

#[tokio::test]
async fn test_formal_command_outranks_team_mode() {
    let plan = one_phase("execute", vec![TaskSpec::new("T1", "work")]);
    let mut harness = Harness::with_plan(test_config(), ScriptedExecutor::new(), plan);
    let markers = RequestMarkers {
        formal_command: true,
        lexical: Some(LexicalMarker::Brevity),
    };

    let session = harness
        .controller
        .start(request().with_project_mode(ProjectMode::Team).with_markers(markers))
        .await
        .unwrap();

    assert_eq!(session.policy, PolicyId::ProjectManager);
}

#[tokio::test]
async fn test_reselection_respects_confidence_and_cooldown() {
    let plan = one_phase("execute", vec![TaskSpec::new("T1", "work")]);
    let mut harness = Harness::with_plan(test_config(), ScriptedExecutor::new(), plan);
    harness.controller.start(request()).await.unwrap();
    assert_eq!(harness.controller.session().unwrap().policy, PolicyId::Mentor);

    for kind in [SignalKind::DirectCommand, SignalKind::TechnicalPrecision, SignalKind::DirectCommand] {
        harness.controller.record_interaction(kind).unwrap();
    }
    let decision = harness.controller.reselect_policy(RequestMarkers::default()).unwrap();
    assert!(decision.switched);
    assert_eq!(decision.policy, PolicyId::Efficiency);

    for _ in 0..5 {
        harness.controller.record_interaction(SignalKind::RepeatedQuestion).unwrap();
    }
    let decision = harness.controller.reselect_policy(RequestMarkers::default()).unwrap();
    assert_eq!(decision.policy, PolicyId::Efficiency);
    assert!(matches!(decision.suppressed, Some(SwitchSuppression::LowConfidence { .. })));

    for _ in 0..15 {
        harness.controller.record_interaction(SignalKind::RepeatedQuestion).unwrap();
    }
    harness.clock.advance_secs(50);
    let decision = harness.controller.reselect_policy(RequestMarkers::default()).unwrap();
    assert_eq!(decision.candidate, PolicyId::Mentor);
    assert_eq!(decision.suppressed, Some(SwitchSuppression::Cooldown { remaining_secs: 250 }));

    harness.clock.advance_secs(300);
    let decision = harness.controller.reselect_policy(RequestMarkers::default()).unwrap();
    assert!(decision.switched);
    assert_eq!(decision.policy, PolicyId::Mentor);
    assert_eq!(harness.controller.session().unwrap().stats.policy_switches, 2);
    assert_eq!(harness.controller.session().unwrap().stats.signals_emitted, 23);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_handle_stops_running_batch() {
    let mut config = test_config();
    config.scheduler.task_timeout_secs = 30;
    let plan = one_phase(
        "execute",
        vec![
            TaskSpec::new("T1", "slow").cost(1_000, ResourceTier::Medium),
            TaskSpec::new("T2", "after").after(["T1"]),
        ],
    );
    let executor = ScriptedExecutor::new().script("T1", [Step::Hang]);
    let mut harness = Harness::with_plan(config, executor, plan);

    harness.controller.start(request()).await.unwrap();
    let handle = harness.controller.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel();
    });
    let outcome = harness.controller.continue_workflow().await.unwrap();

    let WorkflowOutcome::Cancelled(summary) = outcome else {
        panic!("expected cancellation, got {outcome:?}");
    };
    assert_eq!(summary.status, SessionStatus::Cancelled);
    assert_eq!(summary.tasks_blocked, 2);
    assert_eq!(summary.budget_used, 0);
    assert!(matches!(block_reason(&harness, "T1"), Some(BlockReason::Cancelled { .. })));

    let err = harness.controller.continue_workflow().await.unwrap_err();
    assert!(matches!(err, OrchestrationError::SessionTerminal(_)));
}

#[tokio::test]
async fn test_cancel_of_blocked_session_is_terminal() {
    let plan = one_phase(
        "execute",
        vec![TaskSpec::new("T1", "compile"), TaskSpec::new("T2", "test").after(["T1"])],
    );
    let executor = ScriptedExecutor::new().script("T1", [Step::Fail { retryable: false }]);
    let mut harness = Harness::with_plan(test_config(), executor, plan);
    harness.controller.run(request()).await.unwrap();

    let summary = harness.controller.cancel("operator gave up").unwrap();

    assert_eq!(summary.status, SessionStatus::Cancelled);
    assert_eq!(summary.tasks_blocked, 2);
    assert_eq!(
        block_reason(&harness, "T2"),
        Some(BlockReason::Cancelled {
            reason: "operator gave up".to_string(),
        })
    );
    let err = harness.controller.retry_task("T1").unwrap_err();
    assert!(matches!(err, OrchestrationError::SessionTerminal(_)));
}

// ============================================================================
// Snapshot and resume
// ============================================================================

fn blocking_plan() -> Plan {
    Plan::new(vec![
        PhasePlan::new("plan", vec![TaskSpec::new("P1", "outline").cost(1_000, ResourceTier::Medium)]),
        PhasePlan::new(
            "execute",
            vec![
                TaskSpec::new("E1", "compile").cost(2_000, ResourceTier::High),
                TaskSpec::new("E2", "test").after(["E1"]),
            ],
        ),
    ])
}

#[tokio::test]
async fn test_blocked_session_resumes_from_saved_snapshot() {
    let executor = ScriptedExecutor::new().script("E1", [Step::Fail { retryable: false }]);
    let mut harness = Harness::with_plan(test_config(), executor, blocking_plan());
    harness.resources.insert("guide", 500, ResourceTier::Low);
    harness.controller.start(request()).await.unwrap();
    harness.controller.load_resource("guide").await.unwrap();
    harness.controller.continue_workflow().await.unwrap();

    let snapshot = harness.controller.snapshot().unwrap();
    assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    assert_eq!(snapshot.session.current_phase, 1);
    snapshot.validate().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    save_snapshot(&path, &snapshot).await.unwrap();
    let loaded = load_snapshot(&path).await.unwrap();
    assert_eq!(loaded, snapshot);

    let mut resumed = Harness::with_plan(test_config(), ScriptedExecutor::new(), blocking_plan());
    let session = resumed.controller.resume(loaded).unwrap();
    assert_eq!(session.status, SessionStatus::Blocked);
    assert_eq!(resumed.controller.ledger().used(), 1_500);
    assert!(resumed.controller.ledger().is_loaded("guide"));

    resumed.controller.retry_task("E1").unwrap();
    let outcome = resumed.controller.continue_workflow().await.unwrap();

    let WorkflowOutcome::Completed(summary) = outcome else {
        panic!("expected completion after resume");
    };
    assert_eq!(summary.phases_completed, 2);
    assert_eq!(summary.budget_used, 3_500);
    assert_eq!(resumed.executor.dispatched(), vec!["E1", "E2"]);
}

#[tokio::test]
async fn test_resume_rejects_inconsistent_snapshots() {
    let executor = ScriptedExecutor::new().script("E1", [Step::Fail { retryable: false }]);
    let mut harness = Harness::with_plan(test_config(), executor, blocking_plan());
    harness.controller.run(request()).await.unwrap();
    let snapshot = harness.controller.snapshot().unwrap();

    let mut wrong_budget = snapshot.clone();
    wrong_budget.session.budget_consumed += 1;
    let mut wrong_version = snapshot.clone();
    wrong_version.version = SNAPSHOT_VERSION + 1;
    let mut wrong_pointer = snapshot.clone();
    wrong_pointer.session.current_phase = 5;
    let mut wrong_policy = snapshot;
    wrong_policy.selector.current = PolicyId::Collaboration;

    for corrupt in [wrong_budget, wrong_version, wrong_pointer, wrong_policy] {
        let mut fresh = Harness::new(test_config(), ScriptedExecutor::new());
        let err = fresh.controller.resume(corrupt).unwrap_err();
        assert!(matches!(err, OrchestrationError::CorruptedSnapshot(_)));
        assert!(fresh.controller.session().is_none());
    }
}

#[tokio::test]
async fn test_unparseable_snapshot_file_is_corrupted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = load_snapshot(&path).await.unwrap_err();

    assert!(matches!(err, OrchestrationError::CorruptedSnapshot(_)));
}
