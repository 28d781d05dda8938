//! `conductor run`: drive a request through its phases.

use anyhow::{bail, Context, Result};
use clap::Args;
use comfy_table::{Cell, Color};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::output::{colored, output, session_status_color, table, CommandOutput};
use crate::domain::models::{
    BlockedReason, Config, LexicalMarker, ProjectMode, RequestMarkers, WorkRequest,
    WorkflowOutcome,
};
use crate::domain::ports::ArtifactStore;
use crate::infrastructure::stores::{FsArtifactStore, FsResourceStore};
use crate::infrastructure::{load_snapshot, save_snapshot, DryRunExecutor, YamlPlanSource};
use crate::services::{LoadOutcome, PhaseController, ThresholdEvent};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// What the session should accomplish (omit with --resume)
    pub description: Option<String>,

    /// YAML plan with pre-decomposed phases and tasks
    #[arg(short, long)]
    pub plan: Option<PathBuf>,

    /// Phase names, in order (default: plan, execute, synchronize)
    #[arg(long = "phase", value_name = "PHASE")]
    pub phases: Vec<String>,

    /// Traceability label the request must satisfy (repeatable)
    #[arg(short, long)]
    pub label: Vec<String>,

    /// Root scanned for @SPEC/@TEST/@CODE/@DOC tags
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Resource to load into context before the first phase (repeatable)
    #[arg(long = "load", value_name = "RESOURCE")]
    pub load: Vec<String>,

    /// Treat the project as a team project
    #[arg(long)]
    pub team: bool,

    /// The request is a formal structured command
    #[arg(long)]
    pub formal: bool,

    /// The request asks for brevity
    #[arg(long, conflicts_with = "explain")]
    pub brief: bool,

    /// The request asks for explanation
    #[arg(long)]
    pub explain: bool,

    /// Write the session to this file when the run stops
    #[arg(short, long)]
    pub snapshot: Option<PathBuf>,

    /// Continue a session saved with --snapshot
    #[arg(long, conflicts_with_all = ["description", "plan"])]
    pub resume: Option<PathBuf>,
}

impl RunArgs {
    /// `--team` overrides the configured project mode.
    fn request(&self, description: String, configured_mode: ProjectMode) -> WorkRequest {
        let lexical = if self.brief {
            Some(LexicalMarker::Brevity)
        } else if self.explain {
            Some(LexicalMarker::Explanation)
        } else {
            None
        };
        let mode = if self.team {
            ProjectMode::Team
        } else {
            configured_mode
        };
        let mut request = WorkRequest::new(description)
            .with_labels(self.label.iter().cloned())
            .with_markers(RequestMarkers {
                formal_command: self.formal,
                lexical,
            })
            .with_project_mode(mode);
        if !self.phases.is_empty() {
            request = request.with_phases(self.phases.iter().cloned());
        }
        request
    }
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub session_id: String,
    #[serde(flatten)]
    pub outcome: WorkflowOutcome,
    pub threshold_events: Vec<ThresholdEvent>,
    pub snapshot: Option<PathBuf>,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("Session {}", self.session_id)];

        match &self.outcome {
            WorkflowOutcome::Completed(summary) | WorkflowOutcome::Cancelled(summary) => {
                let mut t = table(["Field", "Value"]);
                t.add_row(vec![
                    Cell::new("Status"),
                    colored(summary.status, session_status_color(summary.status)),
                ]);
                t.add_row(vec![
                    Cell::new("Phases"),
                    Cell::new(format!("{}/{}", summary.phases_completed, summary.phases_total)),
                ]);
                t.add_row(vec![Cell::new("Tasks completed"), Cell::new(summary.tasks_completed)]);
                t.add_row(vec![Cell::new("Tasks blocked"), Cell::new(summary.tasks_blocked)]);
                t.add_row(vec![Cell::new("Retries"), Cell::new(summary.retries)]);
                t.add_row(vec![
                    Cell::new("Budget"),
                    Cell::new(format!("{} / {}", summary.budget_used, summary.budget_available)),
                ]);
                t.add_row(vec![Cell::new("Evictions"), Cell::new(summary.evictions)]);
                t.add_row(vec![Cell::new("Policy"), Cell::new(summary.active_policy)]);
                t.add_row(vec![Cell::new("Policy switches"), Cell::new(summary.policy_switches)]);
                t.add_row(vec![Cell::new("Duration (s)"), Cell::new(summary.duration_secs)]);
                lines.push(t.to_string());

                if !summary.reports.is_empty() {
                    let mut phases = table(["Phase", "Tasks", "Budget", "Findings resolved", "Policy"]);
                    for report in &summary.reports {
                        phases.add_row(vec![
                            Cell::new(&report.phase),
                            Cell::new(report.tasks_completed),
                            Cell::new(report.budget_consumed),
                            Cell::new(report.findings_resolved),
                            Cell::new(report.policy),
                        ]);
                    }
                    lines.push(phases.to_string());
                }
            }
            WorkflowOutcome::Blocked(report) => {
                lines.push(format!("Blocked in phase '{}'", report.phase));
                match &report.reason {
                    BlockedReason::Tasks { tasks } => {
                        let mut t = table(["Task", "Reason"]);
                        for task in tasks {
                            t.add_row(vec![Cell::new(&task.id), colored(&task.reason, Color::Magenta)]);
                        }
                        lines.push(t.to_string());
                    }
                    BlockedReason::Traceability { findings } => {
                        let mut t = table(["Label", "Missing", "Found"]);
                        for finding in findings {
                            let missing: Vec<&str> = finding.missing.iter().map(|k| k.as_str()).collect();
                            let found: Vec<&str> = finding.found.iter().map(|k| k.as_str()).collect();
                            t.add_row(vec![
                                Cell::new(&finding.label),
                                colored(missing.join(", "), Color::Red),
                                Cell::new(found.join(", ")),
                            ]);
                        }
                        lines.push(t.to_string());
                    }
                }
            }
        }

        for event in &self.threshold_events {
            lines.push(format!(
                "Budget {} threshold crossed at {:.1}% ({} / {})",
                event.threshold.as_str(),
                event.usage_percent,
                event.used,
                event.available
            ));
        }
        if let Some(path) = &self.snapshot {
            lines.push(format!("Snapshot written to {}", path.display()));
        }
        lines.join("\n")
    }
}

fn build_controller(config: &Config, args: &RunArgs) -> Result<PhaseController> {
    let root = args
        .root
        .clone()
        .unwrap_or_else(|| config.traceability.artifact_root.clone());
    let artifacts = FsArtifactStore::new(root).context("Failed to build artifact store")?;
    let resources = FsResourceStore::new(config.project.resource_root.clone());

    let artifact_stores: Vec<Arc<dyn ArtifactStore>> = vec![Arc::new(artifacts)];
    let mut controller = PhaseController::new(
        config.clone(),
        Arc::new(resources),
        artifact_stores,
        Arc::new(DryRunExecutor::new()),
    );
    if let Some(plan) = &args.plan {
        controller = controller.with_plan_source(Arc::new(YamlPlanSource::new(plan)));
    }
    Ok(controller)
}

/// Attach the recorded failure report, if any, to a controller error.
fn with_failure(controller: &PhaseController, err: crate::domain::OrchestrationError) -> anyhow::Error {
    match controller.session().and_then(|s| s.failure.as_ref()) {
        Some(report) => anyhow::Error::new(err).context(report.to_string()),
        None => anyhow::Error::new(err),
    }
}

pub async fn execute(args: RunArgs, config: Config, json_mode: bool) -> Result<()> {
    let mut controller = build_controller(&config, &args)?;

    if let Some(path) = &args.resume {
        let snapshot = load_snapshot(path)
            .await
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        controller
            .resume(snapshot)
            .context("Snapshot cannot be resumed")?;
    } else {
        let Some(description) = args.description.clone() else {
            bail!("A request description is required unless --resume is given");
        };
        let request = args.request(description, config.project.mode);
        if let Err(err) = controller.start(request).await {
            return Err(with_failure(&controller, err));
        }
        for resource in &args.load {
            let outcome = controller
                .load_resource(resource)
                .await
                .with_context(|| format!("Failed to load resource '{resource}'"))?;
            if let LoadOutcome::Denied { reservation } = outcome {
                tracing::warn!(
                    resource_id = %resource,
                    shortfall = reservation.shortfall,
                    "resource skipped: budget exhausted"
                );
            }
        }
    }

    let outcome = match controller.continue_workflow().await {
        Ok(outcome) => outcome,
        Err(err) => return Err(with_failure(&controller, err)),
    };

    if let Some(path) = &args.snapshot {
        let snapshot = controller.snapshot()?;
        save_snapshot(path, &snapshot)
            .await
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
    }

    let session_id = controller
        .session()
        .map(|s| s.id.to_string())
        .unwrap_or_default();
    let out = RunOutput {
        session_id,
        outcome,
        threshold_events: controller.threshold_events().to_vec(),
        snapshot: args.snapshot.clone(),
    };
    output(&out, json_mode);
    Ok(())
}
