//! `conductor snapshot`: inspect saved sessions.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use comfy_table::Cell;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::output::{
    colored, output, phase_status_color, table, task_status_color, truncate, CommandOutput,
};
use crate::domain::models::{ControllerState, PhaseStatus, PolicyId, SessionStatus, TaskStatus};
use crate::infrastructure::load_snapshot;
use crate::services::SessionSnapshot;

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub command: SnapshotCommands,
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommands {
    /// Show a saved session
    Show {
        /// Snapshot file written by `run --snapshot`
        file: PathBuf,

        /// List every task, not just the current phase's
        #[arg(long)]
        all_tasks: bool,
    },
}

#[derive(Debug, Serialize)]
pub struct TaskView {
    pub phase: String,
    pub id: String,
    pub description: String,
    pub status: TaskStatus,
    pub attempts: u32,
    pub blocked: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PhaseView {
    pub name: String,
    pub status: PhaseStatus,
    pub tasks_completed: usize,
    pub tasks_total: usize,
    pub budget_consumed: u64,
}

#[derive(Debug, Serialize)]
pub struct SnapshotOutput {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub session_id: String,
    pub description: String,
    pub status: SessionStatus,
    pub state: ControllerState,
    pub current_phase: Option<String>,
    pub policy: PolicyId,
    pub budget_used: u64,
    pub loaded_resources: Vec<String>,
    pub signals: usize,
    pub phases: Vec<PhaseView>,
    pub tasks: Vec<TaskView>,
    /// Why the snapshot cannot be resumed, if it cannot.
    pub problem: Option<String>,
}

impl SnapshotOutput {
    fn from_snapshot(snapshot: &SessionSnapshot, all_tasks: bool) -> Self {
        let session = &snapshot.session;
        let phases = session
            .phases
            .iter()
            .map(|p| PhaseView {
                name: p.name.clone(),
                status: p.status,
                tasks_completed: p.count_with(TaskStatus::Completed),
                tasks_total: p.tasks.len(),
                budget_consumed: p.budget_consumed,
            })
            .collect();
        let tasks = session
            .phases
            .iter()
            .enumerate()
            .filter(|(i, _)| all_tasks || *i == session.current_phase)
            .flat_map(|(_, p)| {
                p.tasks.iter().map(|t| TaskView {
                    phase: p.name.clone(),
                    id: t.id.clone(),
                    description: t.description.clone(),
                    status: t.status,
                    attempts: t.attempts,
                    blocked: t.block_reason.as_ref().map(ToString::to_string),
                })
            })
            .collect();

        Self {
            version: snapshot.version,
            saved_at: snapshot.saved_at,
            session_id: session.id.to_string(),
            description: session.request.description.clone(),
            status: session.status,
            state: session.state,
            current_phase: session.current().map(|p| p.name.clone()),
            policy: session.policy,
            budget_used: session.budget_consumed,
            loaded_resources: session.loaded_resources.clone(),
            signals: snapshot.signals.len(),
            phases,
            tasks,
            problem: snapshot.validate().err().map(|e| e.to_string()),
        }
    }
}

impl CommandOutput for SnapshotOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Session: {}", self.session_id),
            format!("Request: {}", self.description),
            format!("Status: {} ({})", self.status, self.state),
            format!("Current phase: {}", self.current_phase.as_deref().unwrap_or("-")),
            format!("Policy: {}", self.policy),
            format!("Budget used: {}", self.budget_used),
            format!("Signals buffered: {}", self.signals),
            format!("Saved: {} (format v{})", self.saved_at.to_rfc3339(), self.version),
        ];
        if !self.loaded_resources.is_empty() {
            lines.push(format!("Loaded: {}", self.loaded_resources.join(", ")));
        }

        let mut phases = table(["Phase", "Status", "Tasks", "Budget"]);
        for phase in &self.phases {
            phases.add_row(vec![
                Cell::new(&phase.name),
                colored(phase.status, phase_status_color(phase.status)),
                Cell::new(format!("{}/{}", phase.tasks_completed, phase.tasks_total)),
                Cell::new(phase.budget_consumed),
            ]);
        }
        lines.push(phases.to_string());

        if !self.tasks.is_empty() {
            let mut tasks = table(["Phase", "Task", "Description", "Status", "Attempts", "Blocked"]);
            for task in &self.tasks {
                tasks.add_row(vec![
                    Cell::new(&task.phase),
                    Cell::new(&task.id),
                    Cell::new(truncate(&task.description, 40)),
                    colored(task.status, task_status_color(task.status)),
                    Cell::new(task.attempts),
                    Cell::new(task.blocked.as_deref().unwrap_or("-")),
                ]);
            }
            lines.push(tasks.to_string());
        }

        match &self.problem {
            Some(problem) => lines.push(format!("Cannot resume: {problem}")),
            None if !self.status.is_terminal() => {
                lines.push("Resumable with `conductor run --resume`.".to_string());
            }
            None => lines.push(format!("Session is {}.", self.status)),
        }
        lines.join("\n")
    }
}

pub async fn execute(args: SnapshotArgs, json_mode: bool) -> Result<()> {
    match args.command {
        SnapshotCommands::Show { file, all_tasks } => {
            let snapshot = load_snapshot(&file)
                .await
                .with_context(|| format!("Failed to read snapshot {}", file.display()))?;
            let out = SnapshotOutput::from_snapshot(&snapshot, all_tasks);
            output(&out, json_mode);
        }
    }
    Ok(())
}
