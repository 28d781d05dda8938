//! Default per-phase task templates.
//!
//! Used when no plan source supplies a decomposition. Phase names are
//! matched case-insensitively; a few aliases map onto the canonical three.

use crate::domain::models::{PhasePlan, ResourceTier, TaskSpec};

/// Canonical template name for `phase`, resolving aliases.
pub fn canonical_phase(phase: &str) -> Option<&'static str> {
    match phase.trim().to_lowercase().as_str() {
        "plan" | "planning" => Some("plan"),
        "execute" | "run" | "implement" => Some("execute"),
        "synchronize" | "sync" => Some("synchronize"),
        _ => None,
    }
}

/// Template tasks for `phase`, or `None` when no template exists.
pub fn template_for(phase: &str) -> Option<PhasePlan> {
    let canonical = canonical_phase(phase)?;
    let tasks = match canonical {
        "plan" => plan_tasks(),
        "execute" => execute_tasks(),
        _ => synchronize_tasks(),
    };
    Some(PhasePlan::new(phase.trim(), tasks))
}

fn plan_tasks() -> Vec<TaskSpec> {
    vec![
        TaskSpec::new("analyze", "Analyze the request and existing code")
            .active("Analyzing the request")
            .cost(2_000, ResourceTier::Medium),
        TaskSpec::new("requirements", "Write requirements for each work item")
            .active("Writing requirements")
            .after(["analyze"])
            .cost(3_000, ResourceTier::High),
        TaskSpec::new("acceptance", "Define acceptance criteria")
            .active("Defining acceptance criteria")
            .after(["requirements"])
            .cost(1_500, ResourceTier::Medium),
    ]
}

// Red, green, refactor.
fn execute_tasks() -> Vec<TaskSpec> {
    vec![
        TaskSpec::new("red", "Write failing tests")
            .active("Writing failing tests")
            .cost(4_000, ResourceTier::High),
        TaskSpec::new("green", "Implement until the tests pass")
            .active("Implementing")
            .after(["red"])
            .cost(6_000, ResourceTier::High),
        TaskSpec::new("refactor", "Refactor with the tests green")
            .active("Refactoring")
            .after(["green"])
            .cost(2_000, ResourceTier::Medium),
    ]
}

fn synchronize_tasks() -> Vec<TaskSpec> {
    vec![
        TaskSpec::new("docs", "Update documentation")
            .active("Updating documentation")
            .cost(2_500, ResourceTier::Low)
            .parallel(),
        TaskSpec::new("verify-tags", "Verify traceability tags")
            .active("Verifying traceability tags")
            .cost(1_500, ResourceTier::Medium)
            .parallel(),
        TaskSpec::new("sync-report", "Write the sync report")
            .active("Writing the sync report")
            .after(["docs", "verify-tags"])
            .cost(1_000, ResourceTier::Low),
    ]
}
