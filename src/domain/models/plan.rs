//! Work requests and pre-decomposed plans.

use serde::{Deserialize, Serialize};

use super::policy::{ProjectMode, RequestMarkers};
use super::resource::ResourceTier;

/// Phase names used when a request does not list its own.
pub const DEFAULT_PHASES: [&str; 3] = ["plan", "execute", "synchronize"];

/// A request entering the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRequest {
    pub description: String,
    /// Ordered phase names.
    #[serde(default = "default_phases")]
    pub phases: Vec<String>,
    /// Traceability labels the request is accountable for.
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub markers: RequestMarkers,
    #[serde(default)]
    pub project_mode: ProjectMode,
}

fn default_phases() -> Vec<String> {
    DEFAULT_PHASES.iter().map(ToString::to_string).collect()
}

impl WorkRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            phases: default_phases(),
            labels: Vec::new(),
            markers: RequestMarkers::default(),
            project_mode: ProjectMode::default(),
        }
    }

    pub fn with_phases<I, S>(mut self, phases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phases = phases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_markers(mut self, markers: RequestMarkers) -> Self {
        self.markers = markers;
        self
    }

    pub fn with_project_mode(mut self, mode: ProjectMode) -> Self {
        self.project_mode = mode;
        self
    }
}

/// Declared task inside a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub active_form: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub cost: u64,
    #[serde(default)]
    pub tier: ResourceTier,
    #[serde(default)]
    pub parallelizable: bool,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl TaskSpec {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            active_form: None,
            depends_on: Vec::new(),
            cost: 0,
            tier: ResourceTier::default(),
            parallelizable: false,
            labels: Vec::new(),
        }
    }

    pub fn active(mut self, active_form: impl Into<String>) -> Self {
        self.active_form = Some(active_form.into());
        self
    }

    pub fn after<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn cost(mut self, cost: u64, tier: ResourceTier) -> Self {
        self.cost = cost;
        self.tier = tier;
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallelizable = true;
        self
    }

    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }
}

/// Inclusive estimate of what a phase will consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min: u64,
    pub max: u64,
}

impl BudgetRange {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// Range spanning the sum of the given task costs.
    pub fn from_costs(costs: impl IntoIterator<Item = u64>) -> Self {
        let total = costs.into_iter().fold(0u64, u64::saturating_add);
        Self { min: total, max: total }
    }
}

/// One phase of a pre-decomposed plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhasePlan {
    pub name: String,
    #[serde(default)]
    pub budget_estimate: Option<BudgetRange>,
    /// Labels validated at this phase's gate in addition to task labels.
    #[serde(default)]
    pub labels: Vec<String>,
    pub tasks: Vec<TaskSpec>,
}

impl PhasePlan {
    pub fn new(name: impl Into<String>, tasks: Vec<TaskSpec>) -> Self {
        Self {
            name: name.into(),
            budget_estimate: None,
            labels: Vec::new(),
            tasks,
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }
}

/// A fully decomposed workflow.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Plan {
    pub phases: Vec<PhasePlan>,
}

impl Plan {
    pub const fn new(phases: Vec<PhasePlan>) -> Self {
        Self { phases }
    }

    pub fn task_count(&self) -> usize {
        self.phases.iter().map(|p| p.tasks.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_to_three_phases() {
        let request = WorkRequest::new("add login");
        assert_eq!(request.phases, vec!["plan", "execute", "synchronize"]);
    }

    #[test]
    fn test_plan_deserializes_with_sparse_tasks() {
        let yaml = r"
phases:
  - name: execute
    labels: [AUTH-001]
    tasks:
      - id: T1
        description: Write failing tests
      - id: T2
        description: Implement
        depends_on: [T1]
        cost: 1200
        tier: high
";
        let plan: Plan = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(plan.phases.len(), 1);
        assert_eq!(plan.task_count(), 2);
        let t2 = &plan.phases[0].tasks[1];
        assert_eq!(t2.depends_on, vec!["T1"]);
        assert_eq!(t2.tier, ResourceTier::High);
        assert!(!t2.parallelizable);
    }

    #[test]
    fn test_budget_range_from_costs() {
        let range = BudgetRange::from_costs([100, 200, 300]);
        assert_eq!(range, BudgetRange::new(600, 600));
    }
}
