//! YAML plan files.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::domain::models::{Plan, WorkRequest};
use crate::domain::ports::{PlanSource, StoreError};

/// Plan source reading one pre-decomposed plan from a YAML file.
///
/// ```yaml
/// phases:
///   - name: execute
///     labels: [AUTH-001]
///     tasks:
///       - id: T1
///         description: Write the login handler
///         cost: 4000
///         tier: high
///       - id: T2
///         description: Wire the handler into the router
///         depends_on: [T1]
/// ```
#[derive(Debug, Clone)]
pub struct YamlPlanSource {
    path: PathBuf,
}

impl YamlPlanSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parse(yaml: &str) -> Result<Plan, StoreError> {
        serde_yaml::from_str(yaml).map_err(|e| StoreError::Unreachable(format!("invalid plan: {e}")))
    }
}

#[async_trait]
impl PlanSource for YamlPlanSource {
    async fn plan_for(&self, request: &WorkRequest) -> Result<Option<Plan>, StoreError> {
        let yaml = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| StoreError::Unreachable(format!("{}: {e}", self.path.display())))?;
        let plan = Self::parse(&yaml)?;
        debug!(request = %request.description, "plan file parsed");
        info!(
            path = %self.path.display(),
            phases = plan.phases.len(),
            tasks = plan.task_count(),
            "plan loaded"
        );
        Ok(Some(plan))
    }
}
