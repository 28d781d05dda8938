//! Request decomposition into phases and task graphs.

use tracing::{debug, warn};

use super::PhaseController;
use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::{BudgetRange, Phase, PhasePlan, Plan, Task, WorkRequest};
use crate::domain::ports::StoreError;
use crate::services::templates::{canonical_phase, template_for};

impl PhaseController {
    /// Build validated phases for `request`, preferring the plan source.
    pub(super) async fn decompose(&self, request: &WorkRequest) -> DomainResult<Vec<Phase>> {
        let plan = match self.plan_from_source(request).await? {
            Some(plan) => plan,
            None => Self::plan_from_templates(request)?,
        };
        if plan.phases.is_empty() {
            return Err(OrchestrationError::EmptyPlan);
        }

        let mut phases = Vec::with_capacity(plan.phases.len());
        for (ordinal, phase_plan) in plan.phases.into_iter().enumerate() {
            phases.push(self.build_phase(ordinal, phase_plan)?);
        }
        Ok(phases)
    }

    async fn plan_from_source(&self, request: &WorkRequest) -> DomainResult<Option<Plan>> {
        let Some(source) = &self.plan_source else {
            return Ok(None);
        };
        match source.plan_for(request).await {
            Ok(plan) => Ok(plan),
            Err(StoreError::NotFound(what)) => {
                debug!(%what, "no plan from source, using templates");
                Ok(None)
            }
            Err(StoreError::Unreachable(reason)) => Err(OrchestrationError::StoreUnreachable {
                store: "plan source".to_string(),
                reason,
            }),
        }
    }

    /// Default templates for the request's phases. Request labels are
    /// checked at the synchronize phase, or the last phase when the request
    /// has none.
    fn plan_from_templates(request: &WorkRequest) -> DomainResult<Plan> {
        let mut phases = request
            .phases
            .iter()
            .map(|name| template_for(name).ok_or_else(|| OrchestrationError::UnknownPhaseTemplate(name.clone())))
            .collect::<DomainResult<Vec<PhasePlan>>>()?;

        if !request.labels.is_empty() {
            let gate = phases
                .iter()
                .position(|p| canonical_phase(&p.name) == Some("synchronize"))
                .or_else(|| phases.len().checked_sub(1));
            match gate.and_then(|i| phases.get_mut(i)) {
                Some(phase) => phase.labels.extend(request.labels.iter().cloned()),
                None => warn!(labels = request.labels.len(), "request labels dropped: no phases"),
            }
        }
        Ok(Plan::new(phases))
    }

    fn build_phase(&self, ordinal: usize, plan: PhasePlan) -> DomainResult<Phase> {
        let tasks: Vec<Task> = plan.tasks.iter().map(Task::from_spec).collect();
        self.resolver.validate_graph(&plan.name, &tasks)?;

        let mut phase = Phase::new(plan.name, ordinal, tasks);
        if let Some(estimate) = plan.budget_estimate {
            phase.budget_estimate = estimate;
        } else {
            phase.budget_estimate = BudgetRange::from_costs(phase.tasks.iter().map(|t| t.cost));
        }
        phase.trace_labels = plan.labels;
        debug!(
            phase = %phase.name,
            ordinal,
            tasks = phase.tasks.len(),
            labels = phase.trace_labels.len(),
            "phase decomposed"
        );
        Ok(phase)
    }
}
