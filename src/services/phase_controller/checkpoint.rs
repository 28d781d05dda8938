//! Budget reservation, forced checkpoints and resource loads.

use tracing::{info, warn};

use super::PhaseController;
use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::{BlockReason, ControllerState, ResourceLoad, ResourceTier};
use crate::domain::ports::StoreError;
use crate::services::budget_ledger::{LoadOutcome, ReserveOutcome};

impl PhaseController {
    /// Reserve budget for each task in `batch`. Returns the ids that hold a
    /// reservation; the rest are blocked with their shortfall.
    pub(super) fn reserve_batch(&mut self, index: usize, batch: &[String]) -> DomainResult<Vec<String>> {
        let mut granted = Vec::with_capacity(batch.len());
        for id in batch {
            let (cost, tier) = {
                let session = self.session_ref()?;
                let task = session
                    .phases
                    .get(index)
                    .and_then(|p| p.task(id))
                    .ok_or_else(|| OrchestrationError::TaskNotFound(id.clone()))?;
                (task.cost, task.tier)
            };

            let outcome = self.ledger.reserve(cost, tier);
            self.record_threshold_events(&outcome);
            if outcome.granted || self.checkpoint(index, id, cost, tier, outcome.shortfall)? {
                self.in_flight.insert(id.clone(), (cost, tier));
                granted.push(id.clone());
            }
        }
        self.sync_budget();
        Ok(granted)
    }

    /// Forced budget checkpoint: evict lowest-tier loads to cover the
    /// shortfall and retry once, or block the task for the operator.
    fn checkpoint(
        &mut self,
        index: usize,
        task_id: &str,
        cost: u64,
        tier: ResourceTier,
        shortfall: u64,
    ) -> DomainResult<bool> {
        self.set_state(ControllerState::Checkpointing);
        warn!(
            task_id,
            required = cost,
            shortfall,
            tier = %tier,
            usage_pct = self.ledger.current_usage_percent(),
            "budget checkpoint forced"
        );

        let mut granted = false;
        if self.free_budget(shortfall) {
            let retry = self.ledger.reserve(cost, tier);
            self.record_threshold_events(&retry);
            granted = retry.granted;
        }

        if !granted {
            let now = self.clock.now();
            let reason = BlockReason::BudgetShortfall {
                required: cost,
                shortfall: self.ledger.shortfall(cost),
                tier,
            };
            warn!(task_id, %reason, "task blocked on budget");
            let task = self
                .session
                .as_mut()
                .and_then(|s| s.phases.get_mut(index))
                .and_then(|p| p.task_mut(task_id))
                .ok_or_else(|| OrchestrationError::TaskNotFound(task_id.to_string()))?;
            task.block(reason, now)?;
        }

        self.set_state(ControllerState::Scheduling);
        Ok(granted)
    }

    /// Evict loads in eviction order until `needed` units are free. Nothing
    /// is evicted when the evictable loads could not cover it anyway.
    fn free_budget(&mut self, needed: u64) -> bool {
        let Some(victims) = self.ledger.plan_eviction(needed) else {
            return false;
        };
        for resource_id in victims {
            if self.ledger.evict(&resource_id).is_some() {
                if let Some(session) = self.session.as_mut() {
                    session.stats.evictions += 1;
                }
            }
        }
        self.sync_budget();
        true
    }

    fn record_threshold_events(&mut self, outcome: &ReserveOutcome) {
        self.threshold_events.extend(outcome.events.iter().copied());
    }

    pub(super) fn ensure_live(&self) -> DomainResult<()> {
        let session = self.session_ref()?;
        if session.status.is_terminal() {
            return Err(OrchestrationError::SessionTerminal(session.status.to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // Resource loads
    // ========================================================================

    /// Pull a resource into context. A repeat load of an active id only
    /// refreshes its recency. When the pool is short, lower-tier loads are
    /// evicted first; if that cannot help the load is denied.
    pub async fn load_resource(&mut self, resource_id: &str) -> DomainResult<LoadOutcome> {
        self.ensure_live()?;
        let now = self.clock.now();
        if self.ledger.touch(resource_id, now) {
            return Ok(LoadOutcome::Refreshed);
        }

        let descriptor = match self.resources.load_resource(resource_id).await {
            Ok(descriptor) => descriptor,
            Err(StoreError::NotFound(_)) => {
                return Err(OrchestrationError::ResourceNotFound(resource_id.to_string()));
            }
            Err(StoreError::Unreachable(reason)) => {
                let store = self.resources.name().to_string();
                return Err(self.fail(OrchestrationError::StoreUnreachable { store, reason }));
            }
        };

        let mut outcome = self.ledger.load(resource_id, descriptor.size, descriptor.tier, now);
        if let LoadOutcome::Denied { reservation } = &outcome {
            if self.free_budget(reservation.shortfall) {
                outcome = self.ledger.load(resource_id, descriptor.size, descriptor.tier, now);
            }
        }

        match &outcome {
            LoadOutcome::Loaded { reservation } => {
                self.record_threshold_events(reservation);
                info!(
                    resource_id,
                    size = descriptor.size,
                    tier = %descriptor.tier,
                    remaining = reservation.remaining,
                    "resource loaded"
                );
            }
            LoadOutcome::Denied { reservation } => {
                warn!(
                    resource_id,
                    size = descriptor.size,
                    tier = %descriptor.tier,
                    shortfall = reservation.shortfall,
                    "resource load denied"
                );
            }
            LoadOutcome::Refreshed => {}
        }
        self.sync_budget();
        Ok(outcome)
    }

    /// Operator eviction of an active load.
    pub fn evict_resource(&mut self, resource_id: &str) -> DomainResult<Option<ResourceLoad>> {
        self.session_ref()?;
        let evicted = self.ledger.evict(resource_id);
        if evicted.is_some() {
            if let Some(session) = self.session.as_mut() {
                session.stats.evictions += 1;
            }
            self.sync_budget();
        }
        Ok(evicted)
    }
}
