//! Context budget ledger.
//!
//! Tracks cumulative consumption of the available pool (capacity minus the
//! start-up overhead), refuses reservations that would overrun it, and
//! raises edge-triggered threshold events. Reservations are kept per
//! [`ResourceTier`] so the controller can evict from the lowest tier first.
//!
//! The ledger is owned by the phase controller and mutated only from its
//! control loop, so it carries no locks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::domain::models::{BudgetConfig, ResourceLoad, ResourceTier};

// ============================================================================
// Supporting types
// ============================================================================

/// The two monotone thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetThreshold {
    Warning,
    Critical,
}

impl BudgetThreshold {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// Fired once each time usage crosses a threshold from below.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdEvent {
    pub threshold: BudgetThreshold,
    pub usage_percent: f64,
    pub used: u64,
    pub available: u64,
}

/// Result of a reservation attempt. Denial is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveOutcome {
    pub granted: bool,
    /// Units left in the pool after the attempt.
    pub remaining: u64,
    /// Units missing when denied; zero when granted.
    pub shortfall: u64,
    pub events: Vec<ThresholdEvent>,
}

/// Result of loading a resource into the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoadOutcome {
    /// Newly reserved and recorded.
    Loaded { reservation: ReserveOutcome },
    /// Already active; only its LRU timestamp moved.
    Refreshed,
    /// Did not fit.
    Denied { reservation: ReserveOutcome },
}

/// Serializable ledger state, carried in session snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    /// Reserved units per tier.
    pub reserved: BTreeMap<ResourceTier, u64>,
    /// Active loads in load order.
    pub loads: Vec<ResourceLoad>,
    pub warning_fired: bool,
    pub critical_fired: bool,
}

// ============================================================================
// Ledger
// ============================================================================

#[derive(Debug, Clone)]
pub struct BudgetLedger {
    config: BudgetConfig,
    state: LedgerState,
}

impl BudgetLedger {
    pub fn new(config: BudgetConfig) -> Self {
        Self {
            config,
            state: LedgerState::default(),
        }
    }

    /// Rebuild a ledger from snapshot state.
    pub fn from_state(config: BudgetConfig, state: LedgerState) -> Self {
        Self { config, state }
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Pool available once the start-up overhead is paid.
    pub const fn available(&self) -> u64 {
        self.config.available()
    }

    pub fn used(&self) -> u64 {
        self.state.reserved.values().fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    pub fn remaining(&self) -> u64 {
        self.available().saturating_sub(self.used())
    }

    /// Usage of the available pool in percent, `0.0..=100.0`.
    #[allow(clippy::cast_precision_loss)]
    pub fn current_usage_percent(&self) -> f64 {
        let available = self.available();
        if available == 0 {
            return 0.0;
        }
        (self.used() as f64 / available as f64) * 100.0
    }

    /// Units missing for a reservation of `amount`; zero when it fits.
    pub fn shortfall(&self, amount: u64) -> u64 {
        self.used().saturating_add(amount).saturating_sub(self.available())
    }

    /// Reserve `amount` units under `tier`. Never errors; a reservation that
    /// would exceed the pool is denied and leaves usage untouched.
    pub fn reserve(&mut self, amount: u64, tier: ResourceTier) -> ReserveOutcome {
        let shortfall = self.shortfall(amount);
        if shortfall > 0 {
            debug!(amount, tier = %tier, shortfall, remaining = self.remaining(), "budget reservation denied");
            return ReserveOutcome {
                granted: false,
                remaining: self.remaining(),
                shortfall,
                events: Vec::new(),
            };
        }

        *self.state.reserved.entry(tier).or_insert(0) += amount;
        let events = self.fire_crossed_thresholds();
        debug!(amount, tier = %tier, used = self.used(), remaining = self.remaining(), "budget reserved");
        ReserveOutcome {
            granted: true,
            remaining: self.remaining(),
            shortfall: 0,
            events,
        }
    }

    /// Release `amount` units without regard to tier, draining the lowest
    /// tiers first. Saturates at zero.
    pub fn release(&mut self, amount: u64) {
        let mut left = amount;
        for tier in ResourceTier::ALL {
            if left == 0 {
                break;
            }
            left = self.drain(tier, left);
        }
        self.rearm_thresholds();
    }

    /// Release `amount` units reserved under `tier`. Saturates at zero.
    pub fn release_from(&mut self, amount: u64, tier: ResourceTier) {
        self.drain(tier, amount);
        self.rearm_thresholds();
    }

    /// Reserved units per tier, every tier present.
    pub fn tier_subtotals(&self) -> BTreeMap<ResourceTier, u64> {
        ResourceTier::ALL.into_iter().map(|t| (t, self.tier_subtotal(t))).collect()
    }

    pub fn tier_subtotal(&self, tier: ResourceTier) -> u64 {
        self.state.reserved.get(&tier).copied().unwrap_or(0)
    }

    // ------------------------------------------------------------------------
    // Resource loads
    // ------------------------------------------------------------------------

    pub fn is_loaded(&self, resource_id: &str) -> bool {
        self.state.loads.iter().any(|l| l.resource_id == resource_id)
    }

    pub fn loads(&self) -> &[ResourceLoad] {
        &self.state.loads
    }

    /// Reserve and record a resource load. A second load of an active id
    /// only refreshes its recency.
    pub fn load(
        &mut self,
        resource_id: &str,
        size: u64,
        tier: ResourceTier,
        now: DateTime<Utc>,
    ) -> LoadOutcome {
        if let Some(existing) = self.state.loads.iter_mut().find(|l| l.resource_id == resource_id) {
            existing.touch(now);
            return LoadOutcome::Refreshed;
        }
        let reservation = self.reserve(size, tier);
        if !reservation.granted {
            return LoadOutcome::Denied { reservation };
        }
        self.state.loads.push(ResourceLoad::new(resource_id, size, tier, now));
        LoadOutcome::Loaded { reservation }
    }

    /// Mark an active load as used.
    pub fn touch(&mut self, resource_id: &str, now: DateTime<Utc>) -> bool {
        self.state
            .loads
            .iter_mut()
            .find(|l| l.resource_id == resource_id)
            .map(|l| l.touch(now))
            .is_some()
    }

    /// Drop an active load and give its units back.
    pub fn evict(&mut self, resource_id: &str) -> Option<ResourceLoad> {
        let idx = self.state.loads.iter().position(|l| l.resource_id == resource_id)?;
        let load = self.state.loads.remove(idx);
        self.release_from(load.size, load.tier);
        info!(resource_id, tier = %load.tier, size = load.size, "resource evicted");
        Some(load)
    }

    /// Evictable loads in eviction order: lowest tier first, least recently
    /// used first within a tier. Critical loads are pinned.
    pub fn eviction_candidates(&self) -> Vec<&ResourceLoad> {
        let mut candidates: Vec<&ResourceLoad> =
            self.state.loads.iter().filter(|l| l.tier.is_evictable()).collect();
        // Stable sort keeps load order as the final tie-break.
        candidates.sort_by_key(|l| (l.tier, l.last_used_at));
        candidates
    }

    /// Ids to evict, in order, to free at least `needed` units. `None` when
    /// every evictable load together would still not be enough.
    pub fn plan_eviction(&self, needed: u64) -> Option<Vec<String>> {
        if needed == 0 {
            return Some(Vec::new());
        }
        let mut freed = 0u64;
        let mut ids = Vec::new();
        for load in self.eviction_candidates() {
            freed = freed.saturating_add(load.size);
            ids.push(load.resource_id.clone());
            if freed >= needed {
                return Some(ids);
            }
        }
        None
    }

    /// Forget every reservation and load.
    pub fn reset(&mut self) {
        self.state = LedgerState::default();
        info!("budget ledger reset");
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Take up to `amount` from `tier`; returns what could not be taken.
    fn drain(&mut self, tier: ResourceTier, amount: u64) -> u64 {
        let Some(reserved) = self.state.reserved.get_mut(&tier) else {
            return amount;
        };
        let taken = (*reserved).min(amount);
        *reserved -= taken;
        if *reserved == 0 {
            self.state.reserved.remove(&tier);
        }
        amount - taken
    }

    fn threshold_pct(&self, threshold: BudgetThreshold) -> f64 {
        match threshold {
            BudgetThreshold::Warning => self.config.warning_threshold * 100.0,
            BudgetThreshold::Critical => self.config.critical_threshold * 100.0,
        }
    }

    fn fire_crossed_thresholds(&mut self) -> Vec<ThresholdEvent> {
        let usage_percent = self.current_usage_percent();
        let mut events = Vec::new();
        for threshold in [BudgetThreshold::Warning, BudgetThreshold::Critical] {
            let armed = match threshold {
                BudgetThreshold::Warning => !self.state.warning_fired,
                BudgetThreshold::Critical => !self.state.critical_fired,
            };
            if !armed || usage_percent < self.threshold_pct(threshold) {
                continue;
            }
            match threshold {
                BudgetThreshold::Warning => self.state.warning_fired = true,
                BudgetThreshold::Critical => self.state.critical_fired = true,
            }
            warn!(
                threshold = threshold.as_str(),
                usage_pct = usage_percent,
                used = self.used(),
                available = self.available(),
                "budget threshold crossed"
            );
            events.push(ThresholdEvent {
                threshold,
                usage_percent,
                used: self.used(),
                available: self.available(),
            });
        }
        events
    }

    fn rearm_thresholds(&mut self) {
        let usage_percent = self.current_usage_percent();
        if self.state.warning_fired && usage_percent < self.threshold_pct(BudgetThreshold::Warning) {
            self.state.warning_fired = false;
            debug!(usage_pct = usage_percent, "warning threshold re-armed");
        }
        if self.state.critical_fired && usage_percent < self.threshold_pct(BudgetThreshold::Critical) {
            self.state.critical_fired = false;
            debug!(usage_pct = usage_percent, "critical threshold re-armed");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
