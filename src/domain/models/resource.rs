//! Resource domain model.
//!
//! Resources are opaque knowledge units pulled into the session context.
//! The orchestrator only cares about their identity, size and tier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority class governing load order and eviction order.
///
/// Ordering is significant: `Low < Medium < High < Critical`, and forced
/// eviction always walks tiers from the lowest upwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceTier {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Default for ResourceTier {
    fn default() -> Self {
        Self::Medium
    }
}

impl ResourceTier {
    /// All tiers, lowest first.
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Critical resources are pinned and never chosen for forced eviction.
    pub fn is_evictable(&self) -> bool {
        !matches!(self, Self::Critical)
    }
}

impl fmt::Display for ResourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a resource store hands back for a load request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub id: String,
    pub content: String,
    /// Declared size in budget units.
    pub size: u64,
    pub tier: ResourceTier,
}

/// A resource currently occupying part of the session budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLoad {
    pub resource_id: String,
    pub size: u64,
    pub tier: ResourceTier,
    pub loaded_at: DateTime<Utc>,
    /// Last time the resource was requested; LRU tie-break within a tier.
    pub last_used_at: DateTime<Utc>,
}

impl ResourceLoad {
    pub fn new(resource_id: impl Into<String>, size: u64, tier: ResourceTier, now: DateTime<Utc>) -> Self {
        Self {
            resource_id: resource_id.into(),
            size,
            tier,
            loaded_at: now,
            last_used_at: now,
        }
    }

    /// Mark the resource as used again.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_used_at {
            self.last_used_at = now;
        }
    }
}
