//! Policy selection with an anti-thrash guard.
//!
//! Precedence, first match wins:
//! 1. formal structural command -> project manager
//! 2. team project mode -> collaboration
//! 3. lexical marker (brevity -> efficiency, explanation -> mentor)
//! 4. expertise classification (expert -> efficiency, otherwise mentor)
//!
//! A candidate differing from the current policy is applied only when its
//! confidence exceeds the configured minimum and the cooldown since the last
//! switch has elapsed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::models::{
    Classification, ExpertiseLevel, LexicalMarker, PolicyConfig, PolicyDecision, PolicyId,
    ProjectMode, RequestMarkers, SelectionReason, SwitchSuppression,
};

/// Confidence assigned to explicit lexical markers.
const LEXICAL_CONFIDENCE: f64 = 0.9;

/// Everything the selector looks at in one round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionInput {
    pub markers: RequestMarkers,
    pub project_mode: ProjectMode,
    pub classification: Classification,
}

impl Default for SelectionInput {
    fn default() -> Self {
        Self {
            markers: RequestMarkers::default(),
            project_mode: ProjectMode::default(),
            classification: Classification::unknown(),
        }
    }
}

/// Selector state, carried in session snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorState {
    pub current: PolicyId,
    pub last_switch_at: Option<DateTime<Utc>>,
    pub switches: u32,
}

#[derive(Debug, Clone)]
pub struct PolicySelector {
    config: PolicyConfig,
    state: SelectorState,
}

impl PolicySelector {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            config,
            state: SelectorState::default(),
        }
    }

    pub const fn from_state(config: PolicyConfig, state: SelectorState) -> Self {
        Self { config, state }
    }

    pub const fn state(&self) -> SelectorState {
        self.state
    }

    pub const fn current(&self) -> PolicyId {
        self.state.current
    }

    /// Apply the precedence rules without touching state.
    pub fn candidate(&self, input: &SelectionInput) -> (PolicyId, SelectionReason, f64) {
        if input.markers.formal_command {
            return (PolicyId::ProjectManager, SelectionReason::StructuralMarker, 1.0);
        }
        if input.project_mode == ProjectMode::Team && self.config.team_mode_forces_collaboration {
            return (PolicyId::Collaboration, SelectionReason::ProjectMode, 1.0);
        }
        if let Some(marker) = input.markers.lexical {
            let policy = match marker {
                LexicalMarker::Brevity => PolicyId::Efficiency,
                LexicalMarker::Explanation => PolicyId::Mentor,
            };
            return (policy, SelectionReason::LexicalMarker { marker }, LEXICAL_CONFIDENCE);
        }
        let c = input.classification;
        if c.beginner_score + c.expert_score <= f64::EPSILON {
            return (PolicyId::Mentor, SelectionReason::Default, 0.0);
        }
        (
            PolicyId::for_expertise(c.level),
            SelectionReason::Classification { level: c.level },
            c.confidence,
        )
    }

    /// Run one selection round, switching only when the guard allows it.
    pub fn select(&mut self, input: &SelectionInput, now: DateTime<Utc>) -> PolicyDecision {
        let (candidate, reason, confidence) = self.candidate(input);
        let current = self.state.current;

        if candidate == current {
            return PolicyDecision {
                policy: current,
                candidate,
                reason,
                confidence,
                switched: false,
                suppressed: None,
            };
        }

        if let Some(suppression) = self.guard(confidence, now) {
            debug!(
                current = current.as_str(),
                candidate = candidate.as_str(),
                confidence,
                ?suppression,
                "policy switch suppressed"
            );
            return PolicyDecision {
                policy: current,
                candidate,
                reason,
                confidence,
                switched: false,
                suppressed: Some(suppression),
            };
        }

        self.state.current = candidate;
        self.state.last_switch_at = Some(now);
        self.state.switches += 1;
        info!(
            from = current.as_str(),
            to = candidate.as_str(),
            confidence,
            ?reason,
            "policy switched"
        );
        PolicyDecision {
            policy: candidate,
            candidate,
            reason,
            confidence,
            switched: true,
            suppressed: None,
        }
    }

    fn guard(&self, confidence: f64, now: DateTime<Utc>) -> Option<SwitchSuppression> {
        if confidence <= self.config.min_confidence {
            return Some(SwitchSuppression::LowConfidence {
                confidence,
                minimum: self.config.min_confidence,
            });
        }
        let last = self.state.last_switch_at?;
        let elapsed = (now - last).num_seconds();
        if elapsed < self.config.cooldown_secs {
            return Some(SwitchSuppression::Cooldown {
                remaining_secs: self.config.cooldown_secs - elapsed,
            });
        }
        None
    }
}

/// Classification with an explicit level and confidence, scores set to match.
pub fn classification_of(level: ExpertiseLevel, confidence: f64) -> Classification {
    let (beginner_score, expert_score) = match level {
        ExpertiseLevel::Beginner => (1.0, 1.0 - confidence),
        ExpertiseLevel::Expert => (1.0 - confidence, 1.0),
        ExpertiseLevel::Intermediate => (1.0, 1.0),
    };
    Classification {
        level,
        beginner_score,
        expert_score,
        confidence,
    }
}
