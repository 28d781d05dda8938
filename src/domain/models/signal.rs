//! Behavioral signal model.
//!
//! Signals are timestamped observations of user behavior. Their influence
//! decays with age; decay is computed from immutable timestamps against an
//! injected "now", never from the wall clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the expertise scale a signal pushes towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    Beginner,
    Expert,
    Neutral,
}

/// Closed set of observable behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// The same question asked again.
    RepeatedQuestion,
    /// Explicit request for an explanation.
    ExplanationRequest,
    /// Hedged or uncertain phrasing.
    Hesitation,
    /// Terse imperative command.
    DirectCommand,
    /// Precise technical vocabulary.
    TechnicalPrecision,
    /// Work had to be redone (a task needed a retry).
    SelfCorrection,
    /// Work finished on the first attempt.
    SmoothCompletion,
    /// Observation with no expertise implication.
    Acknowledgement,
}

impl SignalKind {
    pub fn category(&self) -> SignalCategory {
        match self {
            Self::RepeatedQuestion | Self::ExplanationRequest | Self::Hesitation | Self::SelfCorrection => {
                SignalCategory::Beginner
            }
            Self::DirectCommand | Self::TechnicalPrecision | Self::SmoothCompletion => SignalCategory::Expert,
            Self::Acknowledgement => SignalCategory::Neutral,
        }
    }

    /// Weight of a fresh signal of this kind.
    pub fn base_weight(&self) -> f64 {
        match self {
            Self::RepeatedQuestion | Self::ExplanationRequest => 1.0,
            Self::DirectCommand | Self::TechnicalPrecision => 1.0,
            Self::Hesitation | Self::SelfCorrection => 0.5,
            Self::SmoothCompletion => 0.25,
            Self::Acknowledgement => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RepeatedQuestion => "repeated_question",
            Self::ExplanationRequest => "explanation_request",
            Self::Hesitation => "hesitation",
            Self::DirectCommand => "direct_command",
            Self::TechnicalPrecision => "technical_precision",
            Self::SelfCorrection => "self_correction",
            Self::SmoothCompletion => "smooth_completion",
            Self::Acknowledgement => "acknowledgement",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single timestamped observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    pub fn new(kind: SignalKind, timestamp: DateTime<Utc>) -> Self {
        Self { kind, timestamp }
    }

    /// Age in seconds at `now`. Signals stamped in the future count as fresh.
    pub fn age_secs(&self, now: DateTime<Utc>) -> f64 {
        let millis = (now - self.timestamp).num_milliseconds().max(0);
        millis as f64 / 1000.0
    }

    /// Decay factor in `[0, 1]`: `decay_rate ^ (age / half_life)`.
    pub fn decay_factor(&self, now: DateTime<Utc>, half_life_secs: f64, decay_rate: f64) -> f64 {
        if half_life_secs <= 0.0 {
            return 0.0;
        }
        decay_rate
            .powf(self.age_secs(now) / half_life_secs)
            .clamp(0.0, 1.0)
    }
}

/// Inferred user expertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpertiseLevel {
    Beginner,
    Intermediate,
    Expert,
}

impl fmt::Display for ExpertiseLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Expert => "expert",
        })
    }
}

/// Result of classifying the signal buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub level: ExpertiseLevel,
    pub beginner_score: f64,
    pub expert_score: f64,
    /// Normalized separation between the two scores, in `[0, 1]`.
    pub confidence: f64,
}

impl Classification {
    /// Classification used when nothing has been observed.
    pub fn unknown() -> Self {
        Self {
            level: ExpertiseLevel::Intermediate,
            beginner_score: 0.0,
            expert_score: 0.0,
            confidence: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fresh_signal_has_full_weight() {
        let now = Utc::now();
        let signal = Signal::new(SignalKind::DirectCommand, now);
        assert!((signal.decay_factor(now, 300.0, 0.5) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_one_half_life_halves_weight() {
        let now = Utc::now();
        let signal = Signal::new(SignalKind::DirectCommand, now - Duration::seconds(300));
        assert!((signal.decay_factor(now, 300.0, 0.5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_future_signal_is_clamped() {
        let now = Utc::now();
        let signal = Signal::new(SignalKind::Hesitation, now + Duration::seconds(60));
        assert_eq!(signal.age_secs(now), 0.0);
        assert!(signal.decay_factor(now, 300.0, 0.5) <= 1.0);
    }

    #[test]
    fn test_categories() {
        assert_eq!(SignalKind::RepeatedQuestion.category(), SignalCategory::Beginner);
        assert_eq!(SignalKind::SelfCorrection.category(), SignalCategory::Beginner);
        assert_eq!(SignalKind::DirectCommand.category(), SignalCategory::Expert);
        assert_eq!(SignalKind::Acknowledgement.category(), SignalCategory::Neutral);
    }
}
