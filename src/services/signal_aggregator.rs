//! Behavioural signal aggregator.
//!
//! Keeps a bounded ring buffer of timestamped [`Signal`]s and classifies the
//! user's expertise from their time-decayed weights. Classification is a
//! pure function of the buffer and the supplied `now`.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::trace;

use crate::domain::models::{
    Classification, ExpertiseLevel, Signal, SignalCategory, SignalConfig, SignalKind,
};

/// Decayed score totals per category.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CategoryScores {
    pub beginner: f64,
    pub expert: f64,
    pub neutral: f64,
}

#[derive(Debug, Clone)]
pub struct SignalAggregator {
    config: SignalConfig,
    buffer: VecDeque<Signal>,
}

impl SignalAggregator {
    pub fn new(config: SignalConfig) -> Self {
        let capacity = config.buffer_capacity.max(1);
        Self {
            config,
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    /// Rebuild from a saved buffer, keeping only the newest `capacity` signals.
    pub fn with_signals(config: SignalConfig, signals: impl IntoIterator<Item = Signal>) -> Self {
        let mut aggregator = Self::new(config);
        for signal in signals {
            aggregator.push(signal);
        }
        aggregator
    }

    pub fn capacity(&self) -> usize {
        self.config.buffer_capacity.max(1)
    }

    /// Record an observation. Returns the evicted oldest signal, if any.
    pub fn record(&mut self, kind: SignalKind, timestamp: DateTime<Utc>) -> Option<Signal> {
        trace!(signal = kind.as_str(), "signal recorded");
        self.push(Signal::new(kind, timestamp))
    }

    /// Buffered signals, oldest first.
    pub fn signals(&self) -> impl Iterator<Item = &Signal> {
        self.buffer.iter()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Effective weight: base weight times decay factor.
    pub fn weight(&self, signal: &Signal, now: DateTime<Utc>) -> f64 {
        signal.kind.base_weight()
            * signal.decay_factor(now, self.config.half_life_secs, self.config.decay_rate)
    }

    pub fn scores(&self, now: DateTime<Utc>) -> CategoryScores {
        self.buffer.iter().fold(CategoryScores::default(), |mut acc, s| {
            let w = self.weight(s, now);
            match s.kind.category() {
                SignalCategory::Beginner => acc.beginner += w,
                SignalCategory::Expert => acc.expert += w,
                SignalCategory::Neutral => acc.neutral += w,
            }
            acc
        })
    }

    /// Whichever category leads by more than the margin wins; otherwise
    /// `Intermediate`. Confidence is the normalized lead in `[0, 1]`.
    pub fn classify(&self, now: DateTime<Utc>) -> Classification {
        let scores = self.scores(now);
        let total = scores.beginner + scores.expert;
        if total <= f64::EPSILON {
            return Classification::unknown();
        }

        let lead = scores.expert - scores.beginner;
        let level = if lead > self.config.classification_margin {
            ExpertiseLevel::Expert
        } else if -lead > self.config.classification_margin {
            ExpertiseLevel::Beginner
        } else {
            ExpertiseLevel::Intermediate
        };

        Classification {
            level,
            beginner_score: scores.beginner,
            expert_score: scores.expert,
            confidence: (lead.abs() / total).clamp(0.0, 1.0),
        }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn push(&mut self, signal: Signal) -> Option<Signal> {
        let evicted = if self.buffer.len() >= self.capacity() {
            self.buffer.pop_front()
        } else {
            None
        };
        self.buffer.push_back(signal);
        evicted
    }
}
