//! Communication/execution policy model.
//!
//! A policy is a fixed bundle of style parameters. The set of policies is
//! closed so the selection state machine has a finite domain.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::signal::ExpertiseLevel;

/// Identifier of one of the four policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyId {
    /// Explanatory, step-by-step guidance. The safe default.
    Mentor,
    /// Terse, action-first.
    Efficiency,
    /// Structured status reporting for formal commands.
    ProjectManager,
    /// Team-oriented, review-heavy.
    Collaboration,
}

impl Default for PolicyId {
    fn default() -> Self {
        Self::Mentor
    }
}

impl PolicyId {
    pub const ALL: [Self; 4] = [Self::Mentor, Self::Efficiency, Self::ProjectManager, Self::Collaboration];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mentor => "mentor",
            Self::Efficiency => "efficiency",
            Self::ProjectManager => "project_manager",
            Self::Collaboration => "collaboration",
        }
    }

    pub fn style(&self) -> CommunicationStyle {
        match self {
            Self::Mentor => CommunicationStyle {
                verbosity: Verbosity::Detailed,
                auto_approve_threshold: 0.95,
                question_style: QuestionStyle::Guided,
            },
            Self::Efficiency => CommunicationStyle {
                verbosity: Verbosity::Concise,
                auto_approve_threshold: 0.6,
                question_style: QuestionStyle::Minimal,
            },
            Self::ProjectManager => CommunicationStyle {
                verbosity: Verbosity::Balanced,
                auto_approve_threshold: 0.8,
                question_style: QuestionStyle::Structured,
            },
            Self::Collaboration => CommunicationStyle {
                verbosity: Verbosity::Balanced,
                auto_approve_threshold: 0.85,
                question_style: QuestionStyle::Collaborative,
            },
        }
    }

    pub fn policy(self) -> Policy {
        Policy { id: self, style: self.style() }
    }

    /// Policy that fits an expertise level; intermediate falls back to mentor.
    pub fn for_expertise(level: ExpertiseLevel) -> Self {
        match level {
            ExpertiseLevel::Expert => Self::Efficiency,
            ExpertiseLevel::Beginner | ExpertiseLevel::Intermediate => Self::Mentor,
        }
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Detailed,
    Balanced,
    Concise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStyle {
    /// Walk the user through choices with explanations.
    Guided,
    /// Ask only when blocked.
    Minimal,
    /// Checklists and explicit status.
    Structured,
    /// Surface decisions for team review.
    Collaborative,
}

/// Structured descriptor of how a policy communicates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommunicationStyle {
    pub verbosity: Verbosity,
    /// Confidence above which actions proceed without asking.
    pub auto_approve_threshold: f64,
    pub question_style: QuestionStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub style: CommunicationStyle,
}

/// Personal vs team project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectMode {
    Personal,
    Team,
}

impl Default for ProjectMode {
    fn default() -> Self {
        Self::Personal
    }
}

/// Explicit wording in the request that overrides inferred expertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LexicalMarker {
    /// "be brief", "just do it".
    Brevity,
    /// "explain", "walk me through".
    Explanation,
}

/// Markers extracted from a request by the embedding application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMarkers {
    /// The request is a formal structured command.
    #[serde(default)]
    pub formal_command: bool,
    #[serde(default)]
    pub lexical: Option<LexicalMarker>,
}

/// Why a candidate policy was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SelectionReason {
    StructuralMarker,
    ProjectMode,
    LexicalMarker { marker: LexicalMarker },
    Classification { level: ExpertiseLevel },
    Default,
}

/// Why a candidate differing from the current policy was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "guard", rename_all = "snake_case")]
pub enum SwitchSuppression {
    LowConfidence { confidence: f64, minimum: f64 },
    Cooldown { remaining_secs: i64 },
}

/// Outcome of a selection round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Policy in force after this round.
    pub policy: PolicyId,
    /// Policy the precedence rules asked for.
    pub candidate: PolicyId,
    pub reason: SelectionReason,
    pub confidence: f64,
    pub switched: bool,
    pub suppressed: Option<SwitchSuppression>,
}
