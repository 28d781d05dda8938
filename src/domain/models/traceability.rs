//! Traceability domain model.
//!
//! A traceability unit is everything found for one shared label across the
//! four artifact kinds. Units are derived at validation time and never
//! persisted beyond the validation run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// The four links of a requirement -> verification -> implementation ->
/// documentation chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Requirement,
    Verification,
    Implementation,
    Documentation,
}

impl ArtifactKind {
    pub const ALL: [Self; 4] = [
        Self::Requirement,
        Self::Verification,
        Self::Implementation,
        Self::Documentation,
    ];

    /// Marker tag used in source files (`@SPEC:AUTH-001`).
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Requirement => "SPEC",
            Self::Verification => "TEST",
            Self::Implementation => "CODE",
            Self::Documentation => "DOC",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "SPEC" => Some(Self::Requirement),
            "TEST" => Some(Self::Verification),
            "CODE" => Some(Self::Implementation),
            "DOC" => Some(Self::Documentation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requirement => "requirement",
            Self::Verification => "verification",
            Self::Implementation => "implementation",
            Self::Documentation => "documentation",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an artifact was found.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactLocation {
    pub path: String,
    pub line: Option<usize>,
}

impl ArtifactLocation {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), line: None }
    }

    pub fn at_line(path: impl Into<String>, line: usize) -> Self {
        Self { path: path.into(), line: Some(line) }
    }
}

impl fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.path, line),
            None => f.write_str(&self.path),
        }
    }
}

/// Every artifact a store holds, keyed by kind and label. Taken once per
/// validation run by stores that scan eagerly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactIndex(HashMap<(ArtifactKind, String), Vec<ArtifactLocation>>);

impl ArtifactIndex {
    pub fn insert(&mut self, label: impl Into<String>, kind: ArtifactKind, location: ArtifactLocation) {
        self.0.entry((kind, label.into())).or_default().push(location);
    }

    pub fn locations(&self, label: &str, kind: ArtifactKind) -> &[ArtifactLocation] {
        self.0
            .get(&(kind, label.to_string()))
            .map_or(&[], Vec::as_slice)
    }

    /// Every label that carries at least one artifact, sorted.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.0.keys().map(|(_, l)| l.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    /// Number of distinct (kind, label) entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// All locations found for one label, grouped by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceabilityUnit {
    pub label: String,
    pub locations: BTreeMap<ArtifactKind, BTreeSet<ArtifactLocation>>,
}

impl TraceabilityUnit {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            locations: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, kind: ArtifactKind, location: ArtifactLocation) {
        self.locations.entry(kind).or_default().insert(location);
    }

    pub fn has(&self, kind: ArtifactKind) -> bool {
        self.locations.get(&kind).is_some_and(|l| !l.is_empty())
    }

    pub fn observed_kinds(&self) -> Vec<ArtifactKind> {
        ArtifactKind::ALL.into_iter().filter(|k| self.has(*k)).collect()
    }

    /// Set difference between the four required kinds and what was observed.
    pub fn missing_kinds(&self) -> Vec<ArtifactKind> {
        ArtifactKind::ALL.into_iter().filter(|k| !self.has(*k)).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_kinds().is_empty()
    }
}

/// An incomplete chain: the offending label and exactly which kinds are absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub label: String,
    pub missing: Vec<ArtifactKind>,
    pub found: Vec<ArtifactKind>,
}

impl Finding {
    pub fn from_unit(unit: &TraceabilityUnit) -> Self {
        Self {
            label: unit.label.clone(),
            missing: unit.missing_kinds(),
            found: unit.observed_kinds(),
        }
    }

    pub fn is_missing(&self, kind: ArtifactKind) -> bool {
        self.missing.contains(&kind)
    }

    /// Only the documentation link is absent.
    pub fn is_documentation_only(&self) -> bool {
        self.missing == [ArtifactKind::Documentation]
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let missing: Vec<&str> = self.missing.iter().map(ArtifactKind::as_str).collect();
        write!(f, "{} missing {}", self.label, missing.join(", "))
    }
}

/// Result of one validation run. Labels are sorted, so re-running over an
/// unchanged artifact set yields an identical report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub complete: Vec<TraceabilityUnit>,
    pub incomplete: Vec<Finding>,
    /// Documentation-only gaps when documentation is advisory.
    #[serde(default)]
    pub advisories: Vec<Finding>,
}

impl ValidationReport {
    /// No gating findings.
    pub fn is_clean(&self) -> bool {
        self.incomplete.is_empty()
    }

    pub fn complete_labels(&self) -> Vec<&str> {
        self.complete.iter().map(|u| u.label.as_str()).collect()
    }

    /// Labels whose chain lacks `kind`, gating or advisory.
    pub fn labels_missing(&self, kind: ArtifactKind) -> Vec<&str> {
        self.incomplete
            .iter()
            .chain(self.advisories.iter())
            .filter(|f| f.is_missing(kind))
            .map(|f| f.label.as_str())
            .collect()
    }
}
