//! Traceability gate.
//!
//! For each label scoped to a phase, asks every configured artifact store
//! for each of the four artifact kinds and reports which labels have a
//! complete requirement -> verification -> implementation -> documentation
//! chain. Incompleteness is a finding, not an error; only an unreachable
//! store fails the run.

use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::domain::models::{ArtifactIndex, ArtifactKind, Finding, TraceabilityUnit, ValidationReport};
use crate::domain::ports::{ArtifactStore, StoreError};

/// Infrastructure failure during validation, distinct from a finding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidatorError {
    #[error("Artifact store '{store}' unreachable while looking up {kind} for '{label}': {reason}")]
    StoreUnreachable {
        store: String,
        label: String,
        kind: ArtifactKind,
        reason: String,
    },

    #[error("Artifact store '{store}' unreachable while indexing: {reason}")]
    IndexUnreachable { store: String, reason: String },
}

pub struct TraceabilityValidator {
    stores: Vec<Arc<dyn ArtifactStore>>,
    require_documentation: bool,
}

/// One store as seen by a single validation run.
struct Source<'a> {
    store: &'a dyn ArtifactStore,
    index: Option<ArtifactIndex>,
}

impl TraceabilityValidator {
    pub fn new(stores: Vec<Arc<dyn ArtifactStore>>) -> Self {
        Self {
            stores,
            require_documentation: true,
        }
    }

    /// When false, documentation-only gaps are reported as advisories and
    /// do not gate phase closure.
    pub fn with_required_documentation(mut self, required: bool) -> Self {
        self.require_documentation = required;
        self
    }

    /// Validate `labels`. Duplicates collapse and output is sorted by label.
    ///
    /// Each store is indexed at most once per call, so the cost of a run does
    /// not grow with the number of labels times the size of the store.
    #[instrument(skip(self, labels), fields(labels = labels.len()))]
    pub async fn validate(&self, labels: &[String]) -> Result<ValidationReport, ValidatorError> {
        let unique: BTreeSet<&str> = labels.iter().map(String::as_str).collect();
        let mut report = ValidationReport::default();
        if unique.is_empty() {
            return Ok(report);
        }

        let sources = self.open_sources().await?;
        for label in unique {
            let unit = Self::collect(&sources, label).await?;
            if unit.is_complete() {
                report.complete.push(unit);
                continue;
            }
            let finding = Finding::from_unit(&unit);
            if finding.is_documentation_only() && !self.require_documentation {
                debug!(label, "documentation gap recorded as advisory");
                report.advisories.push(finding);
            } else {
                debug!(label, missing = ?finding.missing, "traceability gap");
                report.incomplete.push(finding);
            }
        }

        info!(
            complete = report.complete.len(),
            incomplete = report.incomplete.len(),
            advisories = report.advisories.len(),
            "traceability validation finished"
        );
        Ok(report)
    }

    async fn open_sources(&self) -> Result<Vec<Source<'_>>, ValidatorError> {
        let mut sources = Vec::with_capacity(self.stores.len());
        for store in &self.stores {
            let index = match store.index().await {
                Ok(index) => index,
                Err(StoreError::NotFound(_)) => Some(ArtifactIndex::default()),
                Err(StoreError::Unreachable(reason)) => {
                    warn!(store = store.name(), %reason, "artifact store unreachable");
                    return Err(ValidatorError::IndexUnreachable {
                        store: store.name().to_string(),
                        reason,
                    });
                }
            };
            sources.push(Source {
                store: store.as_ref(),
                index,
            });
        }
        Ok(sources)
    }

    async fn collect(sources: &[Source<'_>], label: &str) -> Result<TraceabilityUnit, ValidatorError> {
        let mut unit = TraceabilityUnit::new(label);
        for kind in ArtifactKind::ALL {
            for source in sources.iter().filter(|s| s.store.kinds().contains(&kind)) {
                if let Some(index) = &source.index {
                    for location in index.locations(label, kind) {
                        unit.record(kind, location.clone());
                    }
                    continue;
                }
                let store = source.store;
                let locations = match store.find(label, kind).await {
                    Ok(locations) => locations,
                    Err(StoreError::NotFound(_)) => Vec::new(),
                    Err(StoreError::Unreachable(reason)) => {
                        warn!(store = store.name(), label, kind = kind.as_str(), %reason, "artifact store unreachable");
                        return Err(ValidatorError::StoreUnreachable {
                            store: store.name().to_string(),
                            label: label.to_string(),
                            kind,
                            reason,
                        });
                    }
                };
                for location in locations {
                    unit.record(kind, location);
                }
            }
        }
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ArtifactLocation;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MapStore {
        name: String,
        kinds: Vec<ArtifactKind>,
        entries: HashMap<(String, ArtifactKind), Vec<ArtifactLocation>>,
        down: bool,
        indexed: bool,
        index_calls: AtomicUsize,
        find_calls: AtomicUsize,
    }

    impl MapStore {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                kinds: ArtifactKind::ALL.to_vec(),
                entries: HashMap::new(),
                down: false,
                indexed: false,
                index_calls: AtomicUsize::new(0),
                find_calls: AtomicUsize::new(0),
            }
        }

        fn indexed(mut self) -> Self {
            self.indexed = true;
            self
        }

        fn with(mut self, label: &str, kind: ArtifactKind, path: &str) -> Self {
            self.entries
                .entry((label.to_string(), kind))
                .or_default()
                .push(ArtifactLocation::new(path));
            self
        }
    }

    #[async_trait]
    impl ArtifactStore for MapStore {
        fn name(&self) -> &str {
            &self.name
        }

        fn kinds(&self) -> &[ArtifactKind] {
            &self.kinds
        }

        async fn find(&self, label: &str, kind: ArtifactKind) -> Result<Vec<ArtifactLocation>, StoreError> {
            self.find_calls.fetch_add(1, Ordering::SeqCst);
            if self.down {
                return Err(StoreError::Unreachable("connection refused".into()));
            }
            Ok(self.entries.get(&(label.to_string(), kind)).cloned().unwrap_or_default())
        }

        async fn index(&self) -> Result<Option<ArtifactIndex>, StoreError> {
            if !self.indexed {
                return Ok(None);
            }
            self.index_calls.fetch_add(1, Ordering::SeqCst);
            if self.down {
                return Err(StoreError::Unreachable("connection refused".into()));
            }
            let mut index = ArtifactIndex::default();
            for ((label, kind), locations) in &self.entries {
                for location in locations {
                    index.insert(label.clone(), *kind, location.clone());
                }
            }
            Ok(Some(index))
        }
    }

    fn chain(label: &str, kinds: &[ArtifactKind]) -> MapStore {
        kinds
            .iter()
            .fold(MapStore::new("fs"), |s, k| s.with(label, *k, &format!("{}.rs", k.as_str())))
    }

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_missing_doc_is_incomplete() {
        let store = chain(
            "AUTH-001",
            &[
                ArtifactKind::Requirement,
                ArtifactKind::Verification,
                ArtifactKind::Implementation,
            ],
        );
        let validator = TraceabilityValidator::new(vec![Arc::new(store)]);
        let report = validator.validate(&labels(&["AUTH-001"])).await.unwrap();
        assert!(report.complete.is_empty());
        assert_eq!(report.incomplete.len(), 1);
        assert_eq!(report.incomplete[0].missing, vec![ArtifactKind::Documentation]);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_complete_chain_and_idempotence() {
        let store = chain("AUTH-001", &ArtifactKind::ALL);
        let validator = TraceabilityValidator::new(vec![Arc::new(store)]);
        let input = labels(&["AUTH-001", "AUTH-001"]);
        let first = validator.validate(&input).await.unwrap();
        let second = validator.validate(&input).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.complete_labels(), vec!["AUTH-001"]);
        assert!(first.is_clean());
    }

    #[tokio::test]
    async fn test_kinds_union_across_stores() {
        let mut docs = MapStore::new("docs").with("AUTH-001", ArtifactKind::Documentation, "README.md");
        docs.kinds = vec![ArtifactKind::Documentation];
        let code = chain(
            "AUTH-001",
            &[
                ArtifactKind::Requirement,
                ArtifactKind::Verification,
                ArtifactKind::Implementation,
            ],
        );
        let validator = TraceabilityValidator::new(vec![Arc::new(code), Arc::new(docs)]);
        let report = validator.validate(&labels(&["AUTH-001"])).await.unwrap();
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_advisory_documentation_mode() {
        let store = chain(
            "AUTH-001",
            &[
                ArtifactKind::Requirement,
                ArtifactKind::Verification,
                ArtifactKind::Implementation,
            ],
        );
        let validator =
            TraceabilityValidator::new(vec![Arc::new(store)]).with_required_documentation(false);
        let report = validator.validate(&labels(&["AUTH-001", "AUTH-002"])).await.unwrap();
        assert_eq!(report.advisories.len(), 1);
        // AUTH-002 has nothing at all, so it still gates.
        assert_eq!(report.incomplete.len(), 1);
        assert_eq!(report.incomplete[0].label, "AUTH-002");
    }

    #[tokio::test]
    async fn test_unreachable_store_is_an_error() {
        let mut store = MapStore::new("remote");
        store.down = true;
        let validator = TraceabilityValidator::new(vec![Arc::new(store)]);
        let err = validator.validate(&labels(&["AUTH-001"])).await.unwrap_err();
        let ValidatorError::StoreUnreachable { store, label, .. } = err else {
            panic!("expected a per-label lookup failure, got {err:?}");
        };
        assert_eq!(store, "remote");
        assert_eq!(label, "AUTH-001");
    }

    #[tokio::test]
    async fn test_no_labels_is_clean() {
        let validator = TraceabilityValidator::new(vec![Arc::new(MapStore::new("fs"))]);
        let report = validator.validate(&[]).await.unwrap();
        assert!(report.is_clean());
        assert!(report.complete.is_empty());
    }

    #[tokio::test]
    async fn test_indexed_store_is_read_once_per_run() {
        let store = Arc::new(
            chain("AUTH-001", &ArtifactKind::ALL)
                .with("AUTH-002", ArtifactKind::Requirement, "auth.md")
                .indexed(),
        );
        let validator = TraceabilityValidator::new(vec![store.clone()]);

        let input = labels(&["AUTH-001", "AUTH-002", "AUTH-003", "AUTH-004", "AUTH-005"]);
        let report = validator.validate(&input).await.unwrap();
        assert_eq!(report.complete_labels(), vec!["AUTH-001"]);
        assert_eq!(report.incomplete.len(), 4);
        assert_eq!(store.index_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.find_calls.load(Ordering::SeqCst), 0);

        // A second run reads the store again.
        validator.validate(&input).await.unwrap();
        assert_eq!(store.index_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_indexed_and_per_label_lookups_agree() {
        let build = || {
            chain("AUTH-001", &ArtifactKind::ALL)
                .with("AUTH-002", ArtifactKind::Requirement, "auth.md")
                .with("AUTH-002", ArtifactKind::Implementation, "auth.rs")
        };
        let input = labels(&["AUTH-001", "AUTH-002", "AUTH-009"]);

        let per_label = TraceabilityValidator::new(vec![Arc::new(build())]);
        let indexed = TraceabilityValidator::new(vec![Arc::new(build().indexed())]);
        assert_eq!(
            per_label.validate(&input).await.unwrap(),
            indexed.validate(&input).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_unreachable_index_names_the_store() {
        let mut store = MapStore::new("remote").indexed();
        store.down = true;
        let validator = TraceabilityValidator::new(vec![Arc::new(store)]);
        let err = validator.validate(&labels(&["AUTH-001"])).await.unwrap_err();
        assert_eq!(
            err,
            ValidatorError::IndexUnreachable {
                store: "remote".into(),
                reason: "connection refused".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_tree_store_validates_many_labels() {
        use crate::infrastructure::stores::FsArtifactStore;

        let dir = tempfile::TempDir::new().unwrap();
        for i in 0..20 {
            let body = format!("// @SPEC:L-{i} @TEST:L-{i} @CODE:L-{i} @DOC:L-{i}\n");
            std::fs::write(dir.path().join(format!("f{i}.rs")), body).unwrap();
        }
        let store = Arc::new(FsArtifactStore::new(dir.path()).unwrap());
        let validator = TraceabilityValidator::new(vec![store]);

        let input: Vec<String> = (0..20).map(|i| format!("L-{i}")).collect();
        let report = validator.validate(&input).await.unwrap();
        assert_eq!(report.complete.len(), 20);
        assert!(report.is_clean());
    }
}
