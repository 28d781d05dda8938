//! In-memory store adapters.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::domain::models::{ArtifactKind, ArtifactLocation, ResourceDescriptor, ResourceTier};
use crate::domain::ports::{ArtifactStore, ResourceStore, StoreError};

/// Artifact store held in memory. Can be switched offline to exercise the
/// unreachable path.
#[derive(Debug)]
pub struct InMemoryArtifactStore {
    name: String,
    kinds: Vec<ArtifactKind>,
    artifacts: RwLock<HashMap<(ArtifactKind, String), Vec<ArtifactLocation>>>,
    offline: AtomicBool,
}

impl InMemoryArtifactStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kinds: ArtifactKind::ALL.to_vec(),
            artifacts: RwLock::new(HashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Restrict the kinds this store answers for.
    pub fn with_kinds(mut self, kinds: &[ArtifactKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    pub fn add(&self, label: &str, kind: ArtifactKind, location: ArtifactLocation) {
        self.artifacts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((kind, label.to_string()))
            .or_default()
            .push(location);
    }

    /// Record one artifact of every kind in `kinds` for `label`.
    pub fn add_all(&self, label: &str, kinds: &[ArtifactKind]) {
        for &kind in kinds {
            self.add(label, kind, ArtifactLocation::new(format!("{}/{label}", kind.as_str())));
        }
    }

    pub fn remove(&self, label: &str, kind: ArtifactKind) {
        self.artifacts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(kind, label.to_string()));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn kinds(&self) -> &[ArtifactKind] {
        &self.kinds
    }

    async fn find(&self, label: &str, kind: ArtifactKind) -> Result<Vec<ArtifactLocation>, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable(format!("{} is offline", self.name)));
        }
        Ok(self
            .artifacts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(kind, label.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Resource store held in memory.
#[derive(Debug, Default)]
pub struct InMemoryResourceStore {
    resources: RwLock<HashMap<String, ResourceDescriptor>>,
    offline: AtomicBool,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource with placeholder content of the given size.
    pub fn insert(&self, id: &str, size: u64, tier: ResourceTier) {
        self.insert_descriptor(ResourceDescriptor {
            id: id.to_string(),
            content: String::new(),
            size,
            tier,
        });
    }

    pub fn insert_descriptor(&self, descriptor: ResourceDescriptor) {
        self.resources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(descriptor.id.clone(), descriptor);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load_resource(&self, id: &str) -> Result<ResourceDescriptor, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable("memory store is offline".to_string()));
        }
        self.resources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
