use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::models::{ResourceDescriptor, ResourceTier};
use crate::domain::ports::{ResourceStore, StoreError};

/// Characters per budget unit when estimating resource size.
pub const CHARS_PER_UNIT: u64 = 4;

/// Resource store reading markdown files `<root>/<id>.md`.
#[derive(Debug, Clone)]
pub struct FsResourceStore {
    name: String,
    root: PathBuf,
    tiers: HashMap<String, ResourceTier>,
    default_tier: ResourceTier,
}

impl FsResourceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            name: format!("fs:{}", root.display()),
            root,
            tiers: HashMap::new(),
            default_tier: ResourceTier::default(),
        }
    }

    /// Override the tier of one resource.
    pub fn with_tier(mut self, id: impl Into<String>, tier: ResourceTier) -> Self {
        self.tiers.insert(id.into(), tier);
        self
    }

    pub fn with_tiers(mut self, tiers: HashMap<String, ResourceTier>) -> Self {
        self.tiers.extend(tiers);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> Option<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !id.starts_with('.');
        valid.then(|| self.root.join(format!("{id}.md")))
    }
}

/// Size in budget units, rounded up.
pub fn estimate_size(content: &str) -> u64 {
    (content.chars().count() as u64).div_ceil(CHARS_PER_UNIT)
}

#[async_trait]
impl ResourceStore for FsResourceStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_resource(&self, id: &str) -> Result<ResourceDescriptor, StoreError> {
        if !tokio::fs::metadata(&self.root).await.is_ok_and(|m| m.is_dir()) {
            return Err(StoreError::Unreachable(format!(
                "resource root {} is not a directory",
                self.root.display()
            )));
        }
        let path = self
            .path_for(id)
            .ok_or_else(|| StoreError::NotFound(format!("invalid resource id '{id}'")))?;

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(e) => return Err(StoreError::Unreachable(format!("{}: {e}", path.display()))),
        };

        let tier = self.tiers.get(id).copied().unwrap_or(self.default_tier);
        let size = estimate_size(&content);
        debug!(resource_id = id, size, tier = %tier, "resource read");
        Ok(ResourceDescriptor {
            id: id.to_string(),
            content,
            size,
            tier,
        })
    }
}
