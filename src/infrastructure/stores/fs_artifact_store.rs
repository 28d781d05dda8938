use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::domain::models::{ArtifactIndex, ArtifactKind, ArtifactLocation};
use crate::domain::ports::{ArtifactStore, StoreError};

/// Tag marker, e.g. `@TEST:AUTH-001`.
pub const TAG_PATTERN: &str = r"@(SPEC|TEST|CODE|DOC):([A-Za-z0-9_-]+)";

/// Directories never descended into.
const SKIPPED_DIRS: [&str; 2] = ["target", "node_modules"];

/// Artifact store backed by tag markers in files under a root directory.
///
/// Nothing is cached between lookups, so edits made while a session is
/// blocked are seen on revalidation. A validation run reads the tree once
/// through [`ArtifactStore::index`].
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    name: String,
    root: PathBuf,
    pattern: Regex,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, regex::Error> {
        let root = root.into();
        Ok(Self {
            name: format!("fs:{}", root.display()),
            root,
            pattern: Regex::new(TAG_PATTERN)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree and index every tag occurrence.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn scan(&self) -> Result<ArtifactIndex, StoreError> {
        let root = self.root.clone();
        let pattern = self.pattern.clone();
        let index = tokio::task::spawn_blocking(move || scan_tree(&root, &pattern))
            .await
            .map_err(|e| StoreError::Unreachable(format!("scan task failed: {e}")))??;
        debug!(entries = index.len(), "tag scan complete");
        Ok(index)
    }
}

fn scan_tree(root: &Path, pattern: &Regex) -> Result<ArtifactIndex, StoreError> {
    if !root.is_dir() {
        return Err(StoreError::Unreachable(format!(
            "artifact root {} is not a directory",
            root.display()
        )));
    }

    let mut index = ArtifactIndex::default();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| StoreError::Unreachable(format!("{}: {e}", dir.display())))?;
        let mut entries: Vec<_> = entries
            .filter_map(Result::ok)
            .filter_map(|e| e.file_type().ok().map(|t| (e.path(), t)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (path, file_type) in entries {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            // Linked directories may point back up the tree.
            if file_type.is_symlink() && path.is_dir() {
                debug!(path = %path.display(), "skipping symlinked directory");
                continue;
            }
            if file_type.is_dir() {
                if !SKIPPED_DIRS.contains(&name) {
                    pending.push(path);
                }
                continue;
            }
            // Binary and unreadable files carry no tags.
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            let display = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            for (line_no, line) in content.lines().enumerate() {
                for caps in pattern.captures_iter(line) {
                    let Some(kind) = ArtifactKind::from_tag(&caps[1]) else {
                        continue;
                    };
                    index.insert(&caps[2], kind, ArtifactLocation::at_line(display.clone(), line_no + 1));
                }
            }
        }
    }
    Ok(index)
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, label: &str, kind: ArtifactKind) -> Result<Vec<ArtifactLocation>, StoreError> {
        let index = self.scan().await?;
        Ok(index.locations(label, kind).to_vec())
    }

    async fn index(&self) -> Result<Option<ArtifactIndex>, StoreError> {
        self.scan().await.map(Some)
    }
}
