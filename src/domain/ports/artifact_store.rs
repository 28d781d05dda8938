use async_trait::async_trait;

use crate::domain::models::{ArtifactIndex, ArtifactKind, ArtifactLocation};
use crate::domain::ports::errors::StoreError;

/// Store of labelled artifacts consulted by the traceability validator.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store name used in logs and error reports
    fn name(&self) -> &str;

    /// Artifact kinds this store can answer for
    fn kinds(&self) -> &[ArtifactKind] {
        &ArtifactKind::ALL
    }

    /// Locations of `kind` artifacts carrying `label`. Empty when none exist.
    async fn find(&self, label: &str, kind: ArtifactKind) -> Result<Vec<ArtifactLocation>, StoreError>;

    /// Everything the store holds, read in one pass. The validator takes one
    /// index per run and answers every lookup from it. Stores that can only
    /// answer per label return `None` and are asked through `find`.
    async fn index(&self) -> Result<Option<ArtifactIndex>, StoreError> {
        Ok(None)
    }
}
