use async_trait::async_trait;

use crate::domain::models::ResourceDescriptor;
use crate::domain::ports::errors::StoreError;

/// Source of knowledge units the session can pull into context.
///
/// Loads must be idempotent and free of side effects visible to the
/// controller; the same id always yields the same descriptor.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Store name used in logs and error reports
    fn name(&self) -> &str;

    /// Fetch content, size in budget units and tier for `id`
    async fn load_resource(&self, id: &str) -> Result<ResourceDescriptor, StoreError>;
}
