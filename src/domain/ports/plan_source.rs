use async_trait::async_trait;

use crate::domain::models::{Plan, WorkRequest};
use crate::domain::ports::errors::StoreError;

/// Optional supplier of pre-decomposed plans.
#[async_trait]
pub trait PlanSource: Send + Sync {
    /// Plan for `request`, or `None` to fall back to the default templates
    async fn plan_for(&self, request: &WorkRequest) -> Result<Option<Plan>, StoreError>;
}
