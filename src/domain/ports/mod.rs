//! Port trait definitions (Hexagonal Architecture)
//!
//! The orchestration core consumes its collaborators only through these
//! interfaces:
//! - `ResourceStore`: knowledge units loaded into context
//! - `ArtifactStore`: labelled artifacts checked at phase gates
//! - `WorkExecutor`: the work behind each task
//! - `PlanSource`: optional pre-decomposed plans
//! - `Clock`: injected time
pub mod artifact_store;
pub mod clock;
pub mod errors;
pub mod plan_source;
pub mod resource_store;
pub mod work_executor;

pub use artifact_store::ArtifactStore;
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{ExecutorError, StoreError};
pub use plan_source::PlanSource;
pub use resource_store::ResourceStore;
pub use work_executor::{CompletionEvent, CompletionStatus, WorkExecutor};
