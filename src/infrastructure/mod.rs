//! Infrastructure layer module
//!
//! Adapters and ambient plumbing around the orchestration core:
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//! - Filesystem and in-memory stores
//! - YAML plan source
//! - JSON snapshot files
//! - Dry-run work executor
//!
//! Implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod executor;
pub mod logging;
pub mod plan_source;
pub mod snapshot;
pub mod stores;

pub use executor::DryRunExecutor;
pub use plan_source::YamlPlanSource;
pub use snapshot::{load_snapshot, save_snapshot};
