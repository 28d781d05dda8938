//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - programmatic defaults
//! - `.conductor/config.yaml` and `.conductor/local.yaml`
//! - `CONDUCTOR_*` environment overrides
//! - validation of the merged result

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
