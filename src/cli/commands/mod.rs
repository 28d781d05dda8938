//! CLI command implementations.

pub mod run;
pub mod snapshot;
pub mod validate;
