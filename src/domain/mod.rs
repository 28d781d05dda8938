//! Domain layer for the orchestration core
//!
//! Models, errors and the ports through which the core reaches its
//! collaborators.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainResult, OrchestrationError};
