//! Conductor - phase-gated session orchestrator
//!
//! Conductor drives a unit of work through ordered phases. Each phase is a
//! dependency graph of tasks; a phase may only complete once every
//! traceability label it is accountable for has a requirement, a
//! verification, an implementation and documentation artifact.
//!
//! Four stateful cores sit under the [`services::PhaseController`]:
//!
//! - [`services::BudgetLedger`]: bounded context budget with tiered
//!   reservations, edge-triggered thresholds and LRU eviction
//! - [`services::SignalAggregator`]: time-decayed behaviour signals that
//!   classify user expertise
//! - [`services::PolicySelector`]: communication policy selection with an
//!   anti-thrash guard
//! - [`services::TraceabilityValidator`]: the four-artifact gate
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and ports
//! - **Service Layer** (`services`): the cores and the controller
//! - **Infrastructure Layer** (`infrastructure`): config, logging, stores,
//!   plan files, snapshots
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use conductor::{Config, PhaseController, WorkRequest};
//! use conductor::infrastructure::DryRunExecutor;
//! use conductor::infrastructure::stores::{InMemoryArtifactStore, InMemoryResourceStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut controller = PhaseController::new(
//!         Config::default(),
//!         Arc::new(InMemoryResourceStore::new()),
//!         vec![Arc::new(InMemoryArtifactStore::new("memory"))],
//!         Arc::new(DryRunExecutor::new()),
//!     );
//!     let outcome = controller.run(WorkRequest::new("add login")).await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    Config, Phase, PhaseStatus, Session, SessionStatus, SessionSummary, Task, TaskStatus,
    WorkRequest, WorkflowOutcome,
};
pub use domain::{DomainResult, OrchestrationError};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    BudgetLedger, PhaseController, PolicySelector, SignalAggregator, TraceabilityValidator,
};
