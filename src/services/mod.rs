//! Orchestration services: the four stateful cores and the controller that
//! drives them.

pub mod budget_ledger;
pub mod dependency_resolver;
pub mod phase_controller;
pub mod policy_selector;
pub mod signal_aggregator;
pub mod templates;
pub mod traceability_validator;

pub use budget_ledger::{BudgetLedger, BudgetThreshold, LedgerState, LoadOutcome, ReserveOutcome, ThresholdEvent};
pub use dependency_resolver::DependencyResolver;
pub use phase_controller::{CancelHandle, PhaseController, SessionSnapshot, SNAPSHOT_VERSION};
pub use policy_selector::{PolicySelector, SelectionInput, SelectorState};
pub use signal_aggregator::{CategoryScores, SignalAggregator};
pub use traceability_validator::{TraceabilityValidator, ValidatorError};
