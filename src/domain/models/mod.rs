pub mod config;
pub mod phase;
pub mod plan;
pub mod policy;
pub mod report;
pub mod resource;
pub mod session;
pub mod signal;
pub mod task;
pub mod traceability;

pub use config::{
    BudgetConfig, Config, LoggingConfig, PolicyConfig, ProjectConfig, SchedulerConfig,
    SignalConfig, TraceabilityConfig,
};
pub use phase::{Phase, PhaseStatus};
pub use plan::{BudgetRange, PhasePlan, Plan, TaskSpec, WorkRequest, DEFAULT_PHASES};
pub use policy::{
    CommunicationStyle, LexicalMarker, Policy, PolicyDecision, PolicyId, ProjectMode,
    QuestionStyle, RequestMarkers, SelectionReason, SwitchSuppression, Verbosity,
};
pub use report::{
    BlockedReason, BlockedReport, BlockedTask, FailureReason, FailureReport, PhaseOutcome,
    PhaseReport, SessionSummary, WorkflowOutcome,
};
pub use resource::{ResourceDescriptor, ResourceLoad, ResourceTier};
pub use session::{ControllerState, Session, SessionStats, SessionStatus};
pub use signal::{Classification, ExpertiseLevel, Signal, SignalCategory, SignalKind};
pub use task::{BlockReason, Task, TaskStatus};
pub use traceability::{ArtifactIndex, ArtifactKind, ArtifactLocation, Finding, TraceabilityUnit, ValidationReport};
