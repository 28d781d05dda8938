use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::policy::ProjectMode;

/// Main configuration structure for Conductor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Context budget accounting
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Behavioural signal buffer and decay
    #[serde(default)]
    pub signals: SignalConfig,

    /// Policy switching guard
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Phase gate behaviour
    #[serde(default)]
    pub traceability: TraceabilityConfig,

    /// Task dispatch
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Project-level flags and store locations
    #[serde(default)]
    pub project: ProjectConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Budget ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BudgetConfig {
    /// Total context capacity in budget units
    #[serde(default = "default_capacity")]
    pub capacity: u64,

    /// Units consumed before any work starts
    #[serde(default = "default_startup_overhead")]
    pub startup_overhead: u64,

    /// Warning threshold as a fraction of the available pool
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,

    /// Critical threshold as a fraction of the available pool
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f64,
}

const fn default_capacity() -> u64 {
    200_000
}

const fn default_startup_overhead() -> u64 {
    20_000
}

const fn default_warning_threshold() -> f64 {
    0.90
}

const fn default_critical_threshold() -> f64 {
    0.95
}

impl BudgetConfig {
    /// Pool left once the start-up overhead is paid.
    pub const fn available(&self) -> u64 {
        self.capacity.saturating_sub(self.startup_overhead)
    }

    /// Config whose available pool is exactly `available` units.
    pub fn with_available(available: u64) -> Self {
        Self {
            capacity: available,
            startup_overhead: 0,
            ..Self::default()
        }
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            startup_overhead: default_startup_overhead(),
            warning_threshold: default_warning_threshold(),
            critical_threshold: default_critical_threshold(),
        }
    }
}

/// Signal aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SignalConfig {
    /// Ring buffer capacity
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Seconds per decay step
    #[serde(default = "default_half_life_secs")]
    pub half_life_secs: f64,

    /// Multiplier applied per half-life
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,

    /// Score difference needed to leave `intermediate`
    #[serde(default = "default_classification_margin")]
    pub classification_margin: f64,
}

const fn default_buffer_capacity() -> usize {
    50
}

const fn default_half_life_secs() -> f64 {
    300.0
}

const fn default_decay_rate() -> f64 {
    0.5
}

const fn default_classification_margin() -> f64 {
    0.5
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            half_life_secs: default_half_life_secs(),
            decay_rate: default_decay_rate(),
            classification_margin: default_classification_margin(),
        }
    }
}

/// Policy selector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PolicyConfig {
    /// Confidence a new policy must exceed to be applied
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Seconds that must pass between switches
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: i64,

    /// Team projects force the collaboration policy
    #[serde(default = "default_true")]
    pub team_mode_forces_collaboration: bool,
}

const fn default_min_confidence() -> f64 {
    0.7
}

const fn default_cooldown_secs() -> i64 {
    300
}

const fn default_true() -> bool {
    true
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            cooldown_secs: default_cooldown_secs(),
            team_mode_forces_collaboration: true,
        }
    }
}

/// Traceability gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TraceabilityConfig {
    /// Missing documentation gates phase closure when set; otherwise advisory
    #[serde(default = "default_true")]
    pub require_documentation: bool,

    /// Root directory scanned for artifact tags
    #[serde(default = "default_artifact_root")]
    pub artifact_root: PathBuf,
}

fn default_artifact_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for TraceabilityConfig {
    fn default() -> Self {
        Self {
            require_documentation: true,
            artifact_root: default_artifact_root(),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Maximum tasks dispatched in one concurrent batch
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Deadline per dispatched task
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Dispatch attempts before a failing task is blocked
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

const fn default_max_parallel() -> usize {
    4
}

const fn default_task_timeout_secs() -> u64 {
    600
}

const fn default_max_attempts() -> u32 {
    2
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            task_timeout_secs: default_task_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProjectConfig {
    /// Personal or team project
    #[serde(default)]
    pub mode: ProjectMode,

    /// Directory holding `<id>.md` resources
    #[serde(default = "default_resource_root")]
    pub resource_root: PathBuf,
}

fn default_resource_root() -> PathBuf {
    PathBuf::from(".conductor/resources")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            mode: ProjectMode::default(),
            resource_root: default_resource_root(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            retention_days: default_retention_days(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
