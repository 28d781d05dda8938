use thiserror::Error;

/// Errors raised by resource and artifact stores
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unreachable: {0}")]
    Unreachable(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Errors raised by the work executor itself, as opposed to a failed task
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The task ran and failed; treated like a failed completion.
    #[error("Dispatch failed: {0}")]
    Failed(String),

    /// The executor cannot be reached at all. Fatal for the session.
    #[error("Executor unreachable: {0}")]
    Unreachable(String),
}
