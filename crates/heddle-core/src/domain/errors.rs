//! Error types and failure classification.

use std::time::Duration;

use thiserror::Error;

use super::task::TaskStatus;

/// FailureKind classifies a failed attempt.
///
/// - Transient: rate limiting / overload, eligible for backoff-and-retry
/// - Terminal: ordinary task failure, surfaces immediately
/// - Crash: the worker itself blew up, never retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Transient,
    Terminal,
    Crash,
}

/// Invalid retry / concurrency parameters or task list. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("base_delay must be positive when max_retries > 0")]
    NonPositiveBaseDelay,

    #[error("max_delay ({max:?}) must not be below base_delay ({base:?})")]
    MaxDelayBelowBase { base: Duration, max: Duration },

    #[error("jitter_factor must be within [0, 1], got {0}")]
    JitterOutOfRange(f64),

    #[error("max_parallel must be within {min}..={max}, got {value}")]
    MaxParallelOutOfRange { value: usize, min: usize, max: usize },

    #[error("pump_interval must be positive")]
    ZeroPumpInterval,

    #[error("duplicate task name: {0}")]
    DuplicateTaskName(String),

    #[error("invalid config file: {0}")]
    Parse(String),
}

/// Errors raised by a worker that are not ordinary task failures.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker crashed: {0}")]
    Crashed(String),

    #[error("failed to start worker process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("worker i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Task persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task store i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task store format error: {0}")]
    Format(#[from] serde_json::Error),

    #[error("task not found in store: {0}")]
    UnknownTask(String),
}

/// Violations of the per-task status lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task '{name}' already resolved as {status}")]
    AlreadyResolved { name: String, status: TaskStatus },

    #[error("task '{name}' can only be resolved to a terminal status")]
    NotTerminal { name: String },

    #[error("no task at index {0}")]
    UnknownIndex(usize),
}

/// Top-level error for a scheduler run.
#[derive(Debug, Error)]
pub enum HeddleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("invalid run state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: super::state::RunState,
        to: super::state::RunState,
    },
}
