//! Error types for Feature Admin.

use uuid::Uuid;

use crate::tasks::TaskType;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Task-related errors.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task {id} not found")]
    NotFound { id: Uuid },

    #[error("Task {id} has unsupported type {task_type}")]
    UnsupportedType { id: Uuid, task_type: TaskType },

    #[error("Task manager is no longer running")]
    ManagerStopped,
}

/// Errors raised by the data-access layer while loading locations or
/// feature definitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Location {id} not found")]
    LocationNotFound { id: Uuid },

    #[error("Backend request failed: {reason}")]
    Backend { reason: String },
}

/// Result type alias for Feature Admin.
pub type Result<T> = std::result::Result<T, Error>;
