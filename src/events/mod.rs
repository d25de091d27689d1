//! Events published by the task manager and its workers.
//!
//! Three shapes reach observers: progress updates, user-visible log
//! messages, and item-updated notifications carrying freshly computed
//! locations or feature definitions. `NewTask`, `ClearItems` and
//! `TaskRemoved` announce task lifecycle changes.

pub mod bus;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{FeatureDefinition, Location};
use crate::tasks::{AdminTask, TaskState, TaskType};

pub use bus::{EventBus, Subscription};

/// Severity of a user-visible log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Information,
    Warning,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Information => "information",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// A user-visible log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub level: LogLevel,
    pub message: String,
}

impl LogMessage {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Snapshot of a task's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressMessage {
    pub task_id: Uuid,
    pub title: String,
    pub state: TaskState,
    /// Between 0.0 and 1.0.
    pub percent_completed: f64,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl From<&AdminTask> for ProgressMessage {
    fn from(task: &AdminTask) -> Self {
        Self {
            task_id: task.id,
            title: task.title.clone(),
            state: task.state(),
            percent_completed: task.percent_completed(),
            start: task.start(),
            end: task.end(),
        }
    }
}

/// A freshly computed collection of domain items for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdated<T> {
    pub task_id: Uuid,
    pub items: Vec<T>,
}

impl<T> ItemUpdated<T> {
    pub fn new(task_id: Uuid, items: Vec<T>) -> Self {
        Self { task_id, items }
    }
}

/// Everything that travels over the [`EventBus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdminEvent {
    /// A task was accepted by the manager.
    NewTask {
        task_id: Uuid,
        title: String,
        task_type: TaskType,
    },
    /// Result lists should empty themselves and acknowledge with
    /// `TaskManagerHandle::clear_ready`.
    ClearItems { task_id: Uuid },
    Progress(ProgressMessage),
    Log(LogMessage),
    LocationsUpdated(ItemUpdated<Location>),
    FeatureDefinitionsUpdated(ItemUpdated<FeatureDefinition>),
    /// A task was dropped from the registry.
    TaskRemoved { task_id: Uuid },
}

/// Discriminant of [`AdminEvent`], used to subscribe to one kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewTask,
    ClearItems,
    Progress,
    Log,
    LocationsUpdated,
    FeatureDefinitionsUpdated,
    TaskRemoved,
}

impl AdminEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::NewTask { .. } => EventKind::NewTask,
            Self::ClearItems { .. } => EventKind::ClearItems,
            Self::Progress(_) => EventKind::Progress,
            Self::Log(_) => EventKind::Log,
            Self::LocationsUpdated(_) => EventKind::LocationsUpdated,
            Self::FeatureDefinitionsUpdated(_) => EventKind::FeatureDefinitionsUpdated,
            Self::TaskRemoved { .. } => EventKind::TaskRemoved,
        }
    }

    /// Task the event belongs to, if any. Log messages are task-less.
    pub fn task_id(&self) -> Option<Uuid> {
        match self {
            Self::NewTask { task_id, .. }
            | Self::ClearItems { task_id }
            | Self::TaskRemoved { task_id } => Some(*task_id),
            Self::Progress(p) => Some(p.task_id),
            Self::LocationsUpdated(u) => Some(u.task_id),
            Self::FeatureDefinitionsUpdated(u) => Some(u.task_id),
            Self::Log(_) => None,
        }
    }
}
