//! Task categories and the per-task state machine.

use serde::{Deserialize, Serialize};

/// Category of an admin task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Load locations and feature definitions.
    Load,
    /// Activate features.
    Activate,
    /// Deactivate features.
    Deactivate,
    /// Uninstall feature definitions.
    Uninstall,
}

impl TaskType {
    /// Whether the task manager knows how to run this category.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Load)
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Load => "load",
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::Uninstall => "uninstall",
        };
        write!(f, "{s}")
    }
}

/// State of a task. Declaration order is lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Registered, nothing requested yet.
    Created,
    /// Waiting for result lists to acknowledge the clear request.
    PreparationPending,
    /// Location workers are loading.
    ResourcesLoading,
    /// All location batches are in; feature definitions are still outstanding.
    FeatureDefinitionsAggregating,
    /// Every expected step was recorded.
    Complete,
}

impl TaskState {
    /// Tasks only ever move forward; steps may be skipped.
    pub fn can_transition_to(&self, target: TaskState) -> bool {
        target > *self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Not yet complete.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::PreparationPending => "preparation_pending",
            Self::ResourcesLoading => "resources_loading",
            Self::FeatureDefinitionsAggregating => "feature_definitions_aggregating",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}
