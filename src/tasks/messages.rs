//! Messages accepted by the task manager.

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::FetchError;
use crate::model::{FeatureDefinition, Location};
use crate::tasks::progress::AdminTask;

/// Everything the task manager's mailbox accepts, from callers and workers
/// alike. Handled one at a time, to completion.
#[derive(Debug)]
pub enum TaskMessage {
    /// Register and start a task.
    NewTask {
        task: AdminTask,
        seed: Option<Location>,
    },
    /// A result list finished clearing itself for the task.
    ClearReady { task_id: Uuid },
    /// Route a location load to the worker owning that location.
    Dispatch { task_id: Uuid, location: Location },
    LocationsLoaded {
        task_id: Uuid,
        location_id: Uuid,
        locations: Vec<Location>,
    },
    LocationLoadFailed {
        task_id: Uuid,
        location_id: Uuid,
        error: FetchError,
    },
    FeatureDefinitionsLoaded {
        task_id: Uuid,
        definitions: Vec<FeatureDefinition>,
    },
    FeatureDefinitionsLoadFailed { task_id: Uuid, error: FetchError },
    /// Drop one task from the registry.
    RemoveTask { task_id: Uuid },
    /// Drop every task.
    ClearTasks,
    Snapshot {
        reply: oneshot::Sender<Vec<AdminTask>>,
    },
    WorkerCount { reply: oneshot::Sender<usize> },
    Shutdown,
}
