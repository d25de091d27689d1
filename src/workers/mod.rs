//! Worker system — actors that fetch data on behalf of tasks.
//!
//! Core components:
//! - `location` — one worker per location id, processing its queue in order
//! - `feature_definition` — a single worker loading feature definitions
//! - `registry` — location id → worker map owned by the task manager
//!
//! Workers never share state with the manager; they reply with
//! [`TaskMessage`](crate::tasks::TaskMessage)s through a weak handle to the
//! manager's mailbox, so they never keep a stopped manager alive.

pub mod feature_definition;
pub mod location;
pub mod registry;

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::backend::Backend;
use crate::events::EventBus;
use crate::tasks::TaskMessage;

pub use feature_definition::{FeatureDefinitionWorker, FeatureDefinitionWorkerHandle, LoadDefinitions};
pub use location::{LoadLocation, LocationWorker, LocationWorkerHandle};
pub use registry::WorkerRegistry;

/// Shared dependencies for spawning workers. Handed to the task manager so
/// it can create workers on demand.
#[derive(Clone)]
pub struct WorkerSpawner {
    pub backend: Arc<dyn Backend>,
    pub bus: EventBus,
    pub manager: mpsc::WeakUnboundedSender<TaskMessage>,
}

impl WorkerSpawner {
    pub fn new(
        backend: Arc<dyn Backend>,
        bus: EventBus,
        manager: mpsc::WeakUnboundedSender<TaskMessage>,
    ) -> Self {
        Self {
            backend,
            bus,
            manager,
        }
    }

    pub fn spawn_location_worker(&self, location_id: Uuid) -> LocationWorkerHandle {
        tracing::debug!(location_id = %location_id, "Spawning location worker");
        LocationWorker::new(
            location_id,
            self.backend.clone(),
            self.bus.clone(),
            self.manager.clone(),
        )
        .spawn()
    }

    pub fn spawn_feature_definition_worker(&self) -> FeatureDefinitionWorkerHandle {
        FeatureDefinitionWorker::new(self.backend.clone(), self.bus.clone(), self.manager.clone())
            .spawn()
    }
}
