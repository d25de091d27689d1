//! Feature definition worker.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::Backend;
use crate::events::{EventBus, LogLevel};
use crate::tasks::TaskMessage;

/// Request to load all feature definitions for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadDefinitions {
    pub task_id: Uuid,
}

/// Mailbox of a running [`FeatureDefinitionWorker`].
#[derive(Debug, Clone)]
pub struct FeatureDefinitionWorkerHandle {
    tx: mpsc::UnboundedSender<LoadDefinitions>,
}

impl FeatureDefinitionWorkerHandle {
    pub fn send(&self, work: LoadDefinitions) -> Result<(), LoadDefinitions> {
        self.tx.send(work).map_err(|e| e.0)
    }
}

/// Loads the farm's feature definitions on behalf of tasks.
pub struct FeatureDefinitionWorker {
    backend: Arc<dyn Backend>,
    bus: EventBus,
    manager: mpsc::WeakUnboundedSender<TaskMessage>,
}

impl FeatureDefinitionWorker {
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

    pub fn spawn(self) -> FeatureDefinitionWorkerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(self.run(rx));
        FeatureDefinitionWorkerHandle { tx }
    }

    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<LoadDefinitions>) {
        debug!("Feature definition worker started");
        while let Some(LoadDefinitions { task_id }) = rx.recv().await {
            let reply = match self.backend.fetch_feature_definitions().await {
                Ok(definitions) => {
                    info!(task_id = %task_id, count = definitions.len(), "Feature definitions loaded");
                    TaskMessage::FeatureDefinitionsLoaded {
                        task_id,
                        definitions,
                    }
                }
                Err(error) => {
                    self.bus.log(
                        LogLevel::Error,
                        format!("Loading feature definitions failed for task '{task_id}': {error}"),
                    );
                    TaskMessage::FeatureDefinitionsLoadFailed { task_id, error }
                }
            };

            let Some(manager) = self.manager.upgrade() else {
                debug!("Task manager gone, feature definition worker stopping");
                break;
            };
            let _ = manager.send(reply);
        }
        debug!("Feature definition worker stopped");
    }
}
