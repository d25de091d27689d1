//! Per-location worker.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::Backend;
use crate::events::{EventBus, LogLevel};
use crate::model::Location;
use crate::tasks::TaskMessage;

/// One unit of work for a location worker.
#[derive(Debug, Clone)]
pub struct LoadLocation {
    pub task_id: Uuid,
    /// Location to load; for the first load of a task this is the caller
    /// seed or the farm placeholder.
    pub location: Location,
}

/// Mailbox of a running [`LocationWorker`].
#[derive(Debug, Clone)]
pub struct LocationWorkerHandle {
    tx: mpsc::UnboundedSender<LoadLocation>,
}

impl LocationWorkerHandle {
    /// Queue `work`. Fails with the work item when the worker has stopped.
    pub fn send(&self, work: LoadLocation) -> Result<(), LoadLocation> {
        self.tx.send(work).map_err(|e| e.0)
    }

    /// Whether the worker has stopped taking work.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Loads one location, one work item at a time, in arrival order.
pub struct LocationWorker {
    location_id: Uuid,
    backend: Arc<dyn Backend>,
    bus: EventBus,
    manager: mpsc::WeakUnboundedSender<TaskMessage>,
}

impl LocationWorker {
    pub fn new(
        location_id: Uuid,
        backend: Arc<dyn Backend>,
        bus: EventBus,
        manager: mpsc::WeakUnboundedSender<TaskMessage>,
    ) -> Self {
        Self {
            location_id,
            backend,
            bus,
            manager,
        }
    }

    /// Start the worker on its own task.
    pub fn spawn(self) -> LocationWorkerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = LocationWorkerHandle { tx };
        tokio::spawn(self.run(rx));
        handle
    }

    /// Process work until every handle is dropped.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<LoadLocation>) {
        debug!(location_id = %self.location_id, "Location worker started");

        while let Some(work) = rx.recv().await {
            self.process(work).await;
        }

        debug!(location_id = %self.location_id, "Location worker stopped");
    }

    async fn process(&self, work: LoadLocation) {
        let LoadLocation { task_id, location } = work;

        let reply = match self.backend.fetch_locations(&location).await {
            Ok(locations) => {
                info!(
                    task_id = %task_id,
                    location_id = %self.location_id,
                    count = locations.len(),
                    "Locations loaded"
                );
                TaskMessage::LocationsLoaded {
                    task_id,
                    location_id: self.location_id,
                    locations,
                }
            }
            Err(error) => {
                self.bus.log(
                    LogLevel::Error,
                    format!(
                        "Loading location '{}' (ID: '{}') failed for task '{}': {}",
                        location.display_name, location.id, task_id, error
                    ),
                );
                TaskMessage::LocationLoadFailed {
                    task_id,
                    location_id: self.location_id,
                    error,
                }
            }
        };

        match self.manager.upgrade() {
            Some(manager) => {
                if manager.send(reply).is_err() {
                    debug!(task_id = %task_id, "Task manager stopped, dropping location result");
                }
            }
            None => debug!(task_id = %task_id, "Task manager gone, dropping location result"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::timeout;

    use super::*;
    use crate::error::FetchError;
    use crate::events::{AdminEvent, LogMessage};
    use crate::model::{FeatureDefinition, Scope};

    const WAIT: Duration = Duration::from_secs(2);

    /// Answers with the seed itself; the first call is the slowest so that
    /// concurrent processing would reorder results.
    struct EchoBackend {
        calls: Mutex<u32>,
        fail: bool,
    }

    #[async_trait]
    impl Backend for EchoBackend {
        async fn fetch_locations(&self, seed: &Location) -> Result<Vec<Location>, FetchError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            tokio::time::sleep(Duration::from_millis(u64::from(50 / call))).await;
            if self.fail {
                return Err(FetchError::Backend {
                    reason: "offline".to_string(),
                });
            }
            Ok(vec![seed.clone()])
        }

        async fn fetch_feature_definitions(&self) -> Result<Vec<FeatureDefinition>, FetchError> {
            Ok(Vec::new())
        }
    }

    type Spawned = (
        LocationWorkerHandle,
        mpsc::UnboundedReceiver<TaskMessage>,
        mpsc::UnboundedSender<TaskMessage>,
    );

    // The returned sender keeps the fake manager mailbox open.
    fn worker(fail: bool, bus: &EventBus) -> Spawned {
        let (manager_tx, manager_rx) = mpsc::unbounded_channel();
        let backend = Arc::new(EchoBackend {
            calls: Mutex::new(0),
            fail,
        });
        let handle = LocationWorker::new(
            Uuid::new_v4(),
            backend,
            bus.clone(),
            manager_tx.downgrade(),
        )
        .spawn();
        (handle, manager_rx, manager_tx)
    }

    #[tokio::test]
    async fn work_is_processed_in_delivery_order() {
        let bus = EventBus::default();
        let (handle, mut results, _keep) = worker(false, &bus);
        let task_id = Uuid::new_v4();
        let first = Location::new(None, "first", "", Scope::Site);
        let second = Location::new(None, "second", "", Scope::Site);

        handle
            .send(LoadLocation {
                task_id,
                location: first.clone(),
            })
            .unwrap();
        handle
            .send(LoadLocation {
                task_id,
                location: second.clone(),
            })
            .unwrap();

        for expected in [first.id, second.id] {
            match timeout(WAIT, results.recv()).await.unwrap().unwrap() {
                TaskMessage::LocationsLoaded { locations, .. } => {
                    assert_eq!(locations[0].id, expected);
                }
                other => panic!("unexpected message {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn failure_logs_one_error_and_reports_back() {
        let bus = EventBus::default();
        let mut events = bus.subscribe();
        let (handle, mut results, _keep) = worker(true, &bus);
        let task_id = Uuid::new_v4();

        handle
            .send(LoadLocation {
                task_id,
                location: Location::new(None, "Portal", "", Scope::Site),
            })
            .unwrap();

        match timeout(WAIT, results.recv()).await.unwrap().unwrap() {
            TaskMessage::LocationLoadFailed { task_id: id, error, .. } => {
                assert_eq!(id, task_id);
                assert!(matches!(error, FetchError::Backend { .. }));
            }
            other => panic!("unexpected message {other:?}"),
        }

        match events.try_recv().unwrap() {
            AdminEvent::Log(LogMessage { level, message }) => {
                assert_eq!(level, LogLevel::Error);
                assert!(message.contains("Portal"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(events.try_recv().is_err());
    }
}
