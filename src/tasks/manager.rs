//! Task manager — accepts new tasks, routes work to workers and tracks
//! progress.
//!
//! The manager is an actor: a single tokio task draining one mailbox. All
//! task state and the location worker registry live inside it, so nothing
//! is shared and every message is handled to completion before the next
//! one is looked at. Callers talk to it through a [`TaskManagerHandle`];
//! nothing they send waits for a reply except the snapshot queries.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::Backend;
use crate::config::AdminConfig;
use crate::error::{FetchError, TaskError};
use crate::events::{AdminEvent, EventBus, ItemUpdated, LogLevel, ProgressMessage};
use crate::model::{aggregate_definitions, FeatureDefinition, Location};
use crate::tasks::messages::TaskMessage;
use crate::tasks::progress::{AdminTask, ExpectedSteps};
use crate::tasks::state::TaskType;
use crate::workers::{
    FeatureDefinitionWorkerHandle, LoadDefinitions, LoadLocation, LocationWorkerHandle,
    WorkerRegistry, WorkerSpawner,
};

/// A registered task plus what the manager needs to drive it.
#[derive(Debug)]
struct TrackedTask {
    task: AdminTask,
    /// Where loading starts; the farm when `None`.
    seed: Option<Location>,
    start_announced: bool,
    end_announced: bool,
}

impl TrackedTask {
    fn new(task: AdminTask, seed: Option<Location>) -> Self {
        Self {
            task,
            seed,
            start_announced: false,
            end_announced: false,
        }
    }
}

/// Cloneable sender side of the task manager.
#[derive(Debug, Clone)]
pub struct TaskManagerHandle {
    tx: mpsc::UnboundedSender<TaskMessage>,
    expected: ExpectedSteps,
}

impl TaskManagerHandle {
    /// Create and queue a task. Returns its id right away; everything else
    /// arrives on the event bus.
    pub fn start_task(
        &self,
        title: impl Into<String>,
        task_type: TaskType,
        seed: Option<Location>,
    ) -> Result<Uuid, TaskError> {
        let task = AdminTask::new(title, task_type, self.expected);
        let task_id = task.id;
        self.send(TaskMessage::NewTask { task, seed })?;
        Ok(task_id)
    }

    /// Start a load task from `seed`, or from the whole farm.
    pub fn start_load(
        &self,
        title: impl Into<String>,
        seed: Option<Location>,
    ) -> Result<Uuid, TaskError> {
        self.start_task(title, TaskType::Load, seed)
    }

    /// Acknowledge a `ClearItems` request for `task_id`.
    pub fn clear_ready(&self, task_id: Uuid) -> Result<(), TaskError> {
        self.send(TaskMessage::ClearReady { task_id })
    }

    /// Have the worker owning `location` load it for `task_id`.
    pub fn dispatch(&self, task_id: Uuid, location: Location) -> Result<(), TaskError> {
        self.send(TaskMessage::Dispatch { task_id, location })
    }

    /// Drop a task from the registry. Work already in flight is not
    /// interrupted; its results are discarded.
    pub fn remove_task(&self, task_id: Uuid) -> Result<(), TaskError> {
        self.send(TaskMessage::RemoveTask { task_id })
    }

    /// Drop every task.
    pub fn clear_tasks(&self) -> Result<(), TaskError> {
        self.send(TaskMessage::ClearTasks)
    }

    /// Snapshot of all registered tasks, oldest first.
    pub async fn tasks(&self) -> Result<Vec<AdminTask>, TaskError> {
        let (reply, rx) = oneshot::channel();
        self.send(TaskMessage::Snapshot { reply })?;
        rx.await.map_err(|_| TaskError::ManagerStopped)
    }

    pub async fn task(&self, task_id: Uuid) -> Result<AdminTask, TaskError> {
        self.tasks()
            .await?
            .into_iter()
            .find(|t| t.id == task_id)
            .ok_or(TaskError::NotFound { id: task_id })
    }

    /// Number of location workers created so far.
    pub async fn worker_count(&self) -> Result<usize, TaskError> {
        let (reply, rx) = oneshot::channel();
        self.send(TaskMessage::WorkerCount { reply })?;
        rx.await.map_err(|_| TaskError::ManagerStopped)
    }

    /// Stop the manager after the messages already queued.
    pub fn shutdown(&self) -> Result<(), TaskError> {
        self.send(TaskMessage::Shutdown)
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, message: TaskMessage) -> Result<(), TaskError> {
        self.tx.send(message).map_err(|_| TaskError::ManagerStopped)
    }
}

/// Owner of every task, the location worker registry and the feature
/// definition worker.
pub struct TaskManager {
    bus: EventBus,
    spawner: WorkerSpawner,
    tasks: HashMap<Uuid, TrackedTask>,
    location_workers: WorkerRegistry<LocationWorkerHandle>,
    definition_worker: FeatureDefinitionWorkerHandle,
}

impl TaskManager {
    /// Start a task manager on its own tokio task.
    ///
    /// The manager stops on [`TaskManagerHandle::shutdown`] or once every
    /// handle has been dropped.
    pub fn spawn(
        config: &AdminConfig,
        backend: Arc<dyn Backend>,
        bus: EventBus,
    ) -> (TaskManagerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let spawner = WorkerSpawner::new(backend, bus.clone(), tx.downgrade());
        let manager = Self::new(bus, spawner);
        let handle = TaskManagerHandle {
            tx,
            expected: ExpectedSteps::for_load(config),
        };
        (handle, tokio::spawn(manager.run(rx)))
    }

    pub fn new(bus: EventBus, spawner: WorkerSpawner) -> Self {
        let definition_worker = spawner.spawn_feature_definition_worker();
        Self {
            bus,
            spawner,
            tasks: HashMap::new(),
            location_workers: WorkerRegistry::new(),
            definition_worker,
        }
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<TaskMessage>) {
        info!("Task manager started");

        while let Some(message) = rx.recv().await {
            if matches!(message, TaskMessage::Shutdown) {
                break;
            }
            self.handle(message);
        }

        let active = self
            .tasks
            .values()
            .filter(|t| t.task.state().is_active())
            .count();
        info!(
            tasks = self.tasks.len(),
            active,
            workers = self.location_workers.len(),
            workers_created = self.location_workers.created(),
            "Task manager stopped"
        );
    }

    fn handle(&mut self, message: TaskMessage) {
        match message {
            TaskMessage::NewTask { task, seed } => self.handle_new_task(task, seed),
            TaskMessage::ClearReady { task_id } => self.handle_clear_ready(task_id),
            TaskMessage::Dispatch { task_id, location } => {
                if self.tasks.contains_key(&task_id) {
                    self.dispatch(task_id, location);
                } else {
                    warn!(task_id = %task_id, "Dispatch for unknown task, dropping");
                }
            }
            TaskMessage::LocationsLoaded {
                task_id,
                location_id,
                locations,
            } => self.handle_locations_loaded(task_id, location_id, locations),
            TaskMessage::LocationLoadFailed {
                task_id,
                location_id,
                error,
            } => self.handle_load_failed(task_id, Some(location_id), &error),
            TaskMessage::FeatureDefinitionsLoaded {
                task_id,
                definitions,
            } => self.handle_definitions_loaded(task_id, definitions),
            TaskMessage::FeatureDefinitionsLoadFailed { task_id, error } => {
                self.handle_load_failed(task_id, None, &error)
            }
            TaskMessage::RemoveTask { task_id } => self.remove_task(task_id),
            TaskMessage::ClearTasks => self.clear_tasks(),
            TaskMessage::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            TaskMessage::WorkerCount { reply } => {
                let _ = reply.send(self.location_workers.len());
            }
            TaskMessage::Shutdown => {}
        }
    }

    fn handle_new_task(&mut self, mut task: AdminTask, seed: Option<Location>) {
        let task_id = task.id;

        if !task.task_type.is_supported() {
            let error = TaskError::UnsupportedType {
                id: task_id,
                task_type: task.task_type,
            };
            self.tasks.remove(&task_id);
            self.bus.log(
                LogLevel::Error,
                format!("Canceling '{}' (ID: '{}'): {}", task.title, task_id, error),
            );
            return;
        }

        info!(task_id = %task_id, title = %task.title, task_type = %task.task_type, "New task");
        self.bus.publish(AdminEvent::NewTask {
            task_id,
            title: task.title.clone(),
            task_type: task.task_type,
        });

        task.begin_preparation();
        let ready = task.preparation().is_done();
        let tracked = self
            .tasks
            .entry(task_id)
            .or_insert_with(|| TrackedTask::new(task, seed));
        report_progress(&self.bus, tracked);

        // Result lists empty themselves and answer with ClearReady.
        self.bus.publish(AdminEvent::ClearItems { task_id });
        if ready {
            self.start_loading(task_id);
        }
    }

    fn handle_clear_ready(&mut self, task_id: Uuid) {
        let Some(tracked) = self.tasks.get_mut(&task_id) else {
            warn!(task_id = %task_id, "Clear acknowledgment for unknown task, dropping");
            return;
        };

        if tracked.task.preparation().is_done() {
            debug!(task_id = %task_id, "Preparation already complete, ignoring acknowledgment");
            return;
        }

        if tracked.task.record_preparation_step(1) {
            report_progress(&self.bus, tracked);
            self.start_loading(task_id);
        }
    }

    /// Kick off the definition load and the first location load.
    fn start_loading(&mut self, task_id: Uuid) {
        let Some(tracked) = self.tasks.get(&task_id) else {
            return;
        };
        let seed = tracked.seed.clone().unwrap_or_else(Location::farm_seed);

        if let Err(work) = self.definition_worker.send(LoadDefinitions { task_id }) {
            warn!("Feature definition worker stopped, restarting it");
            self.definition_worker = self.spawner.spawn_feature_definition_worker();
            let _ = self.definition_worker.send(work);
        }

        self.dispatch(task_id, seed);
    }

    /// Hand `location` to its worker, creating the worker on first use.
    fn dispatch(&mut self, task_id: Uuid, location: Location) {
        let location_id = location.id;

        if self
            .location_workers
            .get(&location_id)
            .is_some_and(LocationWorkerHandle::is_closed)
        {
            warn!(location_id = %location_id, "Location worker stopped, replacing it");
            self.location_workers.remove(&location_id);
        }

        let spawner = &self.spawner;
        let worker = self
            .location_workers
            .get_or_create(location_id, || spawner.spawn_location_worker(location_id));

        if worker.send(LoadLocation { task_id, location }).is_err() {
            warn!(
                task_id = %task_id,
                location_id = %location_id,
                "Location worker rejected work, dropping"
            );
        }
    }

    fn handle_locations_loaded(&mut self, task_id: Uuid, location_id: Uuid, locations: Vec<Location>) {
        let Some(tracked) = self.tasks.get_mut(&task_id) else {
            warn!(
                task_id = %task_id,
                location_id = %location_id,
                "Locations loaded for unknown task, dropping"
            );
            return;
        };

        let definitions = aggregate_definitions(&locations);

        self.bus
            .publish(AdminEvent::LocationsUpdated(ItemUpdated::new(task_id, locations)));

        tracked.task.record_location_step(1);
        report_progress(&self.bus, tracked);

        self.bus.publish(AdminEvent::FeatureDefinitionsUpdated(ItemUpdated::new(
            task_id,
            definitions,
        )));
    }

    fn handle_definitions_loaded(&mut self, task_id: Uuid, definitions: Vec<FeatureDefinition>) {
        let Some(tracked) = self.tasks.get_mut(&task_id) else {
            warn!(task_id = %task_id, "Feature definitions loaded for unknown task, dropping");
            return;
        };

        // An empty farm still completes the step.
        let steps = u32::try_from(definitions.len()).unwrap_or(u32::MAX).max(1);

        self.bus.publish(AdminEvent::FeatureDefinitionsUpdated(ItemUpdated::new(
            task_id,
            definitions,
        )));

        if tracked.task.record_feature_definition_step(steps) {
            report_progress(&self.bus, tracked);
        }
    }

    /// The worker already logged the failure; the task stays where it is.
    fn handle_load_failed(&mut self, task_id: Uuid, location_id: Option<Uuid>, error: &FetchError) {
        match self.tasks.get_mut(&task_id) {
            Some(tracked) => {
                tracked.task.record_fetch_failure();
                debug!(
                    task_id = %task_id,
                    location_id = ?location_id,
                    failures = tracked.task.failed_fetches(),
                    error = %error,
                    "Fetch failed, task stalls"
                );
            }
            None => {
                warn!(task_id = %task_id, error = %error, "Fetch failure for unknown task, dropping");
            }
        }
    }

    fn remove_task(&mut self, task_id: Uuid) {
        if self.tasks.remove(&task_id).is_some() {
            info!(task_id = %task_id, "Task removed");
            self.bus.publish(AdminEvent::TaskRemoved { task_id });
        } else {
            warn!(task_id = %task_id, "Cannot remove unknown task");
        }
    }

    fn clear_tasks(&mut self) {
        let mut removed: Vec<TrackedTask> = self.tasks.drain().map(|(_, t)| t).collect();
        removed.sort_by_key(|t| t.task.created_at);
        info!(count = removed.len(), "Clearing all tasks");
        for tracked in removed {
            self.bus.publish(AdminEvent::TaskRemoved {
                task_id: tracked.task.id,
            });
        }
    }

    fn snapshot(&self) -> Vec<AdminTask> {
        let mut tasks: Vec<AdminTask> = self.tasks.values().map(|t| t.task.clone()).collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }
}

/// Publish the task's progress and announce its start and completion once.
fn report_progress(bus: &EventBus, tracked: &mut TrackedTask) {
    let task = &tracked.task;
    bus.publish(AdminEvent::Progress(ProgressMessage::from(task)));

    if task.start().is_some() && !tracked.start_announced {
        tracked.start_announced = true;
        bus.log(
            LogLevel::Information,
            format!("Started '{}' (ID: '{}')", task.title, task.id),
        );
    }

    if task.end().is_some() && !tracked.end_announced {
        tracked.end_announced = true;
        info!(task_id = %task.id, elapsed = ?task.elapsed(), "Task complete");
        bus.log(
            LogLevel::Information,
            format!("Completed '{}' (ID: '{}')", task.title, task.id),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::backend::DemoBackend;
    use crate::events::LogMessage;
    use crate::model::Scope;

    const WAIT: Duration = Duration::from_secs(5);

    fn start(config: &AdminConfig) -> (TaskManagerHandle, mpsc::UnboundedReceiver<AdminEvent>) {
        let bus = EventBus::new();
        let events = bus.subscribe();
        let (handle, _join) = TaskManager::spawn(config, Arc::new(DemoBackend::new()), bus);
        (handle, events)
    }

    async fn next_where<F>(events: &mut mpsc::UnboundedReceiver<AdminEvent>, mut pred: F) -> AdminEvent
    where
        F: FnMut(&AdminEvent) -> bool,
    {
        timeout(WAIT, async {
            loop {
                let event = events.recv().await.unwrap();
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    fn is_complete(event: &AdminEvent) -> bool {
        matches!(event, AdminEvent::Progress(p) if p.end.is_some())
    }

    #[tokio::test]
    async fn unsupported_type_is_cancelled_with_one_error() {
        let (handle, mut events) = start(&AdminConfig::default());

        let task_id = handle
            .start_task("Activate", TaskType::Activate, None)
            .unwrap();

        match timeout(WAIT, events.recv()).await.unwrap().unwrap() {
            AdminEvent::Log(LogMessage { level, message }) => {
                assert_eq!(level, LogLevel::Error);
                assert!(message.contains(&task_id.to_string()));
            }
            other => panic!("unexpected event {other:?}"),
        }

        assert!(handle.tasks().await.unwrap().is_empty());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn extra_acknowledgments_do_not_reload() {
        let config = AdminConfig {
            preparation_steps_for_load: 1,
            ..AdminConfig::default()
        };
        let (handle, mut events) = start(&config);
        let task_id = handle.start_load("Load", None).unwrap();

        next_where(&mut events, |e| matches!(e, AdminEvent::ClearItems { .. })).await;
        handle.clear_ready(task_id).unwrap();
        handle.clear_ready(task_id).unwrap();
        handle.clear_ready(task_id).unwrap();

        let mut batches = 0;
        next_where(&mut events, |e| {
            if matches!(e, AdminEvent::LocationsUpdated(_)) {
                batches += 1;
            }
            is_complete(e)
        })
        .await;

        // Round trip so every queued acknowledgment has been handled.
        handle.tasks().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        while let Ok(event) = events.try_recv() {
            if matches!(event, AdminEvent::LocationsUpdated(_)) {
                batches += 1;
            }
        }

        assert_eq!(batches, 1);
        assert_eq!(handle.worker_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn acknowledgment_for_unknown_task_is_dropped() {
        let (handle, _events) = start(&AdminConfig::default());

        handle.clear_ready(Uuid::new_v4()).unwrap();

        assert!(handle.tasks().await.unwrap().is_empty());
        assert_eq!(handle.worker_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dispatch_reuses_the_worker_for_a_location() {
        let config = AdminConfig {
            preparation_steps_for_load: 0,
            ..AdminConfig::default()
        };
        let (handle, mut events) = start(&config);
        let task_id = handle.start_load("Load", None).unwrap();
        next_where(&mut events, is_complete).await;

        let site = Location::new(None, "Portal", "http://portal", Scope::Site);
        handle.dispatch(task_id, site.clone()).unwrap();
        handle.dispatch(task_id, site.clone()).unwrap();

        assert_eq!(handle.worker_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn removed_task_ignores_late_results() {
        let (handle, mut events) = start(&AdminConfig::default());
        let task_id = handle.start_load("Load", None).unwrap();
        next_where(&mut events, |e| matches!(e, AdminEvent::ClearItems { .. })).await;

        handle.remove_task(task_id).unwrap();
        next_where(&mut events, |e| matches!(e, AdminEvent::TaskRemoved { .. })).await;

        // Arrives after removal and must not resurrect the task.
        handle.clear_ready(task_id).unwrap();
        assert!(matches!(
            handle.task(task_id).await,
            Err(TaskError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn clear_tasks_announces_each_removal() {
        let (handle, mut events) = start(&AdminConfig::default());
        let first = handle.start_load("First", None).unwrap();
        let second = handle.start_load("Second", None).unwrap();

        handle.clear_tasks().unwrap();

        let mut removed = Vec::new();
        while removed.len() < 2 {
            if let AdminEvent::TaskRemoved { task_id } =
                next_where(&mut events, |e| matches!(e, AdminEvent::TaskRemoved { .. })).await
            {
                removed.push(task_id);
            }
        }
        removed.sort();
        let mut expected = vec![first, second];
        expected.sort();
        assert_eq!(removed, expected);
        assert!(handle.tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn handle_reports_stopped_manager() {
        let (handle, _events) = start(&AdminConfig::default());

        handle.shutdown().unwrap();
        while handle.is_running() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            handle.start_load("Late", None),
            Err(TaskError::ManagerStopped)
        ));
    }
}
