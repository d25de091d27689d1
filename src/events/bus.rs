//! In-process event bus fanning out to one unbounded channel per subscriber.
//!
//! [`EventBus`] is the publish/subscribe hub between the task manager, its
//! workers and any observers (result lists, progress bars, log sinks). It is
//! cheap to clone; all clones publish to the same subscribers.
//!
//! Publishing never waits for subscribers. Each subscriber owns its own
//! mailbox and sees every event published after it subscribed, in publish
//! order. A slow subscriber only grows its own mailbox; nothing is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use super::{AdminEvent, EventKind, LogLevel, LogMessage};

type Subscribers = Vec<mpsc::UnboundedSender<AdminEvent>>;

/// Fan-out event bus.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every current subscriber.
    ///
    /// Subscribers whose receiver is gone are pruned. Events published while
    /// nobody is subscribed are dropped.
    pub fn publish(&self, event: AdminEvent) {
        self.lock()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Publish a user-visible log message and mirror it to `tracing`.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Information => tracing::info!(user_visible = true, "{message}"),
            LogLevel::Warning => tracing::warn!(user_visible = true, "{message}"),
            LogLevel::Error => tracing::error!(user_visible = true, "{message}"),
        }
        self.publish(AdminEvent::Log(LogMessage::new(level, message)));
    }

    /// Subscribe to every event published from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<AdminEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    /// Every event published from now on as a stream.
    pub fn stream(&self) -> impl Stream<Item = AdminEvent> + Send + use<> {
        UnboundedReceiverStream::new(self.subscribe())
    }

    /// Run `handler` on its own task for every event of `kind`.
    ///
    /// The handler stops receiving when the returned [`Subscription`] is
    /// dropped.
    pub fn subscribe_kind<F>(&self, kind: EventKind, mut handler: F) -> Subscription
    where
        F: FnMut(AdminEvent) + Send + 'static,
    {
        self.subscribe_with(move |event| {
            if event.kind() == kind {
                handler(event);
            }
        })
    }

    /// Run `handler` on its own task for every event.
    pub fn subscribe_with<F>(&self, mut handler: F) -> Subscription
    where
        F: FnMut(AdminEvent) + Send + 'static,
    {
        let mut rx = self.subscribe();
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                handler(event);
            }
            debug!("Event bus closed");
        });
        Subscription { handle }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|subscriber| !subscriber.is_closed());
        subscribers.len()
    }

    // Poisoning cannot leave the list half-updated.
    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handler registration returned by [`EventBus::subscribe_with`].
/// Dropping it unsubscribes the handler.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stop delivering events to the handler.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
