//! Location id → worker map.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use uuid::Uuid;

/// Maps a resource id to the one worker responsible for it.
///
/// The registry lives inside the task manager and is only touched from the
/// manager's message loop, so lookup-or-create runs without interleaving.
#[derive(Debug)]
pub struct WorkerRegistry<H> {
    workers: HashMap<Uuid, H>,
    created: usize,
}

impl<H> WorkerRegistry<H> {
    pub fn new() -> Self {
        Self {
            workers: HashMap::new(),
            created: 0,
        }
    }

    /// The worker for `id`, creating it with `create` on first use.
    pub fn get_or_create<F>(&mut self, id: Uuid, create: F) -> &H
    where
        F: FnOnce() -> H,
    {
        match self.workers.entry(id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.created += 1;
                entry.insert(create())
            }
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<&H> {
        self.workers.get(id)
    }

    /// Forget the worker for `id`, e.g. after its mailbox closed.
    pub fn remove(&mut self, id: &Uuid) -> Option<H> {
        self.workers.remove(id)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Workers created over the registry's lifetime, including removed ones.
    pub fn created(&self) -> usize {
        self.created
    }
}

impl<H> Default for WorkerRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}
