use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image_suite_core::{BatchRunner, SessionResultStore};
use lru::LruCache;
use uuid::Uuid;

pub type SharedStore = Arc<Mutex<SessionResultStore>>;

pub const DEFAULT_SESSION_CAPACITY: usize = 256;

/// Shared by every request.
///
/// Sessions live in a bounded LRU: once `capacity` sessions exist, creating
/// another drops the least recently used one together with its downloads.
pub struct AppState {
    pub runner: BatchRunner,
    sessions: Mutex<LruCache<Uuid, SharedStore>>,
}

impl AppState {
    pub fn new(runner: BatchRunner) -> Self {
        Self::with_capacity(runner, DEFAULT_SESSION_CAPACITY)
    }

    pub fn with_capacity(runner: BatchRunner, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            runner,
            sessions: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, LruCache<Uuid, SharedStore>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store for `id`, created on first use.
    pub fn session(&self, id: Uuid) -> SharedStore {
        Arc::clone(self.sessions().get_or_insert(id, SharedStore::default))
    }

    /// Store for `id` if the session exists.
    pub fn existing_session(&self, id: Uuid) -> Option<SharedStore> {
        self.sessions().get(&id).cloned()
    }

    /// Forget a session entirely.
    pub fn remove_session(&self, id: Uuid) -> Option<SharedStore> {
        self.sessions().pop(&id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }
}
