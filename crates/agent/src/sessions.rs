//! In-memory store of continuable conversations.
//!
//! Each session id maps to its conversation plus an async lock, so queries
//! against the same session run one at a time while different sessions run
//! concurrently. The store is bounded; when full, the least recently used
//! idle session is evicted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;
use tracing::debug;
use unitypilot_core::message::{Conversation, SessionId};

struct Entry {
    conversation: Conversation,
    lock: Arc<tokio::sync::Mutex<()>>,
    last_used: u64,
}

struct StoreState {
    entries: HashMap<SessionId, Entry>,
    clock: u64,
}

/// A checked-out session: the caller holds the session lock until this is
/// dropped.
pub struct SessionLease {
    pub conversation: Conversation,
    _guard: OwnedMutexGuard<()>,
}

pub struct SessionStore {
    state: Mutex<StoreState>,
    capacity: usize,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(StoreState {
                entries: HashMap::new(),
                clock: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Lock the session and return a working copy of its conversation.
    ///
    /// Unknown ids start an empty conversation. The copy is only written
    /// back through [`SessionStore::commit`].
    pub async fn checkout(&self, id: &SessionId) -> SessionLease {
        let lock = {
            let mut state = self.lock_state();
            state.clock += 1;
            let tick = state.clock;
            let entry = state.entries.entry(id.clone()).or_insert_with(|| Entry {
                conversation: Conversation::with_id(id.clone()),
                lock: Arc::new(tokio::sync::Mutex::new(())),
                last_used: tick,
            });
            entry.last_used = tick;
            let lock = entry.lock.clone();
            Self::evict(&mut state, self.capacity);
            lock
        };

        let guard = lock.lock_owned().await;
        let conversation = self
            .lock_state()
            .entries
            .get(id)
            .map(|entry| entry.conversation.clone())
            .unwrap_or_else(|| Conversation::with_id(id.clone()));

        SessionLease {
            conversation,
            _guard: guard,
        }
    }

    /// Store the conversation of a finished query and release the lease.
    pub fn commit(&self, lease: SessionLease) {
        let SessionLease { conversation, _guard } = lease;
        let mut state = self.lock_state();
        state.clock += 1;
        let tick = state.clock;
        match state.entries.get_mut(&conversation.id) {
            Some(entry) => {
                entry.conversation = conversation;
                entry.last_used = tick;
            }
            None => {
                let id = conversation.id.clone();
                state.entries.insert(
                    id,
                    Entry {
                        conversation,
                        lock: Arc::new(tokio::sync::Mutex::new(())),
                        last_used: tick,
                    },
                );
                Self::evict(&mut state, self.capacity);
            }
        }
    }

    pub fn get(&self, id: &SessionId) -> Option<Conversation> {
        self.lock_state().entries.get(id).map(|e| e.conversation.clone())
    }

    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drop least recently used sessions that nobody holds until the store
    /// fits its capacity.
    fn evict(state: &mut StoreState, capacity: usize) {
        while state.entries.len() > capacity {
            let victim = state
                .entries
                .iter()
                .filter(|(_, entry)| Arc::strong_count(&entry.lock) == 1)
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| id.clone());

            match victim {
                Some(id) => {
                    state.entries.remove(&id);
                    debug!(session_id = %id, "Evicted idle session");
                }
                None => break,
            }
        }
    }
}
