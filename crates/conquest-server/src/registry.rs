//! Live sessions and their locks.
//!
//! The registry lock only guards insert/lookup/remove of handles. Game state sits behind one
//! async mutex per session, so actions on different sessions never wait for each other.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use conquest_core::SessionState;
use conquest_protocol::SessionId;
use rand::Rng;
use tokio::sync::{broadcast, Mutex, MutexGuard};

use crate::error::ServiceError;
use crate::protocol::SessionEvent;

/// Attempts at drawing an unused six-digit code before giving up.
const CODE_ATTEMPTS: usize = 64;

/// One session: its state behind a mutex plus the observer channel.
pub struct SessionHandle {
    id: SessionId,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    fn new(state: SessionState, observer_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(observer_buffer.max(1));
        Self {
            id: state.id().clone(),
            state: Mutex::new(state),
            events,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Exclusive access to the session, or [`ServiceError::Busy`] after `timeout`.
    pub async fn lock(
        &self,
        timeout: Duration,
    ) -> Result<MutexGuard<'_, SessionState>, ServiceError> {
        tokio::time::timeout(timeout, self.state.lock())
            .await
            .map_err(|_| ServiceError::Busy(self.id.clone()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Fan out to current observers. Lagging receivers lose old events; nobody blocks.
    pub fn publish(&self, event: SessionEvent) {
        // Err only means nobody is listening
        let _ = self.events.send(event);
    }

    pub fn observer_count(&self) -> usize {
        self.events.receiver_count()
    }
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<SessionHandle>>>,
    observer_buffer: usize,
}

impl SessionRegistry {
    pub fn new(observer_buffer: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            observer_buffer,
        }
    }

    /// Register a new session under a fresh random code.
    ///
    /// `build` receives the code and must produce the session's initial state, plus anything the
    /// caller wants read off that state before it becomes shared. Returns `None` if no unused code
    /// was found.
    pub fn create<T>(
        &self,
        build: impl FnOnce(SessionId) -> (SessionState, T),
    ) -> Option<(Arc<SessionHandle>, T)> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let mut rng = rand::thread_rng();

        let id = (0..CODE_ATTEMPTS)
            .map(|_| SessionId::from_number(rng.gen_range(0..1_000_000)))
            .find(|id| !sessions.contains_key(id))?;

        let (state, extra) = build(id.clone());
        let handle = Arc::new(SessionHandle::new(state, self.observer_buffer));
        sessions.insert(id, Arc::clone(&handle));
        Some((handle, extra))
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn remove(&self, id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    /// Handles of every live session, taken under a short read lock.
    pub fn handles(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
