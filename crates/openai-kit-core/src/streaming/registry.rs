use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use super::session::{SessionId, SessionShared, StreamHandle};

/// Owns the set of live streaming sessions for one client.
///
/// Entries are weak: the registry never keeps a finished session alive. A
/// session leaves the registry when it reaches a terminal state, when it is
/// terminated through here, or when the last registry clone is dropped, which
/// terminates everything still tracked.
#[derive(Debug, Clone, Default)]
pub struct StreamRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug, Default)]
pub(crate) struct RegistryInner {
    sessions: Mutex<HashMap<SessionId, Weak<SessionShared>>>,
}

impl RegistryInner {
    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, Weak<SessionShared>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop the entry of a session that ended on its own.
    pub(crate) fn forget(&self, id: SessionId) {
        if self.sessions().remove(&id).is_some() {
            tracing::trace!(session = %id, "stream finished, unregistered");
        }
    }

    /// Remove the entry, then tear the session down outside the lock.
    pub(crate) fn terminate_and_forget(&self, id: SessionId) -> bool {
        let Some(session) = self.sessions().remove(&id) else {
            return false;
        };
        match session.upgrade() {
            Some(session) => session.terminate(),
            None => false,
        }
    }

    fn terminate_all(&self) -> usize {
        let drained: Vec<_> = self.sessions().drain().map(|(_, session)| session).collect();
        drained
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|session| session.terminate())
            .count()
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        let terminated = self.terminate_all();
        if terminated > 0 {
            tracing::debug!(terminated, "registry dropped, live streams terminated");
        }
    }
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `handle` until it reaches a terminal state.
    ///
    /// Returns false if it was already tracked or has already finished.
    pub fn register(&self, handle: &StreamHandle) -> bool {
        if handle.is_terminal() {
            return false;
        }
        {
            let mut sessions = self.inner.sessions();
            if sessions.contains_key(&handle.id()) {
                return false;
            }
            sessions.insert(handle.id(), handle.downgrade());
            tracing::trace!(session = %handle.id(), live = sessions.len(), "stream registered");
        }
        handle.join(self.downgrade());

        // The session may have finished and left its registries in between
        if handle.is_terminal() {
            self.inner.forget(handle.id());
            return false;
        }
        true
    }

    /// Cancel the session and stop tracking it.
    ///
    /// Returns true if this call is the one that tore the session down. Unknown
    /// ids and sessions already terminated are no-ops.
    pub fn terminate(&self, id: SessionId) -> bool {
        let terminated = self.inner.terminate_and_forget(id);
        if terminated {
            tracing::debug!(session = %id, "stream terminated");
        }
        terminated
    }

    /// Terminate every tracked session; returns how many were torn down.
    pub fn terminate_all(&self) -> usize {
        let terminated = self.inner.terminate_all();
        tracing::debug!(terminated, "all streams terminated");
        terminated
    }

    #[must_use]
    pub fn contains(&self, id: SessionId) -> bool {
        self.inner.sessions().contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.sessions().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn downgrade(&self) -> Weak<RegistryInner> {
        Arc::downgrade(&self.inner)
    }
}
