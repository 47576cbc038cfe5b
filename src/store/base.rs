use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use super::no_store::NoPersistence;
use crate::models::Session;

/// Where the canonical session is mirrored outside process memory.
///
/// Calls happen while the store holds its write lock, so implementations
/// must not block.
pub trait SessionPersistence: Send + Sync {
    fn save(&self, session: &Session);
    fn remove(&self);
}

/// Owner of the canonical session copy.
///
/// Every write goes to the in-memory copy and to the persistence in the same
/// operation; readers hold a [`SessionView`] and cannot write.
pub struct SessionStore {
    state: watch::Sender<Option<Session>>,
    persistence: Arc<dyn SessionPersistence>,
}

impl SessionStore {
    pub fn new(initial: Option<Session>, persistence: Arc<dyn SessionPersistence>) -> Self {
        let (state, _) = watch::channel(initial);
        SessionStore { state, persistence }
    }

    /// A store with no persisted copy, as used by a single API consumer.
    pub fn in_memory(initial: Option<Session>) -> Self {
        Self::new(initial, Arc::new(NoPersistence::new()))
    }

    pub fn get(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    pub fn set(&self, session: Session) {
        debug!(session_id = %session.id, "Storing session");
        self.state.send_modify(|slot| {
            self.persistence.save(&session);
            *slot = Some(session);
        });
    }

    /// Mutate the stored session in place. `f` returns whether it changed
    /// anything; only then is the change persisted and published.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut Session) -> bool,
    {
        self.state.send_if_modified(|slot| {
            let Some(session) = slot.as_mut() else {
                return false;
            };
            if !f(session) {
                return false;
            }
            self.persistence.save(session);
            true
        })
    }

    /// Drop the session and its persisted copy. Safe to call repeatedly.
    pub fn clear(&self) {
        self.state.send_if_modified(|slot| {
            self.persistence.remove();
            match slot.take() {
                Some(session) => {
                    debug!(session_id = %session.id, "Session cleared");
                    true
                }
                None => false,
            }
        });
    }

    pub fn subscribe(&self) -> SessionView {
        SessionView {
            rx: self.state.subscribe(),
        }
    }
}

/// Read-only mirror of a [`SessionStore`].
#[derive(Clone)]
pub struct SessionView {
    rx: watch::Receiver<Option<Session>>,
}

impl SessionView {
    pub fn current(&self) -> Option<Session> {
        self.rx.borrow().clone()
    }

    /// Wait for the next write. Returns false once the store is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
