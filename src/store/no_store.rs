use super::SessionPersistence;
use crate::models::Session;

/// Persistence that keeps nothing; the session lives only in memory.
pub struct NoPersistence;

impl NoPersistence {
    pub fn new() -> Self {
        NoPersistence
    }
}

impl Default for NoPersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionPersistence for NoPersistence {
    fn save(&self, _session: &Session) {}

    fn remove(&self) {}
}
