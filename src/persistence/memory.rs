use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{Persistence, PersistenceError};
use crate::identity::AgentIdentity;
use crate::rl::approximator::Weights;

#[derive(Debug, Default)]
struct Stored {
    roster: Vec<AgentIdentity>,
    models: HashMap<AgentIdentity, Weights>,
    saves: usize,
}

/// Process-local store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Stored>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a roster.
    pub fn with_roster(roster: Vec<AgentIdentity>) -> Self {
        let store = Self::default();
        store.lock().roster = roster;
        store
    }

    fn lock(&self) -> MutexGuard<'_, Stored> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn roster(&self) -> Vec<AgentIdentity> {
        self.lock().roster.clone()
    }

    pub fn has_model(&self, identity: &AgentIdentity) -> bool {
        self.lock().models.contains_key(identity)
    }

    /// Number of successful model saves.
    pub fn model_saves(&self) -> usize {
        self.lock().saves
    }
}

impl Persistence for MemoryStore {
    fn load_fleet_config(&self) -> Result<Vec<AgentIdentity>, PersistenceError> {
        Ok(self.roster())
    }

    fn save_fleet_config(&self, roster: &[AgentIdentity]) -> Result<(), PersistenceError> {
        self.lock().roster = roster.to_vec();
        Ok(())
    }

    fn load_model_weights(&self, identity: &AgentIdentity) -> Result<Option<Weights>, PersistenceError> {
        Ok(self.lock().models.get(identity).cloned())
    }

    fn save_model_weights(&self, identity: &AgentIdentity, weights: &Weights) -> Result<(), PersistenceError> {
        let mut stored = self.lock();
        stored.models.insert(identity.clone(), weights.clone());
        stored.saves += 1;
        Ok(())
    }
}
