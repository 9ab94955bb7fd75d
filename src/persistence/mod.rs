//! Load/save of the fleet roster and per-agent model weights.
//!
//! A missing file is a fresh start, not an error.

pub mod error;
pub mod file;
pub mod memory;

pub use error::PersistenceError;
pub use file::JsonFileStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use crate::identity::AgentIdentity;
use crate::rl::approximator::Weights;

/// Storage for everything that survives a restart.
pub trait Persistence: Send + Sync {
    /// Persisted agent roster, in slot order. Empty when nothing is stored.
    fn load_fleet_config(&self) -> Result<Vec<AgentIdentity>, PersistenceError>;

    fn save_fleet_config(&self, roster: &[AgentIdentity]) -> Result<(), PersistenceError>;

    /// Stored weights for `identity`, or `None` when there are none.
    fn load_model_weights(&self, identity: &AgentIdentity) -> Result<Option<Weights>, PersistenceError>;

    fn save_model_weights(&self, identity: &AgentIdentity, weights: &Weights) -> Result<(), PersistenceError>;
}

/// Runs `op` against `store` on the blocking thread pool, keeping file I/O
/// off the event loop.
pub async fn run_blocking<T, F>(store: Arc<dyn Persistence>, op: F) -> Result<T, PersistenceError>
where
    T: Send + 'static,
    F: FnOnce(&dyn Persistence) -> Result<T, PersistenceError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| PersistenceError::Background(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocking_operations_reach_the_store() {
        let memory = Arc::new(MemoryStore::default());
        let store: Arc<dyn Persistence> = memory.clone();
        let roster = vec![AgentIdentity::new("Pooled_01").unwrap()];

        let saved = roster.clone();
        run_blocking(Arc::clone(&store), move |s| s.save_fleet_config(&saved))
            .await
            .unwrap();
        let loaded = run_blocking(store, |s| s.load_fleet_config()).await.unwrap();
        assert_eq!(loaded, roster);
        assert_eq!(memory.roster(), roster);
    }

    #[tokio::test]
    async fn panicking_operation_is_a_background_error() {
        let store: Arc<dyn Persistence> = Arc::new(MemoryStore::default());
        let result = run_blocking(store, |_| -> Result<(), PersistenceError> { panic!("disk on fire") }).await;
        assert!(matches!(result, Err(PersistenceError::Background(_))));
    }
}
