use std::sync::Arc;

use hundred_core::Clock;
use hundred_core::model::{ChallengeState, UserId};
use storage::repository::{ChallengeStateRecord, ChallengeStateRepository, StorageError};
use tracing::{info, instrument, warn};

use super::store::SessionStore;

/// Durable round-trip of challenge state.
///
/// Every call copies what it needs out of the `SessionStore` first and only
/// then talks to the repository, so no store lock is held across I/O. The
/// memory write and the durable write are separate steps: a crash between
/// them loses at most the unsaved changes (best-effort, at-least-once).
#[derive(Clone)]
pub struct SessionPersistence {
    clock: Clock,
    repo: Arc<dyn ChallengeStateRepository>,
}

impl SessionPersistence {
    #[must_use]
    pub fn new(clock: Clock, repo: Arc<dyn ChallengeStateRepository>) -> Self {
        Self { clock, repo }
    }

    /// Upsert one user's state, stamping `last_updated` from the clock.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails. Not retried.
    pub async fn save(&self, user_id: UserId, state: &ChallengeState) -> Result<(), StorageError> {
        self.repo.save(user_id, state, self.clock.now()).await
    }

    /// # Errors
    ///
    /// Returns `StorageError::DataIntegrity` if the stored row is malformed.
    pub async fn load(&self, user_id: UserId) -> Result<Option<ChallengeStateRecord>, StorageError> {
        self.repo.load(user_id).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails. A missing record is fine.
    pub async fn delete(&self, user_id: UserId) -> Result<(), StorageError> {
        self.repo.delete(user_id).await
    }

    /// # Errors
    ///
    /// Returns `StorageError::PartialSave` if any entry failed; the rest stay saved.
    pub async fn save_all(&self, snapshot: &[(UserId, ChallengeState)]) -> Result<usize, StorageError> {
        self.repo.save_all(snapshot, self.clock.now()).await
    }

    /// # Errors
    ///
    /// Returns `StorageError::DataIntegrity` if any row is malformed; nothing is returned then.
    pub async fn load_all(&self) -> Result<Vec<ChallengeStateRecord>, StorageError> {
        self.repo.load_all().await
    }

    /// Mirror one user's in-memory state to the durable store.
    ///
    /// Saves the current copy, or deletes the durable record when the user has
    /// no in-memory state any more.
    ///
    /// Calls are not ordered against each other. Two concurrent calls for the
    /// same user may commit in either order, so an older copy can land last;
    /// the next `persist_user` or `checkpoint` overwrites it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    #[instrument(level = "debug", skip(self, store))]
    pub async fn persist_user(&self, store: &SessionStore, user_id: UserId) -> Result<(), StorageError> {
        match store.get(user_id) {
            Some(state) => self.save(user_id, &state).await,
            None => self.delete(user_id).await,
        }
    }

    /// Snapshot the whole store and save every entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::PartialSave` if some entries could not be written.
    #[instrument(level = "debug", skip_all)]
    pub async fn checkpoint(&self, store: &SessionStore) -> Result<usize, StorageError> {
        let snapshot = store.snapshot();
        let result = self.save_all(&snapshot).await;
        match &result {
            Ok(saved) => info!(target: "persistence", saved, "Checkpoint complete"),
            Err(err) => warn!(target: "persistence", error = %err, "Checkpoint incomplete"),
        }
        result
    }

    /// Replace the store's contents with everything in the durable store.
    ///
    /// The store is only touched after the full load succeeded; a failed load
    /// leaves it exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if reading or decoding any record fails.
    #[instrument(level = "debug", skip_all)]
    pub async fn restore(&self, store: &SessionStore) -> Result<usize, StorageError> {
        let records = self.load_all().await?;
        let restored = store.replace_all(records.into_iter().map(|r| (r.user_id, r.state)));
        info!(target: "persistence", restored, "Challenge states restored");
        Ok(restored)
    }
}

impl std::fmt::Debug for SessionPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPersistence")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
