use std::sync::Arc;

use hundred_core::Clock;
use storage::repository::Storage;

use crate::error::AppServicesError;
use crate::recommendation::RecommendationGate;
use crate::sessions::{ChallengeManager, SessionPersistence, SessionStore};

/// The single set of service instances a process runs with.
///
/// Built once at startup and cloned (cheaply) into each request path.
#[derive(Clone, Debug)]
pub struct AppServices {
    store: Arc<SessionStore>,
    manager: ChallengeManager,
    persistence: SessionPersistence,
    recommendations: RecommendationGate,
}

impl AppServices {
    /// Wire services over an existing storage bundle. The session store starts empty.
    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        let store = Arc::new(SessionStore::new());
        let manager = ChallengeManager::new(Arc::clone(&store));
        let persistence = SessionPersistence::new(clock, Arc::clone(&storage.challenge_states));
        let recommendations = RecommendationGate::new(manager.clone(), Arc::clone(&storage.courses));

        Self {
            store,
            manager,
            persistence,
            recommendations,
        }
    }

    /// Build services backed by `SQLite` storage and restore persisted sessions.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Sqlite` if storage initialization fails, or
    /// `AppServicesError::Restore` if any persisted session cannot be loaded.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let services = Self::from_storage(&storage, clock);
        services
            .persistence
            .restore(&services.store)
            .await
            .map_err(AppServicesError::Restore)?;
        Ok(services)
    }

    #[must_use]
    pub fn store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.store)
    }

    #[must_use]
    pub fn manager(&self) -> &ChallengeManager {
        &self.manager
    }

    #[must_use]
    pub fn persistence(&self) -> &SessionPersistence {
        &self.persistence
    }

    #[must_use]
    pub fn recommendations(&self) -> &RecommendationGate {
        &self.recommendations
    }
}
