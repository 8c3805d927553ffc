use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hundred_core::model::{ChallengeState, CourseId, FailureRateRange, UserId};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A stored row could not be decoded into a well-formed value.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// Bulk save finished with failures. The `saved` entries stay committed.
    #[error("saved {saved} states, {} failed: {source}", failed.len())]
    PartialSave {
        saved: usize,
        failed: Vec<UserId>,
        #[source]
        source: Box<StorageError>,
    },
}

/// Durable copy of one user's challenge state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeStateRecord {
    pub user_id: UserId,
    pub state: ChallengeState,
    pub last_updated: DateTime<Utc>,
}

/// Repository contract for persisted challenge states.
///
/// Implementations never see the in-memory session lock; callers hand them
/// copies taken beforehand.
#[async_trait]
pub trait ChallengeStateRepository: Send + Sync {
    /// Insert or overwrite the state for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` or `StorageError::Constraint` if the write fails.
    async fn save(
        &self,
        user_id: UserId,
        state: &ChallengeState,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Fetch the state for `user_id`. A missing record is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::DataIntegrity` if the stored row is malformed.
    async fn load(&self, user_id: UserId) -> Result<Option<ChallengeStateRecord>, StorageError>;

    /// Remove the state for `user_id`. Deleting a missing record succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the delete fails.
    async fn delete(&self, user_id: UserId) -> Result<(), StorageError>;

    /// Read every stored state.
    ///
    /// # Errors
    ///
    /// Any malformed row fails the whole call with `StorageError::DataIntegrity`;
    /// no partial list is returned.
    async fn load_all(&self) -> Result<Vec<ChallengeStateRecord>, StorageError>;

    /// Save every entry of a snapshot, returning how many were written.
    ///
    /// Every entry is attempted. Successful saves are not rolled back when a
    /// later one fails.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::PartialSave` listing the users that failed.
    async fn save_all(
        &self,
        snapshot: &[(UserId, ChallengeState)],
        saved_at: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let mut saved = 0;
        let mut failed = Vec::new();
        let mut first_error = None;

        for (user_id, state) in snapshot {
            match self.save(*user_id, state, saved_at).await {
                Ok(()) => saved += 1,
                Err(err) => {
                    tracing::warn!(target: "persistence", user_id = %user_id, error = %err, "Failed to save challenge state");
                    failed.push(*user_id);
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        match first_error {
            None => Ok(saved),
            Some(source) => Err(StorageError::PartialSave {
                saved,
                failed,
                source: Box::new(source),
            }),
        }
    }
}

/// One row of a ranked course search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedCourse {
    pub data_id: CourseId,
    pub owner: UserId,
    pub size: u32,
    pub name: String,
    pub data_type: u16,
    pub meta_binary: Vec<u8>,
    pub permission: u8,
    pub permission_recipients: Vec<u32>,
    pub delete_permission: u8,
    pub delete_permission_recipients: Vec<u32>,
    pub period: u16,
    pub refer_data_id: u64,
    pub flag: u32,
    pub tags: Vec<String>,
    pub creation_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
    /// Ranking value; for application 0 this is the failure rate.
    pub ranking_value: i64,
}

/// Catalog row as inserted, including the visibility flags the search filters on.
#[derive(Debug, Clone)]
pub struct NewCourseRecord {
    pub course: RankedCourse,
    pub upload_completed: bool,
    pub deleted: bool,
    pub under_review: bool,
}

impl NewCourseRecord {
    /// A course that is visible to searches.
    #[must_use]
    pub fn published(course: RankedCourse) -> Self {
        Self {
            course,
            upload_completed: true,
            deleted: false,
            under_review: false,
        }
    }

    #[must_use]
    pub fn is_searchable(&self) -> bool {
        self.upload_completed && !self.deleted && !self.under_review
    }
}

/// Read side of the course catalog used by recommendations.
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    /// Up to `limit` searchable courses in random order, optionally restricted
    /// to a ranking-value range.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query or row decoding fails.
    async fn random_courses(
        &self,
        limit: u32,
        range: Option<FailureRateRange>,
    ) -> Result<Vec<RankedCourse>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    states: Arc<Mutex<HashMap<UserId, ChallengeStateRecord>>>,
    courses: Arc<Mutex<Vec<NewCourseRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a course to the in-memory catalog.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn insert_course(&self, course: NewCourseRecord) -> Result<(), StorageError> {
        let mut guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.push(course);
        Ok(())
    }
}

#[async_trait]
impl ChallengeStateRepository for InMemoryRepository {
    async fn save(
        &self,
        user_id: UserId,
        state: &ChallengeState,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .states
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(
            user_id,
            ChallengeStateRecord {
                user_id,
                state: *state,
                last_updated: saved_at,
            },
        );
        Ok(())
    }

    async fn load(&self, user_id: UserId) -> Result<Option<ChallengeStateRecord>, StorageError> {
        let guard = self
            .states
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&user_id).cloned())
    }

    async fn delete(&self, user_id: UserId) -> Result<(), StorageError> {
        let mut guard = self
            .states
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&user_id);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<ChallengeStateRecord>, StorageError> {
        let guard = self
            .states
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut records: Vec<_> = guard.values().cloned().collect();
        records.sort_by_key(|r| r.user_id);
        Ok(records)
    }
}

#[async_trait]
impl CourseCatalog for InMemoryRepository {
    async fn random_courses(
        &self,
        limit: u32,
        range: Option<FailureRateRange>,
    ) -> Result<Vec<RankedCourse>, StorageError> {
        let guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut matching: Vec<RankedCourse> = guard
            .iter()
            .filter(|c| c.is_searchable())
            .filter(|c| range.is_none_or(|r| r.contains(c.course.ranking_value)))
            .map(|c| c.course.clone())
            .collect();
        drop(guard);

        matching.shuffle(&mut rand::rng());
        matching.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(matching)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub challenge_states: Arc<dyn ChallengeStateRepository>,
    pub courses: Arc<dyn CourseCatalog>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryRepository::new())
    }

    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let challenge_states: Arc<dyn ChallengeStateRepository> = Arc::new(repo.clone());
        let courses: Arc<dyn CourseCatalog> = Arc::new(repo);
        Self {
            challenge_states,
            courses,
        }
    }
}
