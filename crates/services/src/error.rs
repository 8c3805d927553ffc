//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `RecommendationGate`.
///
/// A locked-out player is not an error; see `Recommendation::NotFound`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecommendationError {
    #[error("course catalog query failed: {0}")]
    Catalog(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error("failed to restore challenge states: {0}")]
    Restore(#[source] StorageError),
}
