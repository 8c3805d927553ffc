use std::sync::Arc;

use hundred_core::model::{DifficultyBucket, UserId, classify};
use storage::repository::{CourseCatalog, RankedCourse};
use tracing::{info, instrument, warn};

use crate::error::RecommendationError;
use crate::sessions::ChallengeManager;

/// Largest result page the search will serve.
pub const MAX_RESULT_LENGTH: u32 = 25;

/// Clamp a requested result length.
///
/// Values inside `0..=MAX_RESULT_LENGTH` pass through. Anything else, negative
/// values included, becomes `MAX_RESULT_LENGTH` rather than the nearest bound.
#[must_use]
pub fn clamp_result_length(requested: i64) -> u32 {
    match u32::try_from(requested) {
        Ok(length) if length <= MAX_RESULT_LENGTH => length,
        _ => {
            warn!(target: "recommendation", requested, limit = MAX_RESULT_LENGTH, "Limiting course request");
            MAX_RESULT_LENGTH
        }
    }
}

/// Result of a recommendation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recommendation {
    /// Catalog rows, passed through as returned.
    Courses(Vec<RankedCourse>),
    /// The player is out of lives; no catalog query was made.
    NotFound,
}

/// Decides whether and which courses a recommendation search returns.
#[derive(Clone)]
pub struct RecommendationGate {
    manager: ChallengeManager,
    catalog: Arc<dyn CourseCatalog>,
}

impl RecommendationGate {
    #[must_use]
    pub fn new(manager: ChallengeManager, catalog: Arc<dyn CourseCatalog>) -> Self {
        Self { manager, catalog }
    }

    /// Serve one recommended-course search.
    ///
    /// `filter_tokens` is the raw extra-data list from the client; see
    /// `hundred_core::model::classify`.
    ///
    /// # Errors
    ///
    /// Returns `RecommendationError::Catalog` if the catalog query fails.
    #[instrument(level = "debug", skip(self, filter_tokens))]
    pub async fn recommend<S: AsRef<str> + Sync>(
        &self,
        user_id: UserId,
        requested_length: i64,
        filter_tokens: &[S],
    ) -> Result<Recommendation, RecommendationError> {
        let length = clamp_result_length(requested_length);

        if self.manager.is_locked_out(user_id) {
            info!(target: "recommendation", %user_id, "Recommended courses refused: no lives left");
            return Ok(Recommendation::NotFound);
        }

        let difficulty: DifficultyBucket = classify(filter_tokens);
        info!(target: "recommendation", %user_id, %difficulty, length, "Selected difficulty");

        let courses = self
            .catalog
            .random_courses(length, difficulty.range())
            .await?;
        Ok(Recommendation::Courses(courses))
    }
}

impl std::fmt::Debug for RecommendationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationGate")
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}
