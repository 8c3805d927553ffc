mod challenge;
mod difficulty;
mod ids;

pub use challenge::{
    ChallengeOutcome, ChallengeState, ChallengeStateError, GameMode, INITIAL_LIVES,
    WIN_COURSES_CLEARED,
};
pub use difficulty::{DifficultyBucket, FailureRateRange, classify};
pub use ids::{CourseId, ParseIdError, UserId};
