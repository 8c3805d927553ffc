#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod recommendation;
pub mod sessions;

pub use hundred_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, RecommendationError};
pub use recommendation::{MAX_RESULT_LENGTH, Recommendation, RecommendationGate, clamp_result_length};
pub use sessions::{ChallengeManager, SessionPersistence, SessionStore};
