mod manager;
mod persistence;
mod store;

// Public API of the session subsystem.
pub use manager::ChallengeManager;
pub use persistence::SessionPersistence;
pub use store::SessionStore;
