use std::sync::Arc;

use hundred_core::model::{ChallengeOutcome, ChallengeState, CourseId, GameMode, UserId};
use tracing::{debug, info};

use super::store::SessionStore;

/// Challenge rules on top of a shared `SessionStore`.
///
/// Constructed once at startup and handed to every request path. Nothing here
/// fails; a user without state is reported as absent or as "not playing".
#[derive(Debug, Clone)]
pub struct ChallengeManager {
    store: Arc<SessionStore>,
}

impl ChallengeManager {
    #[must_use]
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Start (or restart) a challenge. Any previous state is overwritten.
    pub fn create_state(&self, user_id: UserId, mode: GameMode) -> ChallengeState {
        let state = ChallengeState::new(mode);
        self.store.put(user_id, state);
        info!(target: "challenge", %user_id, %mode, "Challenge state created");
        state
    }

    #[must_use]
    pub fn state(&self, user_id: UserId) -> Option<ChallengeState> {
        self.store.get(user_id)
    }

    /// Drop the user's state (mode exit or administrative clear).
    pub fn delete_state(&self, user_id: UserId) -> Option<ChallengeState> {
        let removed = self.store.delete(user_id);
        if removed.is_some() {
            info!(target: "challenge", %user_id, "Challenge state removed");
        }
        removed
    }

    /// Apply one attempt outcome atomically and return the updated state.
    ///
    /// No-op returning `None` when the user has no state.
    pub fn update_result(&self, user_id: UserId, success: bool) -> Option<ChallengeState> {
        self.store.update(user_id, |state| {
            state.apply_result(success);
            *state
        })
    }

    #[must_use]
    pub fn has_won(&self, user_id: UserId) -> bool {
        self.store.get(user_id).is_some_and(|s| s.has_won())
    }

    #[must_use]
    pub fn has_lost(&self, user_id: UserId) -> bool {
        self.store.get(user_id).is_some_and(|s| s.has_lost())
    }

    /// Users outside any challenge can always attempt; players can until they lose.
    #[must_use]
    pub fn can_attempt(&self, user_id: UserId) -> bool {
        self.store.get(user_id).is_none_or(|s| !s.has_lost())
    }

    #[must_use]
    pub fn outcome(&self, user_id: UserId) -> Option<ChallengeOutcome> {
        self.store.get(user_id).map(|s| s.outcome())
    }

    /// True when the user is in the 100-attempt challenge and out of lives.
    #[must_use]
    pub fn is_locked_out(&self, user_id: UserId) -> bool {
        self.store
            .get(user_id)
            .is_some_and(|s| s.mode() == GameMode::HundredAttempt && s.has_lost())
    }

    /// Hook for the start of a course play. Returns whether the play may proceed.
    pub fn on_course_play_initiated(&self, user_id: UserId, course_id: CourseId) -> bool {
        let allowed = self.can_attempt(user_id);
        if !allowed {
            info!(target: "challenge", %user_id, %course_id, "Course play refused: no lives left");
        }
        allowed
    }

    /// Hook for a finished course play. Returns the resulting outcome, or
    /// `None` when the user is not in a challenge.
    pub fn on_course_play_completed(
        &self,
        user_id: UserId,
        course_id: CourseId,
        success: bool,
    ) -> Option<ChallengeOutcome> {
        let state = self.update_result(user_id, success)?;
        let outcome = state.outcome();
        match outcome {
            ChallengeOutcome::Won => info!(
                target: "challenge",
                %user_id,
                courses_cleared = state.courses_cleared(),
                "Challenge won"
            ),
            ChallengeOutcome::Lost => info!(
                target: "challenge",
                %user_id,
                lives_remaining = state.lives_remaining(),
                courses_attempted = state.courses_attempted(),
                "Challenge lost"
            ),
            ChallengeOutcome::Active => debug!(
                target: "challenge",
                %user_id,
                %course_id,
                success,
                lives_remaining = state.lives_remaining(),
                "Attempt recorded"
            ),
        }
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hundred_core::model::{INITIAL_LIVES, WIN_COURSES_CLEARED};

    fn manager() -> ChallengeManager {
        ChallengeManager::new(Arc::new(SessionStore::new()))
    }

    #[test]
    fn create_state_starts_fresh_and_overwrites() {
        let mgr = manager();
        let user = UserId::new(1);

        let created = mgr.create_state(user, GameMode::HundredAttempt);
        assert_eq!(created.lives_remaining(), INITIAL_LIVES);

        mgr.update_result(user, false);
        mgr.create_state(user, GameMode::HundredAttempt);

        let state = mgr.state(user).unwrap();
        assert_eq!(state.lives_remaining(), INITIAL_LIVES);
        assert_eq!(state.courses_cleared(), 0);
        assert_eq!(state.courses_attempted(), 0);
        assert!(!state.last_result());
    }

    #[test]
    fn update_result_without_state_is_noop() {
        let mgr = manager();
        assert!(mgr.update_result(UserId::new(3), true).is_none());
        assert!(mgr.state(UserId::new(3)).is_none());
    }

    #[test]
    fn absent_user_can_attempt_but_has_no_outcome() {
        let mgr = manager();
        let user = UserId::new(2);
        assert!(mgr.can_attempt(user));
        assert!(!mgr.has_won(user));
        assert!(!mgr.has_lost(user));
        assert!(!mgr.is_locked_out(user));
        assert_eq!(mgr.outcome(user), None);
        assert!(mgr.on_course_play_initiated(user, CourseId::new(1)));
        assert_eq!(mgr.on_course_play_completed(user, CourseId::new(1), true), None);
    }

    #[test]
    fn success_and_failure_arithmetic() {
        let mgr = manager();
        let user = UserId::new(4);
        mgr.create_state(user, GameMode::HundredAttempt);

        let after_fail = mgr.update_result(user, false).unwrap();
        assert_eq!(after_fail.lives_remaining(), INITIAL_LIVES - 1);
        assert_eq!(after_fail.courses_attempted(), 1);
        assert_eq!(after_fail.courses_cleared(), 0);

        let after_clear = mgr.update_result(user, true).unwrap();
        assert_eq!(after_clear.lives_remaining(), INITIAL_LIVES);
        assert_eq!(after_clear.courses_attempted(), 2);
        assert_eq!(after_clear.courses_cleared(), 1);
        assert!(after_clear.last_result());
    }

    #[test]
    fn hundred_failures_lose_without_going_negative() {
        let mgr = manager();
        let user = UserId::new(5);
        mgr.create_state(user, GameMode::HundredAttempt);

        for _ in 0..INITIAL_LIVES {
            assert!(mgr.on_course_play_initiated(user, CourseId::new(1)));
            mgr.on_course_play_completed(user, CourseId::new(1), false);
        }

        assert!(mgr.has_lost(user));
        assert!(!mgr.has_won(user));
        assert!(!mgr.can_attempt(user));
        assert!(mgr.is_locked_out(user));
        assert_eq!(mgr.state(user).unwrap().lives_remaining(), 0);
        assert!(!mgr.on_course_play_initiated(user, CourseId::new(2)));

        // Late failure reports still count attempts but lives stay at zero.
        assert_eq!(
            mgr.on_course_play_completed(user, CourseId::new(2), false),
            Some(ChallengeOutcome::Lost)
        );
        let state = mgr.state(user).unwrap();
        assert_eq!(state.lives_remaining(), 0);
        assert_eq!(state.courses_attempted(), INITIAL_LIVES + 1);
    }

    #[test]
    fn hundred_clears_win_with_lives_capped() {
        let mgr = manager();
        let user = UserId::new(6);
        mgr.create_state(user, GameMode::HundredAttempt);

        let mut last = None;
        for i in 0..WIN_COURSES_CLEARED {
            last = mgr.on_course_play_completed(user, CourseId::new(u64::from(i)), true);
            assert_eq!(mgr.state(user).unwrap().lives_remaining(), INITIAL_LIVES);
        }

        assert_eq!(last, Some(ChallengeOutcome::Won));
        let state = mgr.state(user).unwrap();
        assert_eq!(state.courses_cleared(), WIN_COURSES_CLEARED);
        assert!(mgr.has_won(user));
        assert!(!mgr.has_lost(user));
    }

    #[test]
    fn lost_user_outside_challenge_mode_is_not_locked_out() {
        let mgr = manager();
        let user = UserId::new(7);
        mgr.create_state(user, GameMode::None);
        for _ in 0..INITIAL_LIVES {
            mgr.update_result(user, false);
        }
        assert!(mgr.has_lost(user));
        assert!(!mgr.is_locked_out(user));
    }

    #[test]
    fn delete_then_get_is_absent() {
        let mgr = manager();
        let user = UserId::new(8);
        mgr.create_state(user, GameMode::HundredAttempt);
        assert!(mgr.delete_state(user).is_some());
        assert!(mgr.state(user).is_none());
        assert!(mgr.delete_state(user).is_none());
    }
}
