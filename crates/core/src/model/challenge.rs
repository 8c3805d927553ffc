use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lives granted when a challenge starts; also the cap for regained lives.
pub const INITIAL_LIVES: u32 = 100;

/// Number of cleared courses that wins the challenge.
pub const WIN_COURSES_CLEARED: u32 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChallengeStateError {
    #[error("unknown game mode: {0}")]
    UnknownMode(String),

    #[error("lives remaining ({lives}) exceeds initial lives ({INITIAL_LIVES})")]
    LivesOutOfRange { lives: u32 },

    #[error("courses cleared ({cleared}) exceeds courses attempted ({attempted})")]
    ClearedExceedsAttempted { cleared: u32, attempted: u32 },
}

/// Play mode a user is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameMode {
    #[default]
    None,
    /// The "100 Mario" challenge: clear 100 courses before running out of lives.
    HundredAttempt,
}

impl GameMode {
    /// Stable storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GameMode::None => "None",
            GameMode::HundredAttempt => "100Man",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = ChallengeStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(GameMode::None),
            "100Man" => Ok(GameMode::HundredAttempt),
            other => Err(ChallengeStateError::UnknownMode(other.to_owned())),
        }
    }
}

/// Where a live challenge stands.
///
/// A user without any state is simply absent; there is no variant for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeOutcome {
    Active,
    Won,
    Lost,
}

/// Per-user challenge progress.
///
/// Invariants: `lives_remaining <= INITIAL_LIVES` and
/// `courses_cleared <= courses_attempted`. Lives saturate at zero on failure.
/// Deserialization goes through `from_persisted`, so decoded values hold the
/// same invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChallengeState")]
pub struct ChallengeState {
    mode: GameMode,
    lives_remaining: u32,
    courses_cleared: u32,
    courses_attempted: u32,
    last_result: bool,
}

/// Unchecked wire shape of `ChallengeState`.
#[derive(Deserialize)]
struct RawChallengeState {
    mode: GameMode,
    lives_remaining: u32,
    courses_cleared: u32,
    courses_attempted: u32,
    last_result: bool,
}

impl TryFrom<RawChallengeState> for ChallengeState {
    type Error = ChallengeStateError;

    fn try_from(raw: RawChallengeState) -> Result<Self, Self::Error> {
        ChallengeState::from_persisted(
            raw.mode,
            raw.lives_remaining,
            raw.courses_cleared,
            raw.courses_attempted,
            raw.last_result,
        )
    }
}

impl ChallengeState {
    /// Fresh state: full lives, zero counters, last result a failure.
    #[must_use]
    pub fn new(mode: GameMode) -> Self {
        Self {
            mode,
            lives_remaining: INITIAL_LIVES,
            courses_cleared: 0,
            courses_attempted: 0,
            last_result: false,
        }
    }

    /// Rehydrate a state from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeStateError::LivesOutOfRange` if lives exceed the initial amount.
    /// Returns `ChallengeStateError::ClearedExceedsAttempted` if the counters disagree.
    pub fn from_persisted(
        mode: GameMode,
        lives_remaining: u32,
        courses_cleared: u32,
        courses_attempted: u32,
        last_result: bool,
    ) -> Result<Self, ChallengeStateError> {
        if lives_remaining > INITIAL_LIVES {
            return Err(ChallengeStateError::LivesOutOfRange {
                lives: lives_remaining,
            });
        }
        if courses_cleared > courses_attempted {
            return Err(ChallengeStateError::ClearedExceedsAttempted {
                cleared: courses_cleared,
                attempted: courses_attempted,
            });
        }

        Ok(Self {
            mode,
            lives_remaining,
            courses_cleared,
            courses_attempted,
            last_result,
        })
    }

    #[must_use]
    pub fn mode(&self) -> GameMode {
        self.mode
    }

    #[must_use]
    pub fn lives_remaining(&self) -> u32 {
        self.lives_remaining
    }

    #[must_use]
    pub fn courses_cleared(&self) -> u32 {
        self.courses_cleared
    }

    #[must_use]
    pub fn courses_attempted(&self) -> u32 {
        self.courses_attempted
    }

    #[must_use]
    pub fn last_result(&self) -> bool {
        self.last_result
    }

    /// Record the outcome of one course attempt.
    ///
    /// A clear regains one life (capped at `INITIAL_LIVES`); a failure costs one,
    /// stopping at zero.
    pub fn apply_result(&mut self, success: bool) {
        self.last_result = success;
        self.courses_attempted = self.courses_attempted.saturating_add(1);

        if success {
            self.courses_cleared = self.courses_cleared.saturating_add(1);
            self.lives_remaining = self.lives_remaining.saturating_add(1).min(INITIAL_LIVES);
        } else {
            self.lives_remaining = self.lives_remaining.saturating_sub(1);
        }
    }

    #[must_use]
    pub fn has_won(&self) -> bool {
        self.courses_cleared >= WIN_COURSES_CLEARED
    }

    #[must_use]
    pub fn has_lost(&self) -> bool {
        self.lives_remaining == 0
    }

    /// Current state-machine position. A win is reported before a loss.
    #[must_use]
    pub fn outcome(&self) -> ChallengeOutcome {
        if self.has_won() {
            ChallengeOutcome::Won
        } else if self.has_lost() {
            ChallengeOutcome::Lost
        } else {
            ChallengeOutcome::Active
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_has_full_lives_and_zero_counters() {
        let state = ChallengeState::new(GameMode::HundredAttempt);
        assert_eq!(state.mode(), GameMode::HundredAttempt);
        assert_eq!(state.lives_remaining(), INITIAL_LIVES);
        assert_eq!(state.courses_cleared(), 0);
        assert_eq!(state.courses_attempted(), 0);
        assert!(!state.last_result());
        assert_eq!(state.outcome(), ChallengeOutcome::Active);
    }

    #[test]
    fn clear_regains_a_life_up_to_the_cap() {
        let mut state = ChallengeState::new(GameMode::HundredAttempt);
        state.apply_result(false);
        assert_eq!(state.lives_remaining(), 99);

        state.apply_result(true);
        assert_eq!(state.lives_remaining(), 100);
        assert_eq!(state.courses_cleared(), 1);
        assert_eq!(state.courses_attempted(), 2);
        assert!(state.last_result());

        state.apply_result(true);
        assert_eq!(state.lives_remaining(), 100);
    }

    #[test]
    fn failure_leaves_cleared_untouched() {
        let mut state = ChallengeState::new(GameMode::HundredAttempt);
        state.apply_result(true);
        state.apply_result(false);
        assert_eq!(state.courses_cleared(), 1);
        assert_eq!(state.courses_attempted(), 2);
        assert_eq!(state.lives_remaining(), 99);
        assert!(!state.last_result());
    }

    #[test]
    fn lives_stop_at_zero() {
        let mut state = ChallengeState::new(GameMode::HundredAttempt);
        for _ in 0..150 {
            state.apply_result(false);
        }
        assert_eq!(state.lives_remaining(), 0);
        assert_eq!(state.courses_attempted(), 150);
        assert!(state.has_lost());
        assert_eq!(state.outcome(), ChallengeOutcome::Lost);
    }

    #[test]
    fn win_is_reported_before_loss() {
        let state = ChallengeState::from_persisted(GameMode::HundredAttempt, 0, 100, 250, false)
            .unwrap();
        assert!(state.has_won());
        assert!(state.has_lost());
        assert_eq!(state.outcome(), ChallengeOutcome::Won);
    }

    #[test]
    fn from_persisted_rejects_broken_counters() {
        assert_eq!(
            ChallengeState::from_persisted(GameMode::HundredAttempt, 101, 0, 0, false),
            Err(ChallengeStateError::LivesOutOfRange { lives: 101 })
        );
        assert_eq!(
            ChallengeState::from_persisted(GameMode::HundredAttempt, 50, 3, 2, true),
            Err(ChallengeStateError::ClearedExceedsAttempted {
                cleared: 3,
                attempted: 2
            })
        );
    }

    #[test]
    fn deserialize_rejects_broken_counters() {
        let json = r#"{"mode":"HundredAttempt","lives_remaining":4294967295,"courses_cleared":7,"courses_attempted":0,"last_result":false}"#;
        let err = serde_json::from_str::<ChallengeState>(json).unwrap_err();
        assert!(err.to_string().contains("exceeds initial lives"), "{err}");

        let json = r#"{"mode":"HundredAttempt","lives_remaining":40,"courses_cleared":7,"courses_attempted":3,"last_result":true}"#;
        assert!(serde_json::from_str::<ChallengeState>(json).is_err());
    }

    #[test]
    fn serialized_state_decodes_to_the_same_value() {
        let mut state = ChallengeState::new(GameMode::HundredAttempt);
        state.apply_result(false);
        state.apply_result(true);

        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(serde_json::from_str::<ChallengeState>(&json).unwrap(), state);
    }

    #[test]
    fn mode_round_trips_through_storage_names() {
        assert_eq!("100Man".parse::<GameMode>(), Ok(GameMode::HundredAttempt));
        assert_eq!("None".parse::<GameMode>(), Ok(GameMode::None));
        assert_eq!(GameMode::HundredAttempt.as_str(), "100Man");
        assert!("100man".parse::<GameMode>().is_err());
    }
}
