use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive range over a course's observed failure rate (percent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FailureRateRange {
    pub min: i64,
    pub max: i64,
}

impl FailureRateRange {
    #[must_use]
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn contains(&self, rate: i64) -> bool {
        (self.min..=self.max).contains(&rate)
    }
}

/// Difficulty filter requested by the course-world and challenge screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DifficultyBucket {
    #[default]
    All,
    Easy,
    Normal,
    Expert,
    SuperExpert,
}

impl DifficultyBucket {
    const FILTERED: [DifficultyBucket; 4] = [
        DifficultyBucket::Easy,
        DifficultyBucket::Normal,
        DifficultyBucket::Expert,
        DifficultyBucket::SuperExpert,
    ];

    /// Failure-rate range for this bucket; `None` means unfiltered.
    #[must_use]
    pub const fn range(self) -> Option<FailureRateRange> {
        match self {
            DifficultyBucket::All => None,
            DifficultyBucket::Easy => Some(FailureRateRange::new(0, 34)),
            DifficultyBucket::Normal => Some(FailureRateRange::new(35, 74)),
            DifficultyBucket::Expert => Some(FailureRateRange::new(75, 95)),
            DifficultyBucket::SuperExpert => Some(FailureRateRange::new(96, 100)),
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DifficultyBucket::All => "all",
            DifficultyBucket::Easy => "easy",
            DifficultyBucket::Normal => "normal",
            DifficultyBucket::Expert => "expert",
            DifficultyBucket::SuperExpert => "super_expert",
        }
    }

    fn from_range(min: i64, max: i64) -> Self {
        Self::FILTERED
            .into_iter()
            .find(|bucket| bucket.range() == Some(FailureRateRange::new(min, max)))
            .unwrap_or(DifficultyBucket::All)
    }
}

impl fmt::Display for DifficultyBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Map the raw search filter tokens to a difficulty bucket.
///
/// The client sends five strings. Known shapes:
///
/// ```text
/// All          ["",  "",   "",    "0", "0"]
/// Easy         ["1", "0",  "34",  "0", "0"]
/// Normal       ["1", "35", "74",  "0", "0"]
/// Expert       ["1", "75", "95",  "0", "0"]
/// Super Expert ["1", "96", "100", "0", "0"]
/// ```
///
/// Tokens 1 and 2 are the min and max failure rate. Anything that is not one of
/// the four exact ranges, or does not parse, is treated as `All`.
#[must_use]
pub fn classify<S: AsRef<str>>(tokens: &[S]) -> DifficultyBucket {
    let [flag, min, max, ..] = tokens else {
        return DifficultyBucket::All;
    };
    if flag.as_ref() != "1" {
        return DifficultyBucket::All;
    }

    match (min.as_ref().parse::<i64>(), max.as_ref().parse::<i64>()) {
        (Ok(min), Ok(max)) => DifficultyBucket::from_range(min, max),
        _ => DifficultyBucket::All,
    }
}
