//! Answer normalization, time-weighted scoring and rank rewards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Points awarded for an instant correct answer.
pub const MAX_POINTS: u32 = 1000;

/// Letter codes interchangeable with positional indexes `0..=3`.
const LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

/// A submitted or expected answer in one of its accepted encodings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAnswer", into = "RawAnswer")]
pub enum Answer {
    /// Positional option index (`0`, `1`, ...).
    ByIndex(u8),
    /// Option letter (`A`..=`D`).
    ByLetter(char),
    /// Free text compared case-insensitively.
    Text(String),
}

/// Form an answer takes before encodings are unified.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Canonical {
    Choice(u8),
    Text(String),
}

impl Answer {
    /// Whether both answers designate the same choice once normalized.
    pub fn matches(&self, other: &Answer) -> bool {
        self.canonical() == other.canonical()
    }

    fn canonical(&self) -> Canonical {
        match self {
            Answer::ByIndex(index) => Canonical::Choice(*index),
            Answer::ByLetter(letter) => match letter_to_index(*letter) {
                Some(index) => Canonical::Choice(index),
                None => Canonical::Text(letter.to_lowercase().collect()),
            },
            Answer::Text(text) => Canonical::Text(text.trim().to_lowercase()),
        }
    }
}

fn letter_to_index(letter: char) -> Option<u8> {
    let upper = letter.to_ascii_uppercase();
    LETTERS
        .iter()
        .position(|candidate| *candidate == upper)
        .map(|index| index as u8)
}

/// Error returned when a wire value cannot be read as an [`Answer`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnswerError {
    /// The index does not fit the platform.
    #[error("answer index {0} is out of range")]
    IndexOutOfRange(u64),
    /// Blank free-text answer.
    #[error("answer must not be empty")]
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawAnswer {
    Index(u64),
    Text(String),
}

impl TryFrom<RawAnswer> for Answer {
    type Error = AnswerError;

    fn try_from(raw: RawAnswer) -> Result<Self, Self::Error> {
        match raw {
            RawAnswer::Index(index) => u8::try_from(index)
                .map(Answer::ByIndex)
                .map_err(|_| AnswerError::IndexOutOfRange(index)),
            RawAnswer::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Err(AnswerError::Empty);
                }
                if let Ok(index) = trimmed.parse::<u8>() {
                    return Ok(Answer::ByIndex(index));
                }
                let mut chars = trimmed.chars();
                if let (Some(letter), None) = (chars.next(), chars.next()) {
                    if letter_to_index(letter).is_some() {
                        return Ok(Answer::ByLetter(letter.to_ascii_uppercase()));
                    }
                }
                Ok(Answer::Text(trimmed.to_string()))
            }
        }
    }
}

impl From<Answer> for RawAnswer {
    fn from(answer: Answer) -> Self {
        match answer {
            Answer::ByIndex(index) => RawAnswer::Index(u64::from(index)),
            Answer::ByLetter(letter) => RawAnswer::Text(letter.to_string()),
            Answer::Text(text) => RawAnswer::Text(text),
        }
    }
}

/// Fraction of the time budget left when the answer came in, within `[0, 1]`.
pub fn time_bonus(time_spent: f64, time_limit: u32) -> f64 {
    if time_limit == 0 || !time_spent.is_finite() {
        return 0.0;
    }
    let limit = f64::from(time_limit);
    ((limit - time_spent) / limit).clamp(0.0, 1.0)
}

/// Points for one answer: half of [`MAX_POINTS`] for being right, the rest scaled by speed.
pub fn compute_points(correct: bool, time_spent: f64, time_limit: u32) -> u32 {
    if !correct {
        return 0;
    }
    let bonus = time_bonus(time_spent, time_limit);
    (f64::from(MAX_POINTS) * (0.5 + 0.5 * bonus)).round() as u32
}

/// Experience granted per final position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RewardTable {
    /// Experience for the winner.
    pub base_xp: u32,
    /// Experience removed for every position below the winner.
    pub step_xp: u32,
    /// Floor every finisher receives.
    pub min_xp: u32,
}

impl Default for RewardTable {
    fn default() -> Self {
        Self {
            base_xp: 100,
            step_xp: 20,
            min_xp: 10,
        }
    }
}

impl RewardTable {
    /// Experience for the zero-based `rank`.
    pub fn reward_for_rank(&self, rank: usize) -> u32 {
        let rank = u32::try_from(rank).unwrap_or(u32::MAX);
        self.base_xp
            .saturating_sub(rank.saturating_mul(self.step_xp))
            .max(self.min_xp)
    }
}
