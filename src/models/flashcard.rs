//! Flashcard is a pair <front, back> plus its spaced repetition schedule.
use super::{CardSchedule, ValidationError, sm2};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(ValidationError::InvalidChoice {
                field: "difficulty",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Flashcard {
    pub id: i64,
    #[serde(skip)]
    pub set_id: i64,
    pub front: String,
    pub back: String,
    pub difficulty: Difficulty,
    #[serde(flatten)]
    pub schedule: CardSchedule,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flashcard {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        sm2::is_due(&self.schedule, now)
    }

    pub fn interval_days(&self, now: DateTime<Utc>) -> i64 {
        sm2::interval_days(&self.schedule, now)
    }
}

/// Trims both sides of a card and rejects empty text.
pub fn normalize_card_text(front: &str, back: &str) -> Result<(String, String), ValidationError> {
    let front = front.trim();
    if front.is_empty() {
        return Err(ValidationError::Empty("front"));
    }
    let back = back.trim();
    if back.is_empty() {
        return Err(ValidationError::Empty("back"));
    }
    Ok((front.to_string(), back.to_string()))
}
