//! Per-card scheduling state for spaced repetition.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sm2::{DEFAULT_EASE_FACTOR, MIN_EASE_FACTOR};

/// Scheduling fields owned by every flashcard.
///
/// Only [`crate::models::sm2::record_review`] mutates these values; a freshly
/// authored card starts from [`CardSchedule::default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardSchedule {
    pub ease_factor: f64,
    pub review_count: u32,
    pub correct_count: u32,
    #[serde(rename = "last_studied")]
    pub last_studied_at: Option<DateTime<Utc>>,
    #[serde(rename = "next_review")]
    pub next_review_at: Option<DateTime<Utc>>,
}

impl Default for CardSchedule {
    fn default() -> Self {
        Self {
            ease_factor: DEFAULT_EASE_FACTOR,
            review_count: 0,
            correct_count: 0,
            last_studied_at: None,
            next_review_at: None,
        }
    }
}

impl CardSchedule {
    /// True until the first review has been recorded.
    pub fn is_new(&self) -> bool {
        self.review_count == 0
    }

    /// Checks the invariants a stored schedule must satisfy.
    pub fn is_consistent(&self) -> bool {
        self.ease_factor >= MIN_EASE_FACTOR
            && self.correct_count <= self.review_count
            && self.last_studied_at.is_some() == self.next_review_at.is_some()
    }

    /// Share of correct reviews as a percentage, 0 for an unreviewed card.
    pub fn accuracy(&self) -> f64 {
        if self.review_count == 0 {
            return 0.0;
        }
        f64::from(self.correct_count) / f64::from(self.review_count) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let schedule = CardSchedule::default();
        assert_eq!(schedule.ease_factor, 2.5);
        assert_eq!(schedule.review_count, 0);
        assert_eq!(schedule.correct_count, 0);
        assert!(schedule.last_studied_at.is_none());
        assert!(schedule.next_review_at.is_none());
        assert!(schedule.is_new());
        assert!(schedule.is_consistent());
    }

    #[test]
    fn test_inconsistent_counters() {
        let schedule = CardSchedule {
            review_count: 1,
            correct_count: 2,
            ..CardSchedule::default()
        };
        assert!(!schedule.is_consistent());
    }

    #[test]
    fn test_accuracy() {
        let schedule = CardSchedule {
            review_count: 4,
            correct_count: 3,
            ..CardSchedule::default()
        };
        assert!((schedule.accuracy() - 75.0).abs() < f64::EPSILON);
        assert_eq!(CardSchedule::default().accuracy(), 0.0);
    }
}
