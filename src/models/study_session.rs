//! Persisted study session statistics.
use super::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudyMode {
    #[default]
    Simple,
    Spaced,
}

impl StudyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StudyMode::Simple => "simple",
            StudyMode::Spaced => "spaced",
        }
    }
}

impl FromStr for StudyMode {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "simple" => Ok(StudyMode::Simple),
            "spaced" => Ok(StudyMode::Spaced),
            other => Err(ValidationError::InvalidChoice {
                field: "mode",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StudySession {
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub flashcard_set_id: Option<i64>,
    pub mode: StudyMode,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub cards_studied: u32,
    pub cards_correct: u32,
}

impl StudySession {
    /// Sets `ended_at` the first time it is called; later calls keep the original value.
    pub fn end(&mut self, now: DateTime<Utc>) -> bool {
        if self.ended_at.is_some() {
            return false;
        }
        self.ended_at = Some(now);
        true
    }

    /// Duration in minutes, 0 while the session is still running.
    pub fn duration_minutes(&self) -> f64 {
        match self.ended_at {
            Some(ended) => (ended - self.started_at).num_milliseconds() as f64 / 60_000.0,
            None => 0.0,
        }
    }

    /// Percentage of correct answers, 0 when nothing was studied.
    pub fn accuracy(&self) -> f64 {
        if self.cards_studied == 0 {
            return 0.0;
        }
        f64::from(self.cards_correct) / f64::from(self.cards_studied) * 100.0
    }
}

pub fn validate_counts(cards_studied: u32, cards_correct: u32) -> Result<(), ValidationError> {
    if cards_correct > cards_studied {
        return Err(ValidationError::CorrectExceedsStudied {
            cards_studied,
            cards_correct,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn session() -> StudySession {
        StudySession {
            id: 1,
            user_id: 1,
            flashcard_set_id: Some(3),
            mode: StudyMode::Spaced,
            started_at: Utc.with_ymd_and_hms(2025, 1, 27, 9, 0, 0).unwrap(),
            ended_at: None,
            cards_studied: 0,
            cards_correct: 0,
        }
    }

    #[test]
    fn test_accuracy() {
        let mut session = session();
        assert_eq!(session.accuracy(), 0.0);

        session.cards_studied = 4;
        session.cards_correct = 3;
        assert!((session.accuracy() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_end_is_idempotent() {
        let mut session = session();
        assert_eq!(session.duration_minutes(), 0.0);

        let ended = session.started_at + Duration::seconds(90);
        assert!(session.end(ended));
        assert!(!session.end(ended + Duration::hours(1)));

        assert_eq!(session.ended_at, Some(ended));
        assert!((session.duration_minutes() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_counts() {
        assert!(validate_counts(3, 3).is_ok());
        assert!(matches!(
            validate_counts(2, 3),
            Err(ValidationError::CorrectExceedsStudied { .. })
        ));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("spaced".parse::<StudyMode>().unwrap(), StudyMode::Spaced);
        assert!("cram".parse::<StudyMode>().is_err());
    }
}
