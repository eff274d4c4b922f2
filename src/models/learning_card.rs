//! Wrapper for flashcards that tracks progress within one learning session.
use super::Flashcard;
use super::sm2::{PASSING_QUALITY, ReviewOutcome};

#[derive(Clone, Debug)]
pub struct LearningCard {
    pub flashcard: Flashcard,
    pub is_learned: bool,
    pub last_outcome: Option<ReviewOutcome>,
}

impl LearningCard {
    pub fn new(flashcard: Flashcard) -> Self {
        Self {
            flashcard,
            is_learned: false,
            last_outcome: None,
        }
    }

    /// Stores the reviewed card; grades below 3 keep it in the session.
    pub fn apply_review(&mut self, flashcard: Flashcard, quality: u8, outcome: ReviewOutcome) {
        self.flashcard = flashcard;
        self.is_learned = quality >= PASSING_QUALITY;
        self.last_outcome = Some(outcome);
    }
}
