//! Learning session management for spaced repetition practice.
//! Handles multi-round flashcard review with SM-2 algorithm integration.

use super::sm2::{PASSING_QUALITY, ReviewError, ReviewOutcome};
use super::{FlashcardSet, LearningCard, StudyMode, StudySession};
use crate::database::{StoreResult, db, sessions};
use chrono::{DateTime, Utc};
use rusqlite::Connection;

/// Manages a learning session with multiple review rounds.
/// Cards that aren't mastered (grade < 3) are repeated in subsequent rounds.
pub struct LearningSession {
    pub user_id: i64,
    pub set_id: i64,
    pub set_name: String,
    pub record: StudySession,
    pub all_cards: Vec<LearningCard>,
    pub current_round_cards: Vec<usize>,
    pub current_index: usize,
    pub show_back: bool,
    pub round_number: usize,
}

impl LearningSession {
    /// Starts a session over the cards of `set` that are due at `now`.
    ///
    /// Returns `None` when nothing is due; no session record is created then.
    pub fn start_for_due_cards(
        conn: &Connection,
        user_id: i64,
        set: &FlashcardSet,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Self>> {
        let due_cards = db::list_flashcards(conn, user_id, set.id, Some(now))?;
        if due_cards.is_empty() {
            return Ok(None);
        }

        let record = sessions::start_session(conn, user_id, Some(set.id), StudyMode::Spaced, now)?;
        let all_cards: Vec<_> = due_cards.into_iter().map(LearningCard::new).collect();
        let indices: Vec<usize> = (0..all_cards.len()).collect();

        Ok(Some(Self {
            user_id,
            set_id: set.id,
            set_name: set.name.clone(),
            record,
            all_cards,
            current_round_cards: indices,
            current_index: 0,
            show_back: false,
            round_number: 1,
        }))
    }

    pub fn current_card(&self) -> Option<&LearningCard> {
        self.current_round_cards
            .get(self.current_index)
            .and_then(|&idx| self.all_cards.get(idx))
    }

    pub fn toggle_back(&mut self) {
        self.show_back = !self.show_back;
    }

    pub fn next_card(&mut self) {
        if self.current_index + 1 < self.current_round_cards.len() {
            self.current_index += 1;
            self.show_back = false;
        } else {
            self.start_next_round();
        }
    }

    /// Starts a new round with cards that weren't mastered (grade < 3).
    /// If no cards remain, the session is complete.
    fn start_next_round(&mut self) {
        let failed_indices: Vec<usize> = self
            .current_round_cards
            .iter()
            .copied()
            .filter(|&idx| self.all_cards.get(idx).is_some_and(|card| !card.is_learned))
            .collect();

        if !failed_indices.is_empty() {
            self.current_round_cards = failed_indices;
            self.current_index = 0;
            self.show_back = false;
            self.round_number += 1;
        }
    }

    /// Grades the current card, persists its new schedule and counts the
    /// result in the session record.
    pub fn grade_current_card(
        &mut self,
        conn: &Connection,
        quality: u8,
        now: DateTime<Utc>,
    ) -> Result<Option<ReviewOutcome>, ReviewError> {
        let Some(&actual_idx) = self.current_round_cards.get(self.current_index) else {
            return Ok(None);
        };
        let Some(card) = self.all_cards.get_mut(actual_idx) else {
            return Ok(None);
        };

        let (reviewed, outcome) =
            db::review_flashcard(conn, self.user_id, card.flashcard.id, i64::from(quality), now)?;
        card.apply_review(reviewed, quality, outcome.clone());

        self.record = sessions::record_session_result(
            conn,
            self.user_id,
            self.record.id,
            quality >= PASSING_QUALITY,
        )?;

        Ok(Some(outcome))
    }

    /// Ends the persisted session record.
    pub fn finish(&mut self, conn: &Connection, now: DateTime<Utc>) -> StoreResult<&StudySession> {
        self.record = sessions::end_session(conn, self.user_id, self.record.id, now)?;
        Ok(&self.record)
    }

    pub fn learned_count(&self) -> usize {
        self.current_round_cards
            .iter()
            .filter(|&&idx| self.all_cards.get(idx).is_some_and(|card| card.is_learned))
            .count()
    }

    pub fn total_count(&self) -> usize {
        self.current_round_cards.len()
    }

    pub fn remaining_count(&self) -> usize {
        self.total_count() - self.learned_count()
    }

    /// Returns true when all cards in the current round have been mastered.
    pub fn is_completed(&self) -> bool {
        self.current_round_cards.is_empty() || self.learned_count() == self.total_count()
    }

    pub fn phase_message(&self) -> String {
        if self.round_number == 1 {
            format!("Round {}: {} cards", self.round_number, self.total_count())
        } else {
            format!(
                "Round {} (Review): {} cards to retry",
                self.round_number,
                self.total_count()
            )
        }
    }
}
