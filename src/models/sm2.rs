//! SM-2 variant used to schedule flashcard reviews.
//!
//! The scheduler works on the review history stored in [`CardSchedule`]:
//! - Quality grades 0-5 are the learner's self-assessment of one review
//! - The ease factor moves by a fixed step per grade and never falls below 1.3
//! - The first review is always due again after 1 day
//! - A passed second review (grade >= 3) is due after 6 days, a failed one after 1 day
//! - Later passed reviews multiply the whole days elapsed since the last study by
//!   the updated ease factor; failed ones reset to 1 day
//!
//! The previous interval is not stored. It is approximated from the time elapsed
//! since the card was last studied, so late or early reviews stretch or shrink
//! the next interval accordingly.

use super::{CardSchedule, Flashcard};
use crate::database::StoreError;
use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const MIN_QUALITY: i64 = 0;
pub const MAX_QUALITY: i64 = 5;
pub const PASSING_QUALITY: u8 = 3;

/// Attempts made by [`review_with_retries`] before a concurrent update is reported.
pub const MAX_REVIEW_ATTEMPTS: usize = 3;

/// Base used for later reviews when a card has no last study timestamp.
const FALLBACK_BASE_DAYS: i64 = 6;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("quality must be between 0 and 5, got {0}")]
    InvalidQuality(i64),
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

/// Persistence port used by [`record_review`].
///
/// Implementations must apply `updated` only if the stored review count still
/// equals `expected_review_count`, and report [`StoreError::Conflict`] otherwise.
pub trait CardStore {
    fn save_schedule(
        &self,
        card_id: i64,
        expected_review_count: u32,
        updated: &CardSchedule,
    ) -> Result<(), StoreError>;
}

/// Result of a recorded review, all values taken after the update.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReviewOutcome {
    pub interval: i64,
    #[serde(rename = "next_review")]
    pub next_review_at: DateTime<Utc>,
    pub ease_factor: f64,
    pub review_count: u32,
    pub correct_count: u32,
}

pub fn validate_quality(quality: i64) -> Result<u8, ReviewError> {
    if (MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
        Ok(quality as u8)
    } else {
        Err(ReviewError::InvalidQuality(quality))
    }
}

/// Applies the per-grade ease step and clamps to [`MIN_EASE_FACTOR`].
pub fn adjust_ease_factor(ease_factor: f64, quality: u8) -> f64 {
    let delta = match quality {
        0 | 1 => -0.20,
        2 => -0.10,
        3 => 0.0,
        4 => 0.05,
        _ => 0.10,
    };
    (ease_factor + delta).max(MIN_EASE_FACTOR)
}

/// Days until the next review, computed from the state before this review.
///
/// `ease_factor` is the already adjusted value for the current grade.
pub fn next_interval(
    schedule: &CardSchedule,
    quality: u8,
    ease_factor: f64,
    now: DateTime<Utc>,
) -> i64 {
    let passed = quality >= PASSING_QUALITY;
    match schedule.review_count {
        0 => 1,
        1 if passed => 6,
        1 => 1,
        _ if !passed => 1,
        _ => {
            let base_days = match schedule.last_studied_at {
                Some(last) => (now - last).num_days().max(1),
                None => FALLBACK_BASE_DAYS,
            };
            (base_days as f64 * ease_factor).floor() as i64
        }
    }
}

/// Computes the schedule that results from grading `current` with `quality`.
///
/// Pure: returns the new state and the interval in days without touching storage.
pub fn next_schedule(
    current: &CardSchedule,
    quality: i64,
    now: DateTime<Utc>,
) -> Result<(CardSchedule, i64), ReviewError> {
    let quality = validate_quality(quality)?;

    let ease_factor = adjust_ease_factor(current.ease_factor, quality);
    let interval = next_interval(current, quality, ease_factor, now);

    let correct_count = if quality >= PASSING_QUALITY {
        current.correct_count + 1
    } else {
        current.correct_count
    };

    let updated = CardSchedule {
        ease_factor,
        review_count: current.review_count + 1,
        correct_count,
        last_studied_at: Some(now),
        next_review_at: Some(now + Duration::days(interval)),
    };
    debug_assert!(updated.is_consistent(), "inconsistent schedule {updated:?}");

    Ok((updated, interval))
}

/// Grades `card`, persists the new schedule through `store` and returns the outcome.
///
/// The card is left untouched when the grade is invalid or the store rejects
/// the update.
pub fn record_review<S: CardStore + ?Sized>(
    store: &S,
    card: &mut Flashcard,
    quality: i64,
    now: DateTime<Utc>,
) -> Result<ReviewOutcome, ReviewError> {
    let (updated, interval) = next_schedule(&card.schedule, quality, now)?;

    store.save_schedule(card.id, card.schedule.review_count, &updated)?;
    card.schedule = updated;

    debug!(
        "event=card_review module=sm2 status=ok card_id={} quality={} interval={} ease_factor={:.2} review_count={}",
        card.id, quality, interval, card.schedule.ease_factor, card.schedule.review_count
    );

    Ok(ReviewOutcome {
        interval,
        next_review_at: now + Duration::days(interval),
        ease_factor: card.schedule.ease_factor,
        review_count: card.schedule.review_count,
        correct_count: card.schedule.correct_count,
    })
}

/// Loads a card through `load`, grades it and saves it through `store`.
///
/// When the store reports [`StoreError::Conflict`] the card is loaded again and
/// graded against the fresh state, up to [`MAX_REVIEW_ATTEMPTS`] times in total.
/// Any other error is returned at once.
pub fn review_with_retries<S, L>(
    store: &S,
    mut load: L,
    quality: i64,
    now: DateTime<Utc>,
) -> Result<(Flashcard, ReviewOutcome), ReviewError>
where
    S: CardStore + ?Sized,
    L: FnMut() -> Result<Flashcard, StoreError>,
{
    let mut attempt = 1;
    loop {
        let mut card = load()?;
        match record_review(store, &mut card, quality, now) {
            Ok(outcome) => return Ok((card, outcome)),
            Err(ReviewError::Persistence(StoreError::Conflict { card_id }))
                if attempt < MAX_REVIEW_ATTEMPTS =>
            {
                warn!(
                    "event=card_review module=sm2 status=retry card_id={card_id} attempt={attempt}"
                );
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// A card is due when it was never scheduled or its review time has arrived.
pub fn is_due(schedule: &CardSchedule, now: DateTime<Utc>) -> bool {
    match schedule.next_review_at {
        None => true,
        Some(next) => now >= next,
    }
}

/// Whole days left until the card is due, 0 when it already is.
pub fn interval_days(schedule: &CardSchedule, now: DateTime<Utc>) -> i64 {
    match schedule.next_review_at {
        Some(next) if now < next => (next - now).num_days(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;
    use chrono::TimeZone;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct MemoryStore {
        saved: RefCell<Vec<(i64, u32, CardSchedule)>>,
    }

    impl CardStore for MemoryStore {
        fn save_schedule(
            &self,
            card_id: i64,
            expected_review_count: u32,
            updated: &CardSchedule,
        ) -> Result<(), StoreError> {
            self.saved
                .borrow_mut()
                .push((card_id, expected_review_count, updated.clone()));
            Ok(())
        }
    }

    struct ConflictStore;

    impl CardStore for ConflictStore {
        fn save_schedule(&self, card_id: i64, _: u32, _: &CardSchedule) -> Result<(), StoreError> {
            Err(StoreError::Conflict { card_id })
        }
    }

    /// Stored schedule of one card that loses the first `conflicts` saves to
    /// another reviewer.
    struct RacingStore {
        stored: RefCell<CardSchedule>,
        conflicts: Cell<u32>,
        applied: Cell<u32>,
    }

    impl RacingStore {
        fn new(schedule: CardSchedule, conflicts: u32) -> Self {
            Self {
                stored: RefCell::new(schedule),
                conflicts: Cell::new(conflicts),
                applied: Cell::new(0),
            }
        }

        fn load(&self) -> Result<Flashcard, StoreError> {
            Ok(card_with(self.stored.borrow().clone()))
        }
    }

    impl CardStore for RacingStore {
        fn save_schedule(
            &self,
            card_id: i64,
            expected_review_count: u32,
            updated: &CardSchedule,
        ) -> Result<(), StoreError> {
            if self.conflicts.get() > 0 {
                self.conflicts.set(self.conflicts.get() - 1);
                // The other reviewer's write lands first.
                let mut stored = self.stored.borrow_mut();
                stored.review_count += 1;
                stored.correct_count += 1;
                return Err(StoreError::Conflict { card_id });
            }
            let mut stored = self.stored.borrow_mut();
            if stored.review_count != expected_review_count {
                return Err(StoreError::Conflict { card_id });
            }
            *stored = updated.clone();
            self.applied.set(self.applied.get() + 1);
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 27, 9, 0, 0).unwrap()
    }

    fn new_card() -> Flashcard {
        Flashcard {
            id: 1,
            set_id: 1,
            front: "cześć".to_string(),
            back: "hello".to_string(),
            difficulty: Difficulty::Medium,
            schedule: CardSchedule::default(),
            created_at: now(),
            updated_at: now(),
        }
    }

    fn card_with(schedule: CardSchedule) -> Flashcard {
        Flashcard {
            schedule,
            ..new_card()
        }
    }

    #[test]
    fn test_first_review_is_one_day_for_any_quality() {
        for quality in 0..=5 {
            let store = MemoryStore::default();
            let mut card = new_card();
            let outcome = record_review(&store, &mut card, quality, now()).unwrap();
            assert_eq!(outcome.interval, 1, "quality {quality}");
            assert_eq!(outcome.review_count, 1);
        }
    }

    #[test]
    fn test_second_review() {
        let schedule = CardSchedule {
            review_count: 1,
            correct_count: 1,
            last_studied_at: Some(now() - Duration::days(1)),
            next_review_at: Some(now()),
            ..CardSchedule::default()
        };

        let store = MemoryStore::default();
        let mut passed = card_with(schedule.clone());
        assert_eq!(record_review(&store, &mut passed, 4, now()).unwrap().interval, 6);

        let mut failed = card_with(schedule);
        assert_eq!(record_review(&store, &mut failed, 2, now()).unwrap().interval, 1);
    }

    #[test]
    fn test_ease_factor_deltas() {
        let expected = [(0, 2.30), (1, 2.30), (2, 2.40), (3, 2.50), (4, 2.55), (5, 2.60)];
        for (quality, ease) in expected {
            let (updated, _) = next_schedule(&CardSchedule::default(), quality, now()).unwrap();
            assert!(
                (updated.ease_factor - ease).abs() < 0.001,
                "quality {quality} gave {}",
                updated.ease_factor
            );
        }
    }

    #[test]
    fn test_ef_floor() {
        let store = MemoryStore::default();
        let mut card = new_card();
        for step in 0..20 {
            record_review(&store, &mut card, step % 2, now() + Duration::days(step)).unwrap();
            assert!(card.schedule.ease_factor >= MIN_EASE_FACTOR);
        }
        assert!((card.schedule.ease_factor - MIN_EASE_FACTOR).abs() < 1e-9);
    }

    #[test]
    fn test_counters_move_by_one() {
        let store = MemoryStore::default();
        let mut card = new_card();
        let grades = [5, 1, 3, 0, 4, 2, 5];
        for (step, quality) in grades.into_iter().enumerate() {
            let before = card.schedule.clone();
            record_review(&store, &mut card, quality, now() + Duration::days(step as i64)).unwrap();
            assert_eq!(card.schedule.review_count, before.review_count + 1);
            let expected_correct = before.correct_count + u32::from(quality >= 3);
            assert_eq!(card.schedule.correct_count, expected_correct);
            assert!(card.schedule.correct_count <= card.schedule.review_count);
        }
    }

    #[test]
    fn test_subsequent_review_uses_elapsed_days() {
        let last = now() - Duration::days(6) - Duration::hours(5);
        let schedule = CardSchedule {
            ease_factor: 2.5,
            review_count: 2,
            correct_count: 2,
            last_studied_at: Some(last),
            next_review_at: Some(last + Duration::days(6)),
        };
        let (updated, interval) = next_schedule(&schedule, 3, now()).unwrap();
        // 6 whole days elapsed, ease unchanged at 2.5
        assert_eq!(interval, 15);
        assert_eq!(updated.next_review_at, Some(now() + Duration::days(15)));
    }

    #[test]
    fn test_subsequent_review_floors_and_uses_updated_ease() {
        let schedule = CardSchedule {
            ease_factor: 2.5,
            review_count: 3,
            correct_count: 3,
            last_studied_at: Some(now() - Duration::days(3)),
            next_review_at: Some(now()),
        };
        // 3 * 2.6 = 7.8
        let (_, interval) = next_schedule(&schedule, 5, now()).unwrap();
        assert_eq!(interval, 7);
    }

    #[test]
    fn test_subsequent_review_same_day_counts_as_one_day() {
        let schedule = CardSchedule {
            ease_factor: 2.0,
            review_count: 2,
            correct_count: 1,
            last_studied_at: Some(now() - Duration::hours(2)),
            next_review_at: Some(now()),
        };
        let (_, interval) = next_schedule(&schedule, 3, now()).unwrap();
        assert_eq!(interval, 2);
    }

    #[test]
    fn test_subsequent_review_without_last_studied_uses_fallback() {
        let schedule = CardSchedule {
            ease_factor: 2.5,
            review_count: 2,
            correct_count: 2,
            last_studied_at: None,
            next_review_at: None,
        };
        let (_, interval) = next_schedule(&schedule, 3, now()).unwrap();
        assert_eq!(interval, 15);
    }

    #[test]
    fn test_quality_below_3_resets() {
        let schedule = CardSchedule {
            ease_factor: 2.5,
            review_count: 5,
            correct_count: 5,
            last_studied_at: Some(now() - Duration::days(30)),
            next_review_at: Some(now()),
        };
        let (updated, interval) = next_schedule(&schedule, 2, now()).unwrap();
        assert_eq!(interval, 1);
        assert_eq!(updated.correct_count, 5);
        assert!(updated.ease_factor < 2.5);
    }

    #[test]
    fn test_review_scenario() {
        let store = MemoryStore::default();
        let mut card = new_card();

        let first = record_review(&store, &mut card, 5, now()).unwrap();
        assert_eq!(first.interval, 1);
        assert_eq!(first.review_count, 1);
        assert_eq!(first.correct_count, 1);
        assert!((first.ease_factor - 2.60).abs() < 0.001);

        let later = now() + Duration::days(1);
        let second = record_review(&store, &mut card, 4, later).unwrap();
        assert_eq!(second.interval, 6);
        assert!((second.ease_factor - 2.65).abs() < 0.001);
        assert_eq!(second.review_count, 2);
        assert_eq!(second.correct_count, 2);
        assert_eq!(card.schedule.last_studied_at, Some(later));
        assert_eq!(card.schedule.next_review_at, Some(later + Duration::days(6)));

        let saved = store.saved.borrow();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[1].1, 1, "second save expects the count before the review");
    }

    #[test]
    fn test_invalid_quality_does_not_mutate() {
        let store = MemoryStore::default();
        let mut card = new_card();
        for quality in [-1, 6] {
            let err = record_review(&store, &mut card, quality, now()).unwrap_err();
            assert!(matches!(err, ReviewError::InvalidQuality(q) if q == quality));
        }
        assert_eq!(card.schedule, CardSchedule::default());
        assert!(store.saved.borrow().is_empty());
    }

    #[test]
    fn test_store_failure_leaves_card_unchanged() {
        let mut card = new_card();
        let err = record_review(&ConflictStore, &mut card, 4, now()).unwrap_err();
        assert!(matches!(err, ReviewError::Persistence(StoreError::Conflict { card_id: 1 })));
        assert_eq!(card.schedule, CardSchedule::default());
    }

    #[test]
    fn test_due_semantics() {
        let mut schedule = CardSchedule::default();
        assert!(is_due(&schedule, now()));

        schedule.next_review_at = Some(now() - Duration::hours(1));
        assert!(is_due(&schedule, now()));

        schedule.next_review_at = Some(now());
        assert!(is_due(&schedule, now()));

        schedule.next_review_at = Some(now() + Duration::hours(1));
        assert!(!is_due(&schedule, now()));
    }

    #[test]
    fn test_interval_days() {
        let mut schedule = CardSchedule::default();
        assert_eq!(interval_days(&schedule, now()), 0);

        schedule.next_review_at = Some(now() - Duration::days(2));
        assert_eq!(interval_days(&schedule, now()), 0);

        schedule.next_review_at = Some(now() + Duration::days(5) + Duration::hours(23));
        assert_eq!(interval_days(&schedule, now()), 5);

        schedule.next_review_at = Some(now() + Duration::hours(12));
        assert_eq!(interval_days(&schedule, now()), 0);
    }

    #[test]
    fn test_conflict_reloads_and_applies_once() {
        let start = CardSchedule {
            review_count: 1,
            correct_count: 1,
            last_studied_at: Some(now() - Duration::days(1)),
            next_review_at: Some(now()),
            ..CardSchedule::default()
        };
        let store = RacingStore::new(start, 1);
        let mut loads = 0;

        let (card, outcome) = review_with_retries(
            &store,
            || {
                loads += 1;
                store.load()
            },
            4,
            now(),
        )
        .unwrap();

        assert_eq!(loads, 2);
        assert_eq!(store.applied.get(), 1);
        // Graded on top of the concurrent review: 1 -> 2 (other) -> 3 (ours).
        assert_eq!(outcome.review_count, 3);
        assert_eq!(card.schedule, *store.stored.borrow());
        assert_eq!(store.stored.borrow().review_count, 3);
    }

    #[test]
    fn test_conflicts_stop_after_max_attempts() {
        let mut loads = 0;
        let err = review_with_retries(
            &ConflictStore,
            || {
                loads += 1;
                Ok(new_card())
            },
            4,
            now(),
        )
        .unwrap_err();

        assert_eq!(loads, MAX_REVIEW_ATTEMPTS);
        assert!(matches!(err, ReviewError::Persistence(StoreError::Conflict { card_id: 1 })));
        assert_eq!(
            crate::api::ApiError::from(err).status(),
            crate::api::STATUS_CONFLICT
        );
    }

    #[test]
    fn test_load_failure_is_not_retried() {
        let mut loads = 0;
        let err = review_with_retries(
            &MemoryStore::default(),
            || {
                loads += 1;
                Err(StoreError::not_found("flashcard", 9))
            },
            4,
            now(),
        )
        .unwrap_err();

        assert_eq!(loads, 1);
        assert!(matches!(err, ReviewError::Persistence(StoreError::NotFound { .. })));
    }
}
