//! Database operations for the flashcard side of the application
//!
//! Handles connection bootstrap, the simulated study clock, CRUD for flashcard
//! sets and flashcards, and the SQLite implementation of the review store.

use super::error::duplicate_on_unique;
use super::migrations::apply_migrations;
use super::{StoreError, StoreResult, read_datetime, read_optional_datetime, to_secs};
use crate::models::flashcard::normalize_card_text;
use crate::models::flashcard_set::normalize_set_name;
use crate::models::sm2::{self, CardStore, ReviewError, ReviewOutcome};
use crate::models::{CardSchedule, Difficulty, Flashcard, FlashcardSet};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use log::{error, info, warn};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::time::Instant;

pub use crate::models::sm2::MAX_REVIEW_ATTEMPTS;

const SET_COLUMNS: &str = "s.id, s.user_id, s.name, s.description, s.category_id, \
     (SELECT COUNT(*) FROM flashcards c WHERE c.set_id = s.id), s.created_at, s.updated_at";

const CARD_COLUMNS: &str = "f.id, f.set_id, f.front, f.back, f.difficulty, f.ease_factor, \
     f.review_count, f.correct_count, f.last_studied, f.next_review, f.created_at, f.updated_at";

/// Opens (or creates) the SQLite database at `path` and applies migrations.
///
/// Also seeds the simulated current date with the wall clock on first use.
pub fn open_db(path: impl AsRef<Path>) -> StoreResult<Connection> {
    let started_at = Instant::now();
    let path = path.as_ref();

    let result = Connection::open(path)
        .map_err(StoreError::from)
        .and_then(|mut conn| bootstrap_connection(&mut conn).map(|()| conn));

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode=file path={} duration_ms={}",
            path.display(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode=file path={} duration_ms={} error={}",
            path.display(),
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

/// Opens an in-memory database with the full schema.
pub fn open_db_in_memory() -> StoreResult<Connection> {
    let mut conn = Connection::open_in_memory()?;
    bootstrap_connection(&mut conn)?;
    Ok(conn)
}

fn bootstrap_connection(conn: &mut Connection) -> StoreResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    apply_migrations(conn)?;

    conn.execute(
        "INSERT OR IGNORE INTO app_state (key, value) VALUES ('current_date', ?1)",
        params![to_secs(Utc::now()).to_string()],
    )?;
    Ok(())
}

/// Retrieves the simulated current date.
pub fn get_current_date(conn: &Connection) -> StoreResult<DateTime<Utc>> {
    let timestamp: String = conn.query_row(
        "SELECT value FROM app_state WHERE key = 'current_date'",
        [],
        |row| row.get(0),
    )?;

    timestamp
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .ok_or(StoreError::Corrupt("current_date"))
}

pub fn set_current_date(conn: &Connection, date: DateTime<Utc>) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO app_state (key, value) VALUES ('current_date', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![to_secs(date).to_string()],
    )?;
    Ok(())
}

/// Advances the simulated date by 24 hours and returns the new date.
pub fn advance_day(conn: &Connection) -> StoreResult<DateTime<Utc>> {
    let next_day = get_current_date(conn)? + Duration::days(1);
    set_current_date(conn, next_day)?;
    info!("event=clock_advance module=db status=ok current_date={}", next_day.to_rfc3339());
    Ok(next_day)
}

/// Creates a flashcard set owned by `user_id`.
///
/// Set names are unique per user.
pub fn create_flashcard_set(
    conn: &Connection,
    user_id: i64,
    name: &str,
    description: Option<&str>,
    category_id: Option<i64>,
    now: DateTime<Utc>,
) -> StoreResult<FlashcardSet> {
    let name = normalize_set_name(name)?;
    if let Some(category_id) = category_id {
        ensure_category_owned(conn, user_id, category_id)?;
    }
    let description = description.map(str::trim).filter(|d| !d.is_empty());

    conn.execute(
        "INSERT INTO flashcard_sets (user_id, name, description, category_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![user_id, name, description, category_id, to_secs(now)],
    )
    .map_err(|err| duplicate_on_unique(err, "flashcard set", &name))?;

    let set_id = conn.last_insert_rowid();
    info!("event=set_create module=db status=ok set_id={set_id} user_id={user_id}");
    get_flashcard_set(conn, user_id, set_id)?.ok_or(StoreError::not_found("flashcard set", set_id))
}

pub fn get_flashcard_set(
    conn: &Connection,
    user_id: i64,
    set_id: i64,
) -> StoreResult<Option<FlashcardSet>> {
    let sql = format!("SELECT {SET_COLUMNS} FROM flashcard_sets s WHERE s.id = ?1 AND s.user_id = ?2");
    let set = conn
        .query_row(&sql, params![set_id, user_id], flashcard_set_from_row)
        .optional()?;
    Ok(set)
}

pub fn find_flashcard_set_by_name(
    conn: &Connection,
    user_id: i64,
    name: &str,
) -> StoreResult<Option<FlashcardSet>> {
    let sql = format!("SELECT {SET_COLUMNS} FROM flashcard_sets s WHERE s.user_id = ?1 AND s.name = ?2");
    let set = conn
        .query_row(&sql, params![user_id, name.trim()], flashcard_set_from_row)
        .optional()?;
    Ok(set)
}

/// Lists the user's sets, most recently updated first, optionally for one category.
pub fn list_flashcard_sets(
    conn: &Connection,
    user_id: i64,
    category_id: Option<i64>,
) -> StoreResult<Vec<FlashcardSet>> {
    let sql = format!(
        "SELECT {SET_COLUMNS} FROM flashcard_sets s
         WHERE s.user_id = ?1 AND (?2 IS NULL OR s.category_id = ?2)
         ORDER BY s.updated_at DESC, s.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let sets = stmt
        .query_map(params![user_id, category_id], flashcard_set_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(sets)
}

pub fn update_flashcard_set(
    conn: &Connection,
    user_id: i64,
    set_id: i64,
    name: &str,
    description: Option<&str>,
    category_id: Option<i64>,
    now: DateTime<Utc>,
) -> StoreResult<FlashcardSet> {
    let name = normalize_set_name(name)?;
    if let Some(category_id) = category_id {
        ensure_category_owned(conn, user_id, category_id)?;
    }
    let description = description.map(str::trim).filter(|d| !d.is_empty());

    let changed = conn
        .execute(
            "UPDATE flashcard_sets
             SET name = ?1, description = ?2, category_id = ?3, updated_at = ?4
             WHERE id = ?5 AND user_id = ?6",
            params![name, description, category_id, to_secs(now), set_id, user_id],
        )
        .map_err(|err| duplicate_on_unique(err, "flashcard set", &name))?;
    if changed == 0 {
        return Err(StoreError::not_found("flashcard set", set_id));
    }

    get_flashcard_set(conn, user_id, set_id)?.ok_or(StoreError::not_found("flashcard set", set_id))
}

/// Deletes a set together with its cards.
pub fn delete_flashcard_set(conn: &Connection, user_id: i64, set_id: i64) -> StoreResult<()> {
    let changed = conn.execute(
        "DELETE FROM flashcard_sets WHERE id = ?1 AND user_id = ?2",
        params![set_id, user_id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("flashcard set", set_id));
    }
    info!("event=set_delete module=db status=ok set_id={set_id}");
    Ok(())
}

/// Adds a flashcard with a fresh schedule to a set owned by `user_id`.
pub fn add_flashcard(
    conn: &Connection,
    user_id: i64,
    set_id: i64,
    front: &str,
    back: &str,
    difficulty: Difficulty,
    now: DateTime<Utc>,
) -> StoreResult<Flashcard> {
    ensure_set_owned(conn, user_id, set_id)?;
    let (front, back) = normalize_card_text(front, back)?;
    let schedule = CardSchedule::default();

    conn.execute(
        "INSERT INTO flashcards (set_id, front, back, difficulty, ease_factor, review_count,
                                 correct_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6, ?6)",
        params![set_id, front, back, difficulty.as_str(), schedule.ease_factor, to_secs(now)],
    )?;
    let card_id = conn.last_insert_rowid();
    touch_set(conn, set_id, now)?;

    get_flashcard(conn, user_id, card_id)?.ok_or(StoreError::not_found("flashcard", card_id))
}

/// Looks up a card through its set's owner.
pub fn get_flashcard(
    conn: &Connection,
    user_id: i64,
    card_id: i64,
) -> StoreResult<Option<Flashcard>> {
    let sql = format!(
        "SELECT {CARD_COLUMNS} FROM flashcards f
         JOIN flashcard_sets s ON s.id = f.set_id
         WHERE f.id = ?1 AND s.user_id = ?2"
    );
    let card = conn
        .query_row(&sql, params![card_id, user_id], flashcard_from_row)
        .optional()?;
    Ok(card)
}

/// Lists the cards of a set in creation order.
///
/// With `due_at` set, only cards that are due at that instant are returned.
pub fn list_flashcards(
    conn: &Connection,
    user_id: i64,
    set_id: i64,
    due_at: Option<DateTime<Utc>>,
) -> StoreResult<Vec<Flashcard>> {
    ensure_set_owned(conn, user_id, set_id)?;

    let sql = format!(
        "SELECT {CARD_COLUMNS} FROM flashcards f
         WHERE f.set_id = ?1
           AND (?2 IS NULL OR f.next_review IS NULL OR f.next_review <= ?2)
         ORDER BY f.created_at ASC, f.id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let cards = stmt
        .query_map(params![set_id, due_at.map(to_secs)], flashcard_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(cards)
}

/// Counts cards in a set that are due at `now`.
pub fn count_due_flashcards(conn: &Connection, set_id: i64, now: DateTime<Utc>) -> StoreResult<u32> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM flashcards
         WHERE set_id = ?1 AND (next_review IS NULL OR next_review <= ?2)",
        params![set_id, to_secs(now)],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Replaces the text and difficulty of a card, leaving its schedule untouched.
pub fn update_flashcard(
    conn: &Connection,
    user_id: i64,
    card_id: i64,
    front: &str,
    back: &str,
    difficulty: Difficulty,
    now: DateTime<Utc>,
) -> StoreResult<Flashcard> {
    let (front, back) = normalize_card_text(front, back)?;
    let changed = conn.execute(
        "UPDATE flashcards
         SET front = ?1, back = ?2, difficulty = ?3, updated_at = ?4
         WHERE id = ?5
           AND set_id IN (SELECT id FROM flashcard_sets WHERE user_id = ?6)",
        params![front, back, difficulty.as_str(), to_secs(now), card_id, user_id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("flashcard", card_id));
    }
    get_flashcard(conn, user_id, card_id)?.ok_or(StoreError::not_found("flashcard", card_id))
}

pub fn delete_flashcard(conn: &Connection, user_id: i64, card_id: i64) -> StoreResult<()> {
    let changed = conn.execute(
        "DELETE FROM flashcards
         WHERE id = ?1
           AND set_id IN (SELECT id FROM flashcard_sets WHERE user_id = ?2)",
        params![card_id, user_id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("flashcard", card_id));
    }
    Ok(())
}

/// Review store backed by the `flashcards` table.
///
/// An update only lands when the stored review count still matches the one the
/// review started from, so two reviews racing on the same card cannot both
/// apply their read-modify-write.
pub struct SqliteCardStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCardStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CardStore for SqliteCardStore<'_> {
    fn save_schedule(
        &self,
        card_id: i64,
        expected_review_count: u32,
        updated: &CardSchedule,
    ) -> StoreResult<()> {
        let updated_at = updated.last_studied_at.unwrap_or_else(Utc::now);
        let changed = self.conn.execute(
            "UPDATE flashcards
             SET ease_factor = ?1, review_count = ?2, correct_count = ?3,
                 last_studied = ?4, next_review = ?5, updated_at = ?6
             WHERE id = ?7 AND review_count = ?8",
            params![
                updated.ease_factor,
                updated.review_count,
                updated.correct_count,
                updated.last_studied_at.map(to_secs),
                updated.next_review_at.map(to_secs),
                to_secs(updated_at),
                card_id,
                expected_review_count
            ],
        )?;
        if changed > 0 {
            return Ok(());
        }

        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM flashcards WHERE id = ?1)",
            params![card_id],
            |row| row.get(0),
        )?;
        if exists {
            warn!(
                "event=card_review module=db status=conflict card_id={card_id} expected_review_count={expected_review_count}"
            );
            Err(StoreError::Conflict { card_id })
        } else {
            Err(StoreError::not_found("flashcard", card_id))
        }
    }
}

/// Loads a user's card, grades it and persists the result.
///
/// `now` is truncated to whole seconds first, so the returned card matches what
/// later reads of the same card give back. Concurrent reviews of the card are
/// retried as described in [`sm2::review_with_retries`].
pub fn review_flashcard(
    conn: &Connection,
    user_id: i64,
    card_id: i64,
    quality: i64,
    now: DateTime<Utc>,
) -> Result<(Flashcard, ReviewOutcome), ReviewError> {
    let now = now.trunc_subsecs(0);
    let store = SqliteCardStore::new(conn);
    let load = || {
        get_flashcard(conn, user_id, card_id)?.ok_or(StoreError::not_found("flashcard", card_id))
    };

    match sm2::review_with_retries(&store, load, quality, now) {
        Ok((mut card, outcome)) => {
            card.updated_at = now;
            info!(
                "event=card_review module=db status=ok card_id={} quality={} interval={}",
                card_id, quality, outcome.interval
            );
            Ok((card, outcome))
        }
        Err(err) => {
            warn!("event=card_review module=db status=error card_id={card_id} error={err}");
            Err(err)
        }
    }
}

pub(crate) fn ensure_set_owned(conn: &Connection, user_id: i64, set_id: i64) -> StoreResult<()> {
    let owned: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM flashcard_sets WHERE id = ?1 AND user_id = ?2)",
        params![set_id, user_id],
        |row| row.get(0),
    )?;
    if owned {
        Ok(())
    } else {
        Err(StoreError::not_found("flashcard set", set_id))
    }
}

pub(crate) fn ensure_category_owned(
    conn: &Connection,
    user_id: i64,
    category_id: i64,
) -> StoreResult<()> {
    let owned: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1 AND user_id = ?2)",
        params![category_id, user_id],
        |row| row.get(0),
    )?;
    if owned {
        Ok(())
    } else {
        Err(StoreError::not_found("category", category_id))
    }
}

fn touch_set(conn: &Connection, set_id: i64, now: DateTime<Utc>) -> StoreResult<()> {
    conn.execute(
        "UPDATE flashcard_sets SET updated_at = ?1 WHERE id = ?2",
        params![to_secs(now), set_id],
    )?;
    Ok(())
}

fn flashcard_set_from_row(row: &Row<'_>) -> rusqlite::Result<FlashcardSet> {
    Ok(FlashcardSet {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        category_id: row.get(4)?,
        card_count: row.get(5)?,
        created_at: read_datetime(row, 6)?,
        updated_at: read_datetime(row, 7)?,
    })
}

fn flashcard_from_row(row: &Row<'_>) -> rusqlite::Result<Flashcard> {
    let difficulty: String = row.get(4)?;
    let difficulty = difficulty
        .parse::<Difficulty>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(err)))?;

    Ok(Flashcard {
        id: row.get(0)?,
        set_id: row.get(1)?,
        front: row.get(2)?,
        back: row.get(3)?,
        difficulty,
        schedule: CardSchedule {
            ease_factor: row.get(5)?,
            review_count: row.get(6)?,
            correct_count: row.get(7)?,
            last_studied_at: read_optional_datetime(row, 8)?,
            next_review_at: read_optional_datetime(row, 9)?,
        },
        created_at: read_datetime(row, 10)?,
        updated_at: read_datetime(row, 11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::users::get_or_create_user;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 27, 9, 0, 0).unwrap()
    }

    fn setup() -> (Connection, i64, i64) {
        let conn = open_db_in_memory().unwrap();
        let user = get_or_create_user(&conn, "anna", now()).unwrap();
        let set = create_flashcard_set(&conn, user.id, "Polish Vocabulary", None, None, now()).unwrap();
        (conn, user.id, set.id)
    }

    #[test]
    fn test_current_date_roundtrip() {
        let conn = open_db_in_memory().unwrap();
        set_current_date(&conn, now()).unwrap();
        assert_eq!(get_current_date(&conn).unwrap(), now());

        let next = advance_day(&conn).unwrap();
        assert_eq!(next, now() + Duration::days(1));
        assert_eq!(get_current_date(&conn).unwrap(), next);
    }

    #[test]
    fn test_add_flashcard_starts_with_default_schedule() {
        let (conn, user_id, set_id) = setup();
        let card = add_flashcard(&conn, user_id, set_id, " cześć ", "hello", Difficulty::Easy, now())
            .unwrap();

        assert_eq!(card.front, "cześć");
        assert_eq!(card.difficulty, Difficulty::Easy);
        assert_eq!(card.schedule, CardSchedule::default());

        let set = get_flashcard_set(&conn, user_id, set_id).unwrap().unwrap();
        assert_eq!(set.card_count, 1);
    }

    #[test]
    fn test_duplicate_set_name_is_rejected() {
        let (conn, user_id, _) = setup();
        let err = create_flashcard_set(&conn, user_id, "Polish Vocabulary", None, None, now())
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[test]
    fn test_review_persists_schedule() {
        let (conn, user_id, set_id) = setup();
        let card = add_flashcard(&conn, user_id, set_id, "proszę", "please", Difficulty::Medium, now())
            .unwrap();

        let (reviewed, outcome) = review_flashcard(&conn, user_id, card.id, 5, now()).unwrap();
        assert_eq!(outcome.interval, 1);

        let stored = get_flashcard(&conn, user_id, card.id).unwrap().unwrap();
        assert_eq!(stored.schedule, reviewed.schedule);
        assert_eq!(stored.schedule.next_review_at, Some(now() + Duration::days(1)));
        assert!((stored.schedule.ease_factor - 2.6).abs() < 0.001);
    }

    #[test]
    fn test_stale_save_is_a_conflict() {
        let (conn, user_id, set_id) = setup();
        let card = add_flashcard(&conn, user_id, set_id, "tak", "yes", Difficulty::Medium, now())
            .unwrap();
        review_flashcard(&conn, user_id, card.id, 4, now()).unwrap();

        // `card` still carries review_count 0
        let (updated, _) = sm2::next_schedule(&card.schedule, 4, now()).unwrap();
        let err = SqliteCardStore::new(&conn)
            .save_schedule(card.id, card.schedule.review_count, &updated)
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { card_id } if card_id == card.id));
    }

    #[test]
    fn test_save_for_missing_card_is_not_found() {
        let conn = open_db_in_memory().unwrap();
        let err = SqliteCardStore::new(&conn)
            .save_schedule(42, 0, &CardSchedule::default())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_due_only_listing() {
        let (conn, user_id, set_id) = setup();
        let reviewed = add_flashcard(&conn, user_id, set_id, "nie", "no", Difficulty::Medium, now())
            .unwrap();
        add_flashcard(&conn, user_id, set_id, "tak", "yes", Difficulty::Medium, now()).unwrap();
        review_flashcard(&conn, user_id, reviewed.id, 4, now()).unwrap();

        let all = list_flashcards(&conn, user_id, set_id, None).unwrap();
        assert_eq!(all.len(), 2);

        let due_now = list_flashcards(&conn, user_id, set_id, Some(now())).unwrap();
        assert_eq!(due_now.len(), 1);
        assert_eq!(due_now[0].front, "tak");
        assert_eq!(count_due_flashcards(&conn, set_id, now()).unwrap(), 1);

        let tomorrow = now() + Duration::days(1);
        assert_eq!(list_flashcards(&conn, user_id, set_id, Some(tomorrow)).unwrap().len(), 2);
    }

    #[test]
    fn test_other_users_cannot_see_cards() {
        let (conn, user_id, set_id) = setup();
        let card = add_flashcard(&conn, user_id, set_id, "kot", "cat", Difficulty::Medium, now())
            .unwrap();
        let intruder = get_or_create_user(&conn, "mallory", now()).unwrap();

        assert!(get_flashcard(&conn, intruder.id, card.id).unwrap().is_none());
        assert!(list_flashcards(&conn, intruder.id, set_id, None).unwrap_err().is_not_found());
        let err = review_flashcard(&conn, intruder.id, card.id, 4, now()).unwrap_err();
        assert!(matches!(err, ReviewError::Persistence(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_delete_set_removes_cards() {
        let (conn, user_id, set_id) = setup();
        let card = add_flashcard(&conn, user_id, set_id, "pies", "dog", Difficulty::Hard, now())
            .unwrap();
        delete_flashcard_set(&conn, user_id, set_id).unwrap();
        assert!(get_flashcard(&conn, user_id, card.id).unwrap().is_none());
    }
}
