//! SQLite persistence for users, notes, flashcards and study sessions.
//!
//! Timestamps are stored as Unix seconds. Every query that reads user data is
//! scoped by the owning user id; rows owned by someone else are reported as
//! missing.

use chrono::{DateTime, Utc};
use rusqlite::Row;

pub mod db;
mod error;
pub mod migrations;
pub mod notes;
pub mod sessions;
pub mod users;

pub use db::{SqliteCardStore, open_db, open_db_in_memory};
pub use error::{StoreError, StoreResult};

pub(crate) fn to_secs(at: DateTime<Utc>) -> i64 {
    at.timestamp()
}

pub(crate) fn read_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let secs: i64 = row.get(idx)?;
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}

pub(crate) fn read_optional_datetime(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        Some(secs) => DateTime::<Utc>::from_timestamp(secs, 0)
            .map(Some)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs)),
        None => Ok(None),
    }
}
