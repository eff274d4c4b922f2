//! Local user profiles.
use super::{StoreError, StoreResult, read_datetime, to_secs};
use crate::models::{User, ValidationError};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Returns the profile named `username`, creating it on first use.
pub fn get_or_create_user(
    conn: &Connection,
    username: &str,
    now: DateTime<Utc>,
) -> StoreResult<User> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ValidationError::Empty("username").into());
    }

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO users (username, created_at) VALUES (?1, ?2)",
        params![username, to_secs(now)],
    )?;
    if inserted > 0 {
        info!("event=user_create module=db status=ok user_id={}", conn.last_insert_rowid());
    }

    conn.query_row(
        "SELECT id, username, created_at FROM users WHERE username = ?1",
        params![username],
        user_from_row,
    )
    .map_err(StoreError::from)
}

pub fn get_user(conn: &Connection, user_id: i64) -> StoreResult<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, created_at FROM users WHERE id = ?1",
            params![user_id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        created_at: read_datetime(row, 2)?,
    })
}
