//! Study session records.
use super::db::ensure_set_owned;
use super::{StoreError, StoreResult, read_datetime, read_optional_datetime, to_secs};
use crate::models::{StudyMode, StudySession};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

const SESSION_COLUMNS: &str =
    "id, user_id, set_id, mode, started_at, ended_at, cards_studied, cards_correct";

pub fn start_session(
    conn: &Connection,
    user_id: i64,
    set_id: Option<i64>,
    mode: StudyMode,
    now: DateTime<Utc>,
) -> StoreResult<StudySession> {
    if let Some(set_id) = set_id {
        ensure_set_owned(conn, user_id, set_id)?;
    }

    conn.execute(
        "INSERT INTO study_sessions (user_id, set_id, mode, started_at) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, set_id, mode.as_str(), to_secs(now)],
    )?;
    let id = conn.last_insert_rowid();
    info!(
        "event=session_start module=db status=ok session_id={} mode={}",
        id,
        mode.as_str()
    );
    get_session(conn, user_id, id)?.ok_or(StoreError::not_found("study session", id))
}

pub fn get_session(conn: &Connection, user_id: i64, id: i64) -> StoreResult<Option<StudySession>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM study_sessions WHERE id = ?1 AND user_id = ?2");
    let session = conn
        .query_row(&sql, params![id, user_id], session_from_row)
        .optional()?;
    Ok(session)
}

/// Counts one graded card against the session.
pub fn record_session_result(
    conn: &Connection,
    user_id: i64,
    id: i64,
    correct: bool,
) -> StoreResult<StudySession> {
    let changed = conn.execute(
        "UPDATE study_sessions
         SET cards_studied = cards_studied + 1,
             cards_correct = cards_correct + ?1
         WHERE id = ?2 AND user_id = ?3",
        params![i64::from(correct), id, user_id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("study session", id));
    }
    get_session(conn, user_id, id)?.ok_or(StoreError::not_found("study session", id))
}

/// Marks the session as ended; ending twice keeps the first end time.
pub fn end_session(
    conn: &Connection,
    user_id: i64,
    id: i64,
    now: DateTime<Utc>,
) -> StoreResult<StudySession> {
    let mut session =
        get_session(conn, user_id, id)?.ok_or(StoreError::not_found("study session", id))?;
    if session.end(now) {
        conn.execute(
            "UPDATE study_sessions SET ended_at = ?1 WHERE id = ?2 AND ended_at IS NULL",
            params![to_secs(now), id],
        )?;
        info!(
            "event=session_end module=db status=ok session_id={} cards_studied={} cards_correct={}",
            id, session.cards_studied, session.cards_correct
        );
    }
    Ok(session)
}

/// Lists sessions newest first, optionally for a single set.
pub fn list_sessions(
    conn: &Connection,
    user_id: i64,
    set_id: Option<i64>,
) -> StoreResult<Vec<StudySession>> {
    let sql = format!(
        "SELECT {SESSION_COLUMNS} FROM study_sessions
         WHERE user_id = ?1 AND (?2 IS NULL OR set_id = ?2)
         ORDER BY started_at DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let sessions = stmt
        .query_map(params![user_id, set_id], session_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(sessions)
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<StudySession> {
    let mode: String = row.get(3)?;
    let mode = mode
        .parse::<StudyMode>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(err)))?;

    Ok(StudySession {
        id: row.get(0)?,
        user_id: row.get(1)?,
        flashcard_set_id: row.get(2)?,
        mode,
        started_at: read_datetime(row, 4)?,
        ended_at: read_optional_datetime(row, 5)?,
        cards_studied: row.get(6)?,
        cards_correct: row.get(7)?,
    })
}
