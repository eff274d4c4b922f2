//! Study session handlers.
use super::{ApiError, ApiResponse, respond};
use crate::database::{StoreError, sessions};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::json;

/// `POST .../study-sessions/{id}/end`.
pub fn end_study_session(
    conn: &Connection,
    user_id: i64,
    session_id: i64,
    now: DateTime<Utc>,
) -> ApiResponse {
    respond(
        sessions::end_session(conn, user_id, session_id, now)
            .map_err(ApiError::from)
            .and_then(|session| {
                serde_json::to_value(&session)
                    .map(ApiResponse::ok)
                    .map_err(ApiError::serialization)
            }),
    )
}

/// `GET .../study-sessions/{id}/stats`.
pub fn study_session_stats(conn: &Connection, user_id: i64, session_id: i64) -> ApiResponse {
    respond(stats(conn, user_id, session_id))
}

fn stats(conn: &Connection, user_id: i64, session_id: i64) -> Result<ApiResponse, ApiError> {
    let session = sessions::get_session(conn, user_id, session_id)?
        .ok_or(StoreError::not_found("study session", session_id))?;

    Ok(ApiResponse::ok(json!({
        "id": session.id,
        "cards_studied": session.cards_studied,
        "cards_correct": session.cards_correct,
        "accuracy": session.accuracy(),
        "duration": session.duration_minutes(),
        "started_at": session.started_at,
        "ended_at": session.ended_at,
    })))
}
