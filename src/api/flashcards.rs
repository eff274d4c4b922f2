//! Flashcard handlers: due-aware listing and the review action.
use super::{ApiError, ApiResponse, QUALITY_RANGE_MESSAGE, not_found_message, respond};
use crate::database::db;
use crate::models::sm2::{MAX_QUALITY, MIN_QUALITY};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::Value;

/// `POST .../flashcards/{card_id}/review` with body `{"quality": <int>}`.
///
/// Ownership is checked before the body is looked at, so a foreign card is a
/// 404 even with an invalid quality.
pub fn review_flashcard(
    conn: &Connection,
    user_id: i64,
    card_id: i64,
    body: &Value,
    now: DateTime<Utc>,
) -> ApiResponse {
    respond(review(conn, user_id, card_id, body, now))
}

fn review(
    conn: &Connection,
    user_id: i64,
    card_id: i64,
    body: &Value,
    now: DateTime<Utc>,
) -> Result<ApiResponse, ApiError> {
    if db::get_flashcard(conn, user_id, card_id)?.is_none() {
        return Err(ApiError::NotFound(not_found_message("flashcard")));
    }
    let quality = parse_quality(body)?;

    let (card, outcome) = db::review_flashcard(conn, user_id, card_id, quality, now)?;

    let mut data = serde_json::to_value(&card).map_err(ApiError::serialization)?;
    let next_review =
        serde_json::to_value(outcome.next_review_at).map_err(ApiError::serialization)?;
    if let Some(fields) = data.as_object_mut() {
        fields.insert("interval".to_string(), Value::from(outcome.interval));
        fields.insert("next_review".to_string(), next_review);
    }
    Ok(ApiResponse::ok(data))
}

/// `GET .../flashcard-sets/{set_id}/flashcards[?due_only=true]`.
pub fn list_flashcards(
    conn: &Connection,
    user_id: i64,
    set_id: i64,
    due_only: bool,
    now: DateTime<Utc>,
) -> ApiResponse {
    let due_at = due_only.then_some(now);
    respond(
        db::list_flashcards(conn, user_id, set_id, due_at)
            .map_err(ApiError::from)
            .and_then(|cards| ApiResponse::list(&cards)),
    )
}

/// Reads the `due_only` query flag the way form inputs send it.
pub fn parse_due_only(value: Option<&str>) -> bool {
    value.is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
}

/// Extracts an integer quality in 0..=5 from a review body.
///
/// Integral JSON numbers and numeric strings are accepted.
pub fn parse_quality(body: &Value) -> Result<i64, ApiError> {
    let quality = match body.get("quality") {
        None | Some(Value::Null) => {
            return Err(ApiError::BadRequest("Quality is required.".to_string()));
        }
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
        Some(_) => None,
    };

    let quality =
        quality.ok_or_else(|| ApiError::BadRequest("Quality must be an integer.".to_string()))?;
    if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
        return Err(ApiError::BadRequest(QUALITY_RANGE_MESSAGE.to_string()));
    }
    Ok(quality)
}
