//! Flashcard set groups the cards of one topic
use super::ValidationError;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const SET_NAME_MAX_CHARS: usize = 200;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlashcardSet {
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub card_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Trims a set name and checks it is non-empty and at most 200 characters.
pub fn normalize_set_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::Empty("name"));
    }
    if name.chars().count() > SET_NAME_MAX_CHARS {
        return Err(ValidationError::TooLong {
            field: "name",
            max: SET_NAME_MAX_CHARS,
        });
    }
    Ok(name.to_string())
}
