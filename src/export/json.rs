//! JSON import/export module for flashcard sets.
//! Provides functionality to save and load sets to/from JSON files.
//!
//! Only the card text travels in the file; imported cards start with a fresh
//! schedule.

use crate::database::notes::get_or_create_category;
use crate::database::{StoreError, db, notes};
use crate::models::{Difficulty, FlashcardSet};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_IMPORT_NAME: &str = "Imported Flashcard Set";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid JSON format: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("flashcard set `{0}` already exists")]
    DuplicateSet(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlashcardSetExport {
    #[serde(default = "default_import_name")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub flashcards: Vec<ExportedCard>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportedCard {
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub order: u32,
}

fn default_import_name() -> String {
    DEFAULT_IMPORT_NAME.to_string()
}

/// Collects a user's set and its cards into the export format.
pub fn build_export(
    conn: &Connection,
    user_id: i64,
    set_id: i64,
) -> Result<FlashcardSetExport, ExportError> {
    let set = db::get_flashcard_set(conn, user_id, set_id)?
        .ok_or(StoreError::not_found("flashcard set", set_id))?;
    let category = match set.category_id {
        Some(category_id) => notes::get_category(conn, user_id, category_id)?.map(|c| c.name),
        None => None,
    };
    let flashcards = db::list_flashcards(conn, user_id, set_id, None)?
        .into_iter()
        .enumerate()
        .map(|(order, card)| ExportedCard {
            front: card.front,
            back: card.back,
            order: order as u32,
        })
        .collect();

    Ok(FlashcardSetExport {
        name: set.name,
        description: set.description,
        category,
        created_at: Some(set.created_at),
        flashcards,
    })
}

/// Writes an export as pretty-printed JSON to `path`.
pub fn export_json_to_path(
    export: &FlashcardSetExport,
    path: impl AsRef<Path>,
) -> Result<(), ExportError> {
    let path = path.as_ref();
    let json_string = serde_json::to_string_pretty(export)?;
    fs::write(path, json_string)?;
    info!(
        "event=set_export module=export status=ok cards={} path={}",
        export.flashcards.len(),
        path.display()
    );
    Ok(())
}

/// Reads a set export from a JSON file.
pub fn import_json(path: impl AsRef<Path>) -> Result<FlashcardSetExport, ExportError> {
    let contents = fs::read_to_string(path)?;
    parse_export(&contents)
}

pub fn parse_export(contents: &str) -> Result<FlashcardSetExport, ExportError> {
    Ok(serde_json::from_str(contents)?)
}

/// Creates a set with the exported cards for `user_id`, in `order` order.
///
/// Fails with [`ExportError::DuplicateSet`] when the user already has a set with
/// this name. The whole import runs in one transaction.
pub fn import_into(
    conn: &Connection,
    user_id: i64,
    export: &FlashcardSetExport,
    now: DateTime<Utc>,
) -> Result<FlashcardSet, ExportError> {
    if db::find_flashcard_set_by_name(conn, user_id, &export.name)?.is_some() {
        return Err(ExportError::DuplicateSet(export.name.trim().to_string()));
    }

    let tx = conn.unchecked_transaction().map_err(StoreError::from)?;
    let category_id = match export.category.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Some(get_or_create_category(&tx, user_id, name, now)?.id),
        _ => None,
    };
    let set = db::create_flashcard_set(
        &tx,
        user_id,
        &export.name,
        export.description.as_deref(),
        category_id,
        now,
    )?;

    let mut cards: Vec<&ExportedCard> = export.flashcards.iter().collect();
    cards.sort_by_key(|card| card.order);
    for card in cards {
        db::add_flashcard(&tx, user_id, set.id, &card.front, &card.back, Difficulty::Medium, now)?;
    }
    tx.commit().map_err(StoreError::from)?;

    info!(
        "event=set_import module=export status=ok set_id={} cards={}",
        set.id,
        export.flashcards.len()
    );
    db::get_flashcard_set(conn, user_id, set.id)?
        .ok_or_else(|| StoreError::not_found("flashcard set", set.id).into())
}
