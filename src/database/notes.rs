//! Notes, categories and tags.
//!
//! Note tag links are replaced as a whole inside one transaction. Deleting a
//! category leaves its notes and sets uncategorized.

use super::db::ensure_category_owned;
use super::error::duplicate_on_unique;
use super::{StoreError, StoreResult, read_datetime, to_secs};
use crate::models::note::{normalize_category_name, normalize_tag_names, validate_color};
use crate::models::{Category, DEFAULT_CATEGORY_COLOR, Note, NoteDraft, Tag};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Filters accepted by [`list_notes`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoteFilter {
    pub category_id: Option<i64>,
    pub tag: Option<String>,
}

pub fn create_category(
    conn: &Connection,
    user_id: i64,
    name: &str,
    color: Option<&str>,
    now: DateTime<Utc>,
) -> StoreResult<Category> {
    let name = normalize_category_name(name)?;
    let color = color.unwrap_or(DEFAULT_CATEGORY_COLOR);
    validate_color(color)?;

    conn.execute(
        "INSERT INTO categories (user_id, name, color, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![user_id, name, color, to_secs(now)],
    )
    .map_err(|err| duplicate_on_unique(err, "category", &name))?;

    let id = conn.last_insert_rowid();
    get_category(conn, user_id, id)?.ok_or(StoreError::not_found("category", id))
}

pub fn get_category(conn: &Connection, user_id: i64, id: i64) -> StoreResult<Option<Category>> {
    let category = conn
        .query_row(
            "SELECT id, user_id, name, color, created_at, updated_at
             FROM categories WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
            category_from_row,
        )
        .optional()?;
    Ok(category)
}

pub fn find_category_by_name(
    conn: &Connection,
    user_id: i64,
    name: &str,
) -> StoreResult<Option<Category>> {
    let category = conn
        .query_row(
            "SELECT id, user_id, name, color, created_at, updated_at
             FROM categories WHERE user_id = ?1 AND name = ?2",
            params![user_id, name.trim()],
            category_from_row,
        )
        .optional()?;
    Ok(category)
}

/// Returns the user's category with this name, creating it with the default color.
pub fn get_or_create_category(
    conn: &Connection,
    user_id: i64,
    name: &str,
    now: DateTime<Utc>,
) -> StoreResult<Category> {
    match find_category_by_name(conn, user_id, name)? {
        Some(category) => Ok(category),
        None => create_category(conn, user_id, name, None, now),
    }
}

/// Lists the user's categories ordered by name.
pub fn list_categories(conn: &Connection, user_id: i64) -> StoreResult<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, color, created_at, updated_at
         FROM categories WHERE user_id = ?1 ORDER BY name ASC",
    )?;
    let categories = stmt
        .query_map(params![user_id], category_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(categories)
}

pub fn update_category(
    conn: &Connection,
    user_id: i64,
    id: i64,
    name: &str,
    color: &str,
    now: DateTime<Utc>,
) -> StoreResult<Category> {
    let name = normalize_category_name(name)?;
    validate_color(color)?;

    let changed = conn
        .execute(
            "UPDATE categories SET name = ?1, color = ?2, updated_at = ?3
             WHERE id = ?4 AND user_id = ?5",
            params![name, color, to_secs(now), id, user_id],
        )
        .map_err(|err| duplicate_on_unique(err, "category", &name))?;
    if changed == 0 {
        return Err(StoreError::not_found("category", id));
    }
    get_category(conn, user_id, id)?.ok_or(StoreError::not_found("category", id))
}

pub fn delete_category(conn: &Connection, user_id: i64, id: i64) -> StoreResult<()> {
    let changed = conn.execute(
        "DELETE FROM categories WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("category", id));
    }
    Ok(())
}

/// Returns the user's tag with this name, creating it when missing.
pub fn get_or_create_tag(
    conn: &Connection,
    user_id: i64,
    name: &str,
    now: DateTime<Utc>,
) -> StoreResult<Tag> {
    let names = normalize_tag_names(&[name.to_string()])?;
    let name = &names[0];

    conn.execute(
        "INSERT OR IGNORE INTO tags (user_id, name, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, name, to_secs(now)],
    )?;
    conn.query_row(
        "SELECT id, user_id, name, created_at FROM tags WHERE user_id = ?1 AND name = ?2",
        params![user_id, name],
        tag_from_row,
    )
    .map_err(StoreError::from)
}

pub fn list_tags(conn: &Connection, user_id: i64) -> StoreResult<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, created_at FROM tags WHERE user_id = ?1 ORDER BY name ASC",
    )?;
    let tags = stmt
        .query_map(params![user_id], tag_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tags)
}

pub fn delete_tag(conn: &Connection, user_id: i64, id: i64) -> StoreResult<()> {
    let changed = conn.execute(
        "DELETE FROM tags WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("tag", id));
    }
    Ok(())
}

pub fn create_note(
    conn: &Connection,
    user_id: i64,
    draft: &NoteDraft,
    now: DateTime<Utc>,
) -> StoreResult<Note> {
    let draft = draft.normalized()?;
    if let Some(category_id) = draft.category_id {
        ensure_category_owned(conn, user_id, category_id)?;
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO notes (user_id, title, content, category_id, source_url, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            user_id,
            draft.title,
            draft.content,
            draft.category_id,
            draft.source_url,
            to_secs(now)
        ],
    )?;
    let note_id = tx.last_insert_rowid();
    replace_note_tags(&tx, user_id, note_id, &draft.tags, now)?;
    tx.commit()?;

    info!(
        "event=note_create module=db status=ok note_id={} tag_count={}",
        note_id,
        draft.tags.len()
    );
    get_note(conn, user_id, note_id)?.ok_or(StoreError::not_found("note", note_id))
}

pub fn get_note(conn: &Connection, user_id: i64, id: i64) -> StoreResult<Option<Note>> {
    let note = conn
        .query_row(
            "SELECT id, user_id, title, content, category_id, source_url, created_at, updated_at
             FROM notes WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
            note_from_row,
        )
        .optional()?;

    match note {
        Some(mut note) => {
            note.tags = load_note_tags(conn, note.id)?;
            Ok(Some(note))
        }
        None => Ok(None),
    }
}

/// Replaces every field of a note, tags included.
pub fn update_note(
    conn: &Connection,
    user_id: i64,
    id: i64,
    draft: &NoteDraft,
    now: DateTime<Utc>,
) -> StoreResult<Note> {
    let draft = draft.normalized()?;
    if let Some(category_id) = draft.category_id {
        ensure_category_owned(conn, user_id, category_id)?;
    }

    let tx = conn.unchecked_transaction()?;
    let changed = tx.execute(
        "UPDATE notes
         SET title = ?1, content = ?2, category_id = ?3, source_url = ?4, updated_at = ?5
         WHERE id = ?6 AND user_id = ?7",
        params![
            draft.title,
            draft.content,
            draft.category_id,
            draft.source_url,
            to_secs(now),
            id,
            user_id
        ],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("note", id));
    }
    replace_note_tags(&tx, user_id, id, &draft.tags, now)?;
    tx.commit()?;

    get_note(conn, user_id, id)?.ok_or(StoreError::not_found("note", id))
}

pub fn delete_note(conn: &Connection, user_id: i64, id: i64) -> StoreResult<()> {
    let changed = conn.execute(
        "DELETE FROM notes WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    if changed == 0 {
        return Err(StoreError::not_found("note", id));
    }
    Ok(())
}

/// Lists notes, most recently updated first.
pub fn list_notes(conn: &Connection, user_id: i64, filter: &NoteFilter) -> StoreResult<Vec<Note>> {
    let tag = filter.tag.as_deref().map(str::trim);
    let mut stmt = conn.prepare(
        "SELECT n.id, n.user_id, n.title, n.content, n.category_id, n.source_url,
                n.created_at, n.updated_at
         FROM notes n
         WHERE n.user_id = ?1
           AND (?2 IS NULL OR n.category_id = ?2)
           AND (?3 IS NULL OR EXISTS (
                SELECT 1 FROM note_tags nt JOIN tags t ON t.id = nt.tag_id
                WHERE nt.note_id = n.id AND t.name = ?3))
         ORDER BY n.updated_at DESC, n.id DESC",
    )?;
    let mut notes = stmt
        .query_map(params![user_id, filter.category_id, tag], note_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for note in &mut notes {
        note.tags = load_note_tags(conn, note.id)?;
    }
    Ok(notes)
}

fn replace_note_tags(
    conn: &Connection,
    user_id: i64,
    note_id: i64,
    tags: &[String],
    now: DateTime<Utc>,
) -> StoreResult<()> {
    conn.execute("DELETE FROM note_tags WHERE note_id = ?1", params![note_id])?;
    for name in tags {
        let tag = get_or_create_tag(conn, user_id, name, now)?;
        conn.execute(
            "INSERT OR IGNORE INTO note_tags (note_id, tag_id) VALUES (?1, ?2)",
            params![note_id, tag.id],
        )?;
    }
    Ok(())
}

fn load_note_tags(conn: &Connection, note_id: i64) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name FROM note_tags nt JOIN tags t ON t.id = nt.tag_id
         WHERE nt.note_id = ?1 ORDER BY t.name ASC",
    )?;
    let tags = stmt
        .query_map(params![note_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(tags)
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
        created_at: read_datetime(row, 4)?,
        updated_at: read_datetime(row, 5)?,
    })
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        created_at: read_datetime(row, 3)?,
    })
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        category_id: row.get(4)?,
        tags: Vec::new(),
        source_url: row.get(5)?,
        created_at: read_datetime(row, 6)?,
        updated_at: read_datetime(row, 7)?,
    })
}
