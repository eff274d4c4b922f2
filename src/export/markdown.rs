//! Markdown export and import of notes.
//!
//! Layout: `# Title`, optional `**Category:**` and `**Tags:**` lines, the
//! created/updated dates, a `---` separator, then the note content verbatim.

use crate::database::notes::{create_note, get_or_create_category};
use crate::database::StoreResult;
use crate::models::{Category, Note, NoteDraft};
use chrono::{DateTime, Utc};
use rusqlite::Connection;

pub const DEFAULT_IMPORT_TITLE: &str = "Imported Note";
const NOTE_SEPARATOR: &str = "\n\n---\n\n";
const FALLBACK_TITLE_CHARS: usize = 50;

/// A note parsed from Markdown, before it is stored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MarkdownNote {
    pub draft: NoteDraft,
    pub category_name: Option<String>,
}

pub fn export_note_as_markdown(note: &Note, category: Option<&Category>) -> String {
    let mut markdown = format!("# {}\n\n", note.title);

    if let Some(category) = category {
        markdown.push_str(&format!("**Category:** {}\n\n", category.name));
    }
    if !note.tags.is_empty() {
        markdown.push_str(&format!("**Tags:** {}\n\n", note.tags.join(", ")));
    }
    markdown.push_str(&format!("**Created:** {}\n\n", format_date(note.created_at)));
    markdown.push_str(&format!("**Updated:** {}\n\n", format_date(note.updated_at)));
    markdown.push_str("---\n\n");
    markdown.push_str(&note.content);

    markdown
}

/// Exports several notes, resolving each note's category from `categories`.
pub fn export_notes_as_markdown(notes: &[Note], categories: &[Category]) -> String {
    notes
        .iter()
        .map(|note| {
            let category = note
                .category_id
                .and_then(|id| categories.iter().find(|category| category.id == id));
            export_note_as_markdown(note, category)
        })
        .collect::<Vec<_>>()
        .join(NOTE_SEPARATOR)
}

/// Parses one note in the export layout.
///
/// Metadata lines are only recognized before the `---` separator; everything
/// after it is kept as content.
pub fn parse_markdown_note(markdown: &str) -> MarkdownNote {
    let mut title = String::new();
    let mut category_name = None;
    let mut tags = Vec::new();
    let mut content_lines: Vec<&str> = Vec::new();
    let mut in_content = false;

    for line in markdown.lines() {
        if in_content {
            content_lines.push(line);
            continue;
        }
        if title.is_empty() && line.starts_with("# ") {
            title = line[2..].trim().to_string();
        } else if let Some(rest) = line.strip_prefix("**Category:**") {
            category_name = Some(rest.trim().to_string()).filter(|name| !name.is_empty());
        } else if let Some(rest) = line.strip_prefix("**Tags:**") {
            tags = rest
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect();
        } else if line.starts_with("---") {
            in_content = true;
        } else if line.starts_with("**") || line.trim().is_empty() {
            continue;
        } else {
            content_lines.push(line);
            in_content = true;
        }
    }

    let content = content_lines.join("\n").trim().to_string();
    if title.is_empty() {
        title = content
            .lines()
            .find(|line| !line.trim().is_empty())
            .map(|line| line.chars().take(FALLBACK_TITLE_CHARS).collect())
            .unwrap_or_else(|| DEFAULT_IMPORT_TITLE.to_string());
    }

    MarkdownNote {
        draft: NoteDraft {
            title,
            content,
            category_id: None,
            tags,
            source_url: None,
        },
        category_name,
    }
}

/// Parses and stores a Markdown note, creating its category when needed.
pub fn import_markdown_note(
    conn: &Connection,
    user_id: i64,
    markdown: &str,
    now: DateTime<Utc>,
) -> StoreResult<Note> {
    let MarkdownNote {
        mut draft,
        category_name,
    } = parse_markdown_note(markdown);

    if let Some(name) = category_name {
        draft.category_id = Some(get_or_create_category(conn, user_id, &name, now)?.id);
    }
    create_note(conn, user_id, &draft, now)
}

fn format_date(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}
