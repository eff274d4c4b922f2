//! Study notes and the categories and tags used to organize them.
use super::ValidationError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub const DEFAULT_CATEGORY_COLOR: &str = "#4a9eff";
pub const NOTE_TITLE_MAX_CHARS: usize = 200;
pub const CATEGORY_NAME_MAX_CHARS: usize = 100;
pub const TAG_NAME_MAX_CHARS: usize = 50;
pub const DEFAULT_EXCERPT_CHARS: usize = 100;

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid color regex"));

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Note {
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub category_id: Option<i64>,
    /// Tag names sorted alphabetically.
    pub tags: Vec<String>,
    pub source_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// First `length` characters of the content, with `...` appended when cut.
    pub fn excerpt(&self, length: usize) -> String {
        if self.content.chars().count() <= length {
            return self.content.clone();
        }
        let mut excerpt: String = self.content.chars().take(length).collect();
        excerpt.push_str("...");
        excerpt
    }
}

/// Fields accepted when creating or replacing a note.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub category_id: Option<i64>,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
}

impl NoteDraft {
    /// Returns a copy with trimmed title, normalized tags and empty URLs dropped.
    pub fn normalized(&self) -> Result<NoteDraft, ValidationError> {
        let title = normalize_name(&self.title, "title", NOTE_TITLE_MAX_CHARS)?;
        let tags = normalize_tag_names(&self.tags)?;
        let source_url = self
            .source_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        Ok(NoteDraft {
            title,
            content: self.content.clone(),
            category_id: self.category_id,
            tags,
            source_url,
        })
    }
}

pub fn validate_color(color: &str) -> Result<(), ValidationError> {
    if HEX_COLOR_RE.is_match(color) {
        Ok(())
    } else {
        Err(ValidationError::InvalidColor(color.to_string()))
    }
}

pub fn normalize_category_name(name: &str) -> Result<String, ValidationError> {
    normalize_name(name, "name", CATEGORY_NAME_MAX_CHARS)
}

/// Trims, deduplicates and sorts tag names.
pub fn normalize_tag_names(tags: &[String]) -> Result<Vec<String>, ValidationError> {
    let mut names = tags
        .iter()
        .map(|tag| normalize_name(tag, "tag", TAG_NAME_MAX_CHARS))
        .collect::<Result<Vec<_>, _>>()?;
    names.sort();
    names.dedup();
    Ok(names)
}

fn normalize_name(
    value: &str,
    field: &'static str,
    max: usize,
) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn note_with_content(content: &str) -> Note {
        let at = Utc.with_ymd_and_hms(2025, 1, 27, 9, 0, 0).unwrap();
        Note {
            id: 1,
            user_id: 1,
            title: "SM-2".to_string(),
            content: content.to_string(),
            category_id: None,
            tags: Vec::new(),
            source_url: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_excerpt_short_content_is_unchanged() {
        let note = note_with_content("short");
        assert_eq!(note.excerpt(DEFAULT_EXCERPT_CHARS), "short");
    }

    #[test]
    fn test_excerpt_truncates_on_characters() {
        let note = note_with_content("żółć gęślą jaźń");
        assert_eq!(note.excerpt(4), "żółć...");
    }

    #[test]
    fn test_validate_color() {
        assert!(validate_color(DEFAULT_CATEGORY_COLOR).is_ok());
        assert!(validate_color("#3776AB").is_ok());
        assert!(validate_color("3776ab").is_err());
        assert!(validate_color("#37ab").is_err());
        assert!(validate_color("#gggggg").is_err());
    }

    #[test]
    fn test_tag_names_are_trimmed_sorted_and_deduplicated() {
        let tags = vec![" rust ".to_string(), "algorithms".to_string(), "rust".to_string()];
        assert_eq!(normalize_tag_names(&tags).unwrap(), vec!["algorithms", "rust"]);

        let empty = vec!["  ".to_string()];
        assert!(matches!(normalize_tag_names(&empty), Err(ValidationError::Empty("tag"))));
    }

    #[test]
    fn test_draft_normalization() {
        let draft = NoteDraft {
            title: "  Lecture 3 ".to_string(),
            content: "body".to_string(),
            source_url: Some("  ".to_string()),
            ..NoteDraft::default()
        };
        let normalized = draft.normalized().unwrap();
        assert_eq!(normalized.title, "Lecture 3");
        assert_eq!(normalized.source_url, None);

        let untitled = NoteDraft::default();
        assert!(matches!(untitled.normalized(), Err(ValidationError::Empty("title"))));
    }
}
