use crate::models::ValidationError;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("{entity} `{name}` already exists")]
    Duplicate { entity: &'static str, name: String },
    /// The stored review count moved on since the card was loaded.
    #[error("flashcard {card_id} was reviewed concurrently")]
    Conflict { card_id: i64 },
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    #[error("corrupt value for `{0}`")]
    Corrupt(&'static str),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        StoreError::NotFound { entity, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Maps a UNIQUE constraint failure to [`StoreError::Duplicate`].
pub(crate) fn duplicate_on_unique(
    err: rusqlite::Error,
    entity: &'static str,
    name: &str,
) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StoreError::Duplicate {
                entity,
                name: name.to_string(),
            }
        }
        _ => StoreError::Sqlite(err),
    }
}
