//! Embedded schema steps, numbered from 1 and recorded in `PRAGMA user_version`.
//!
//! A step is applied exactly once. Steps run in one transaction, so a failing
//! step leaves the database at the version it was opened with.
use super::{StoreError, StoreResult};
use log::info;
use rusqlite::Connection;

/// Schema steps in order; the step at index `i` brings the schema to version `i + 1`.
const SCHEMA_STEPS: [(&str, &str); 3] = [
    ("init", include_str!("0001_init.sql")),
    ("notes", include_str!("0002_notes.sql")),
    ("study_sessions", include_str!("0003_study_sessions.sql")),
];

pub fn latest_version() -> u32 {
    SCHEMA_STEPS.len() as u32
}

pub fn current_user_version(conn: &Connection) -> StoreResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Brings the schema up to [`latest_version`].
///
/// Refuses databases written by a newer build.
pub fn apply_migrations(conn: &mut Connection) -> StoreResult<()> {
    let from = current_user_version(conn)?;
    let to = latest_version();
    if from > to {
        return Err(StoreError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: to,
        });
    }

    let pending = SCHEMA_STEPS.iter().zip(1..).skip(from as usize);
    let tx = conn.transaction()?;
    for ((name, sql), version) in pending {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        info!("event=db_migrate module=db status=ok step={name} version={version}");
    }
    tx.commit()?;
    Ok(())
}
