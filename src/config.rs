//! Process configuration read from the environment.
use std::path::PathBuf;
use thiserror::Error;

use crate::logging::{default_log_level, normalize_level};

const DEFAULT_DB_PATH: &str = "db.sqlite3";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_USERNAME: &str = "local";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("database path cannot be empty")]
    EmptyDbPath,
    #[error("log directory cannot be empty")]
    EmptyLogDir,
    #[error("unsupported log level `{0}`; expected trace|debug|info|warn|error")]
    UnsupportedLogLevel(String),
    #[error("username cannot be empty")]
    EmptyUsername,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub username: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let db_path = get("STUDY_NOTES_DB").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let log_dir = get("STUDY_NOTES_LOG_DIR").map_or_else(
            || {
                std::env::current_dir()
                    .map(|dir| dir.join(DEFAULT_LOG_DIR))
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_DIR))
            },
            PathBuf::from,
        );
        let log_level = get("STUDY_NOTES_LOG_LEVEL")
            .or_else(|| get("RUST_LOG"))
            .unwrap_or_else(|| default_log_level().to_string());
        let username = get("STUDY_NOTES_USER").unwrap_or_else(|| DEFAULT_USERNAME.to_string());

        Self {
            db_path: PathBuf::from(db_path),
            log_dir,
            log_level,
            username: username.trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDbPath);
        }
        if self.log_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyLogDir);
        }
        normalize_level(&self.log_level)
            .map_err(|_| ConfigError::UnsupportedLogLevel(self.log_level.clone()))?;
        if self.username.trim().is_empty() {
            return Err(ConfigError::EmptyUsername);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.db_path, PathBuf::from("db.sqlite3"));
        assert!(config.log_dir.ends_with("logs"));
        assert_eq!(config.log_level, default_log_level());
        assert_eq!(config.username, "local");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_and_rust_log_fallback() {
        let config = config_from(&[
            ("STUDY_NOTES_DB", "/tmp/notes.db"),
            ("STUDY_NOTES_LOG_DIR", "/tmp/notes-logs"),
            ("RUST_LOG", "warn"),
            ("STUDY_NOTES_USER", " alice "),
        ]);
        assert_eq!(config.db_path, PathBuf::from("/tmp/notes.db"));
        assert_eq!(config.log_dir, PathBuf::from("/tmp/notes-logs"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.username, "alice");

        let config = config_from(&[("STUDY_NOTES_LOG_LEVEL", "error"), ("RUST_LOG", "warn")]);
        assert_eq!(config.log_level, "error");
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = config_from(&[("STUDY_NOTES_DB", "   "), ("STUDY_NOTES_USER", "")]);
        assert_eq!(config.db_path, PathBuf::from("db.sqlite3"));
        assert_eq!(config.username, "local");
    }

    #[test]
    fn test_validate_rejects_unknown_level() {
        let config = config_from(&[("STUDY_NOTES_LOG_LEVEL", "loud")]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnsupportedLogLevel("loud".to_string()))
        );
    }
}
