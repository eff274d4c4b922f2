pub mod api;
pub mod config;
pub mod database;
pub mod export;
pub mod logging;
pub mod models;

pub use config::{Config, ConfigError};
pub use models::{Flashcard, FlashcardSet, LearningCard, LearningSession, Note, StudySession};
