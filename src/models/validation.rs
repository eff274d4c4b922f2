use thiserror::Error;

/// Input rejected before it reaches storage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} cannot be empty")]
    Empty(&'static str),
    #[error("{field} cannot be longer than {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("color must be a valid hex color code (e.g., #3776ab), got `{0}`")]
    InvalidColor(String),
    #[error("invalid {field}: `{value}`")]
    InvalidChoice { field: &'static str, value: String },
    #[error("cards correct ({cards_correct}) cannot exceed cards studied ({cards_studied})")]
    CorrectExceedsStudied { cards_studied: u32, cards_correct: u32 },
}
