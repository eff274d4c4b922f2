pub mod json;
pub mod markdown;

pub use json::{ExportError, FlashcardSetExport};
