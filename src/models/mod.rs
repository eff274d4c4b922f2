pub mod card_schedule;
pub mod flashcard;
pub mod flashcard_set;
pub mod learning_card;
pub mod learning_session;
pub mod note;
pub mod sm2;
pub mod study_session;
pub mod user;
mod validation;

pub use card_schedule::CardSchedule;
pub use flashcard::{Difficulty, Flashcard};
pub use flashcard_set::FlashcardSet;
pub use learning_card::LearningCard;
pub use learning_session::LearningSession;
pub use note::{Category, DEFAULT_CATEGORY_COLOR, Note, NoteDraft, Tag};
pub use sm2::{CardStore, ReviewError, ReviewOutcome};
pub use study_session::{StudyMode, StudySession};
pub use user::User;
pub use validation::ValidationError;
