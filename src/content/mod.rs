//! Blog content helpers: slugs, HTML sanitizing and draft generation.

pub mod generator;
pub mod sanitize;
pub mod slug;

pub use generator::{DraftGenerator, DraftPayload, DraftPrompt, OutlineGenerator};
pub use sanitize::Sanitizer;
pub use slug::slugify;
