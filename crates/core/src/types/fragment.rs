//! Themed excerpts of a book's text

use super::book::BookId;
use super::common::row_id;
use serde::{Deserialize, Serialize};

row_id!(
    /// Unique identifier for a fragment
    FragmentId
);

/// A themed excerpt of a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: FragmentId,
    pub book_id: BookId,
    /// Anchor id of the fragment inside the rendered HTML
    pub anchor: String,
    pub text: String,
    /// Truncated text, empty when `text` is already short
    pub short_text: String,
}

impl Fragment {
    pub fn new(book_id: BookId, anchor: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: FragmentId(0),
            book_id,
            anchor: anchor.into(),
            text: text.into(),
            short_text: String::new(),
        }
    }

    /// Text to show in listings
    pub fn display_text(&self) -> &str {
        if self.short_text.is_empty() {
            &self.text
        } else {
            &self.short_text
        }
    }
}
