//! Curated collections and user underlines

use super::book::BookId;
use super::common::{row_id, Timestamp, Validator};
use serde::{Deserialize, Serialize};

/// A titled group of books, defined by slugs before the books exist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub slug: String,
    pub title: String,
    pub description: String,
    /// Newline separated book slugs
    pub book_slugs: String,
}

impl Collection {
    pub fn new(slug: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            title: title.into(),
            description: String::new(),
            book_slugs: String::new(),
        }
    }

    /// Book slugs in declaration order, blank lines skipped
    pub fn slugs(&self) -> Vec<&str> {
        self.book_slugs
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }
}

impl Validator for Collection {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if !crate::slug::is_valid_slug(&self.slug) {
            errors.push(format!("Invalid slug '{}'", self.slug));
        }
        if self.title.trim().is_empty() {
            errors.push("Title cannot be empty".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

row_id!(
    /// Unique identifier for an underline
    UnderlineId
);

/// A user's highlight of a span of a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Underline {
    pub id: UnderlineId,
    pub book_id: BookId,
    pub user: String,
    pub start: i64,
    pub end: i64,
    pub comment: Option<String>,
    pub created_at: Timestamp,
}

impl Underline {
    pub fn new(book_id: BookId, user: impl Into<String>, start: i64, end: i64) -> Self {
        Self {
            id: UnderlineId(0),
            book_id,
            user: user.into(),
            start,
            end,
            comment: None,
            created_at: Timestamp::now(),
        }
    }
}

impl Validator for Underline {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.start < 0 {
            errors.push("Start cannot be negative".to_string());
        }
        if self.end < self.start {
            errors.push("End must not precede start".to_string());
        }
        if self.user.trim().is_empty() {
            errors.push("User cannot be empty".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
