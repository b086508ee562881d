//! Tags: categorized labels attached to books and fragments

use super::common::{row_id, Timestamp};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

row_id!(
    /// Unique identifier for a tag
    TagId
);

/// Tag category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagCategory {
    Author,
    Epoch,
    Kind,
    Genre,
    Theme,
    Set,
    Book,
}

impl TagCategory {
    pub const ALL: [TagCategory; 7] = [
        TagCategory::Author,
        TagCategory::Epoch,
        TagCategory::Kind,
        TagCategory::Genre,
        TagCategory::Theme,
        TagCategory::Set,
        TagCategory::Book,
    ];

    /// Categories read from a book's metadata
    pub const META: [TagCategory; 4] = [
        TagCategory::Author,
        TagCategory::Epoch,
        TagCategory::Kind,
        TagCategory::Genre,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Author => "author",
            Self::Epoch => "epoch",
            Self::Kind => "kind",
            Self::Genre => "genre",
            Self::Theme => "theme",
            Self::Set => "set",
            Self::Book => "book",
        }
    }

    /// Category word used in catalogue paths
    pub fn url_name(&self) -> &'static str {
        match self {
            Self::Author => "autor",
            Self::Epoch => "epoka",
            Self::Kind => "rodzaj",
            Self::Genre => "gatunek",
            Self::Theme => "motyw",
            Self::Set => "polka",
            Self::Book => "ksiazka",
        }
    }

    /// Resolves a catalogue path word; `book` has no public path
    pub fn from_url_name(word: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .filter(|c| *c != Self::Book)
            .find(|c| c.url_name() == word)
    }

    /// True for categories counted in a book's tag counter
    pub fn is_counted(&self) -> bool {
        !matches!(self, Self::Book | Self::Theme | Self::Set)
    }
}

impl fmt::Display for TagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| AppError::InvalidArgument {
                argument: "category".to_string(),
                reason: format!("unknown tag category '{}'", s),
            })
    }
}

/// A categorized label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub slug: String,
    pub sort_key: String,
    pub category: TagCategory,
    pub description: String,
    /// Cached number of tagged objects, `None` when stale
    pub book_count: Option<i64>,
    /// Owner of a shelf
    pub user: Option<String>,
    pub changed_at: Timestamp,
}

impl Tag {
    /// Creates an unsaved tag
    pub fn new(
        category: TagCategory,
        slug: impl Into<String>,
        name: impl Into<String>,
        sort_key: impl Into<String>,
    ) -> Self {
        Self {
            id: TagId(0),
            name: name.into(),
            slug: slug.into(),
            sort_key: sort_key.into(),
            category,
            description: String::new(),
            book_count: None,
            user: None,
            changed_at: Timestamp::now(),
        }
    }

    /// `<category word>/<slug>` path of this tag
    pub fn url_chunk(&self) -> String {
        format!("{}/{}", self.category.url_name(), self.slug)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
