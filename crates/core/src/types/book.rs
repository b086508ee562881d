//! Book domain model and the file formats derived from it

use super::common::{row_id, Timestamp, Validator};
use crate::error::AppError;
use crate::slug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

row_id!(
    /// Unique identifier for a book
    BookId
);

/// Maximum length of a book l-tag slug
pub const BOOK_TAG_SLUG_MAX: usize = 120;

/// Maximum length of a book l-tag name
pub const BOOK_TAG_NAME_MAX: usize = 50;

/// A catalogued text; may be a part of a parent book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub slug: String,
    pub common_slug: String,
    pub title: String,
    pub sort_key: String,
    pub language: String,
    pub description: String,
    /// Metadata dictionary as parsed from the source document
    pub extra_info: serde_json::Value,
    pub parent_id: Option<BookId>,
    pub parent_number: i64,
    pub created_at: Timestamp,
    pub changed_at: Timestamp,
}

impl Book {
    /// Creates an unsaved book; the id is assigned by the database
    pub fn new(slug: impl Into<String>, title: impl Into<String>) -> Self {
        let slug = slug.into();
        let title = title.into();
        let now = Timestamp::now();
        Self {
            id: BookId(0),
            common_slug: slug.clone(),
            sort_key: slug::sortify(&title),
            slug,
            title,
            language: "pol".to_string(),
            description: String::new(),
            extra_info: serde_json::Value::Object(Default::default()),
            parent_id: None,
            parent_number: 0,
            created_at: now,
            changed_at: now,
        }
    }

    /// Slug of this book's l-tag
    pub fn book_tag_slug(&self) -> String {
        book_tag_slug(&self.slug)
    }

    /// Name of this book's l-tag
    pub fn book_tag_name(&self) -> String {
        self.title.chars().take(BOOK_TAG_NAME_MAX).collect()
    }

    /// Recomputes the sort key from the title, as done on every save
    pub fn refresh_sort_key(&mut self) {
        self.sort_key = slug::sortify(&self.title);
    }

    /// Audience codes stored in the metadata dictionary
    pub fn audiences(&self) -> Vec<String> {
        self.extra_info
            .get("audiences")
            .and_then(|v| v.as_array())
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Polish labels of the book's audiences, deduplicated and ordered by school level
    pub fn audiences_pl(&self) -> Vec<&'static str> {
        let mut levels: Vec<(u8, &'static str)> = self
            .audiences()
            .iter()
            .filter_map(|code| audience_label(code))
            .collect();
        levels.sort_unstable();
        levels.dedup();
        levels.into_iter().map(|(_, label)| label).collect()
    }
}

/// Returns the l-tag slug for a book slug
pub fn book_tag_slug(book_slug: &str) -> String {
    format!("l-{}", book_slug).chars().take(BOOK_TAG_SLUG_MAX).collect()
}

fn audience_label(code: &str) -> Option<(u8, &'static str)> {
    match code {
        "SP1" | "SP2" | "P" => Some((1, "szkoła podstawowa")),
        "G" => Some((2, "gimnazjum")),
        "L" | "LP" => Some((3, "liceum")),
        _ => None,
    }
}

impl Validator for Book {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !slug::is_valid_slug(&self.slug) {
            errors.push(format!("Invalid slug '{}'", self.slug));
        }

        if self.title.trim().is_empty() {
            errors.push("Title cannot be empty".to_string());
        }

        if self.parent_number < 0 {
            errors.push("Parent number cannot be negative".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// File formats stored per book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    Pdf,
    Epub,
    Mobi,
    Txt,
    Html,
    Xml,
    Cover,
}

/// Formats offered as ebook downloads
pub const EBOOK_FORMATS: [BookFormat; 4] = [
    BookFormat::Pdf,
    BookFormat::Epub,
    BookFormat::Mobi,
    BookFormat::Txt,
];

impl BookFormat {
    pub const ALL: [BookFormat; 7] = [
        BookFormat::Pdf,
        BookFormat::Epub,
        BookFormat::Mobi,
        BookFormat::Txt,
        BookFormat::Html,
        BookFormat::Xml,
        BookFormat::Cover,
    ];

    /// Identifier used in the database and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Epub => "epub",
            Self::Mobi => "mobi",
            Self::Txt => "txt",
            Self::Html => "html",
            Self::Xml => "xml",
            Self::Cover => "cover",
        }
    }

    /// File extension of stored files
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Cover => "png",
            other => other.as_str(),
        }
    }

    pub fn is_ebook(&self) -> bool {
        EBOOK_FORMATS.contains(self)
    }
}

impl fmt::Display for BookFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| AppError::InvalidArgument {
                argument: "format".to_string(),
                reason: format!("unknown book format '{}'", s),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_book_sort_key_follows_title() {
        let book = Book::new("pan-tadeusz", "Pan Tadeusz");
        assert_eq!(book.sort_key, "pan tadeusz");
        assert_eq!(book.common_slug, "pan-tadeusz");
        assert!(book.is_valid());
    }

    #[test]
    fn test_book_tag_slug_is_truncated() {
        let long = "a".repeat(200);
        let slug = book_tag_slug(&long);
        assert_eq!(slug.len(), BOOK_TAG_SLUG_MAX);
        assert!(slug.starts_with("l-a"));
    }

    #[test]
    fn test_book_tag_name_is_truncated() {
        let book = Book::new("x", "y".repeat(80));
        assert_eq!(book.book_tag_name().chars().count(), BOOK_TAG_NAME_MAX);
    }

    #[test]
    fn test_invalid_slug_fails_validation() {
        let book = Book::new("Pan Tadeusz", "Pan Tadeusz");
        let errors = book.validate().unwrap_err();
        assert!(errors[0].contains("Invalid slug"));
    }

    #[test]
    fn test_audiences_pl_dedup_and_order() {
        let mut book = Book::new("x", "X");
        book.extra_info = json!({"audiences": ["L", "SP2", "LP", "P", "G", "??"]});
        assert_eq!(
            book.audiences_pl(),
            vec!["szkoła podstawowa", "gimnazjum", "liceum"]
        );
    }

    #[test]
    fn test_book_format_parsing() {
        assert_eq!("epub".parse::<BookFormat>().unwrap(), BookFormat::Epub);
        assert!("doc".parse::<BookFormat>().is_err());
        assert_eq!(BookFormat::Cover.extension(), "png");
        assert!(BookFormat::Txt.is_ebook());
        assert!(!BookFormat::Html.is_ebook());
    }
}
