// FILE: crates/library/src/error.rs

use folio_core::error::AppError;
use folio_document::DocumentError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(#[from] AppError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Book \"{0}\" does not exist.")]
    MissingPart(String),

    #[error("Book {0} already exists")]
    AlreadyExists(String),

    #[error("Invalid characters in slug: {0}")]
    InvalidSlug(String),

    #[error("Book not found: {0}")]
    BookNotFound(String),

    #[error("Tag not found: {0}")]
    TagNotFound(String),

    /// Unqualified slugs matching tags in several categories
    #[error("Ambiguous tag slugs: {}", ambiguous_slugs.join(", "))]
    AmbiguousTags {
        tags: Vec<folio_core::Tag>,
        ambiguous_slugs: Vec<String>,
    },

    /// Tags resolved from unqualified slugs; the canonical path should be used
    #[error("Deprecated tag path, use the qualified form")]
    DeprecatedTagPath { tags: Vec<folio_core::Tag> },

    #[error("{user} does not own {what}")]
    NotOwner { user: String, what: String },

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Invalid file: {0}")]
    InvalidFile(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Import failed: {0}")]
    ImportFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LibraryError {
    /// True for errors reporting a missing record or tag
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::BookNotFound(_) | Self::TagNotFound(_) => true,
            Self::Database(e) => e.is_not_found(),
            _ => false,
        }
    }
}

// Both type aliases for convenience
pub type Result<T> = std::result::Result<T, LibraryError>;
pub type LibraryResult<T> = std::result::Result<T, LibraryError>;
