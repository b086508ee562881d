pub mod error;
pub mod slug;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, ErrorSeverity, RecoveryAction, Result};
pub use types::{
    book_tag_slug, Book, BookFormat, BookId, BookInfo, BookMedia, Collection, Fragment,
    FragmentId, MediaExtraInfo, MediaId, MediaType, Person, Tag, TagCategory, TagId, Timestamp,
    Underline, UnderlineId, Validator, WlUri, EBOOK_FORMATS,
};
