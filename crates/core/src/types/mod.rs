//! Domain types for Folio
//!
//! - `book`: books and their stored formats
//! - `tag`: tags and tag categories
//! - `fragment`: themed excerpts
//! - `media`: attached audio media
//! - `collection`: collections and underlines
//! - `info`: metadata parsed from source documents
//! - `common`: shared traits and utilities

mod book;
mod collection;
mod common;
mod fragment;
mod info;
mod media;
mod tag;

pub use book::{book_tag_slug, Book, BookFormat, BookId, BOOK_TAG_NAME_MAX, BOOK_TAG_SLUG_MAX, EBOOK_FORMATS};
pub use collection::{Collection, Underline, UnderlineId};
pub use common::{Timestamp, Validator};
pub use fragment::{Fragment, FragmentId};
pub use info::{BookInfo, Person, WlUri, WLURI_BASE};
pub use media::{BookMedia, MediaExtraInfo, MediaId, MediaType};
pub use tag::{Tag, TagCategory, TagId};
