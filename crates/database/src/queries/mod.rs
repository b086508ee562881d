//! Database query operations organized by entity

pub mod books;
pub mod cache;
pub mod collections;
pub mod files;
pub mod fragments;
pub mod media;
pub mod tags;

// Re-export commonly used query functions
pub use books::{
    create_book, delete_book, find_book_by_slug, get_book, get_book_by_slug, get_children,
    list_books, update_book,
};
pub use cache::{cache_clear, cache_delete, cache_get, cache_set};
pub use files::{delete_book_file, get_book_file, list_book_files, set_book_file};
pub use fragments::{create_fragment, delete_book_fragments, get_book_fragments, get_fragment};
pub use media::{create_media, delete_media, get_book_media, get_media, update_media};
pub use tags::{
    find_tag, get_book_tags, get_or_create_tag, get_tag, set_book_tags, touch_tag, TagDiff,
};
