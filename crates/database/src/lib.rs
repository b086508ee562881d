//! Folio Database Layer
//!
//! This crate provides persistence for the Folio catalogue: books, tags,
//! fragments, stored files, media, collections, the counter cache table and
//! the full-text search index. It uses SQLite with sqlx.

pub mod connection;
pub mod migrations;
pub mod queries;
pub mod search;

pub use connection::{connect, connect_in_memory, is_busy, open, DatabaseConfig, DbPool};
pub use migrations::{current_version, optimize, run_migrations, verify_integrity};
