//! Folio Catalogue Library
//!
//! Orchestration layer over core, database and document: publishes books
//! from their XML sources, keeps tag counters and the search index in step,
//! and manages stored files, media, shelves and collections.

pub mod cache;
pub mod catalogue;
pub mod error;
pub mod events;
pub mod import;
pub mod media;
pub mod storage;
pub mod tasks;

pub use cache::{CounterCache, TagCounter};
pub use catalogue::{Assets, BookList, Catalogue, RelatedInfo, TagTarget};
pub use error::{LibraryError, LibraryResult};
pub use events::{CatalogueEvent, EventBus};
pub use import::{BookImporter, ImportSummary};
pub use storage::MediaStorage;
pub use tasks::{BuildQueue, BuildReport};

use folio_config::{CacheBackend, Config};
use std::path::PathBuf;

/// Runtime settings of a catalogue
#[derive(Debug, Clone)]
pub struct CatalogueSettings {
    /// Database file path
    pub database_path: PathBuf,
    /// Root directory of stored files
    pub media_root: PathBuf,
    /// Language assumed for sources without `dc:language`
    pub default_language: String,
    pub build_pdf: bool,
    pub build_epub: bool,
    pub build_mobi: bool,
    pub build_txt: bool,
    pub search_index: bool,
    /// Run format builds in-line
    pub eager_builds: bool,
    pub max_concurrent_builds: usize,
    pub pdf_command: String,
    pub epub_command: String,
    pub mobi_command: String,
    pub cover_command: String,
    pub cache_backend: CacheBackend,
}

impl Default for CatalogueSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for CatalogueSettings {
    fn from(config: &Config) -> Self {
        let build = &config.build;
        Self {
            database_path: config.app.database_path.clone(),
            media_root: config.app.media_root.clone(),
            default_language: config.app.default_language.clone(),
            build_pdf: build.build_pdf,
            build_epub: build.build_epub,
            build_mobi: build.build_mobi,
            build_txt: build.build_txt,
            search_index: build.search_index,
            eager_builds: build.eager,
            max_concurrent_builds: build.max_concurrent_builds,
            pdf_command: build.converters.pdf.clone(),
            epub_command: build.converters.epub.clone(),
            mobi_command: build.converters.mobi.clone(),
            cover_command: build.converters.cover.clone(),
            cache_backend: config.catalogue.cache_backend,
        }
    }
}

impl CatalogueSettings {
    /// Settings rooted at `media_root`, building eagerly; used by tools and tests
    pub fn local(media_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
            eager_builds: true,
            ..Default::default()
        }
    }

    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    pub fn with_cache_backend(mut self, backend: CacheBackend) -> Self {
        self.cache_backend = backend;
        self
    }

    pub fn with_search_index(mut self, enabled: bool) -> Self {
        self.search_index = enabled;
        self
    }
}

/// Per-publication switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Replace a book that already exists
    pub overwrite: bool,
    pub build_epub: bool,
    pub build_txt: bool,
    pub build_pdf: bool,
    pub build_mobi: bool,
    pub search_index: bool,
    /// Rebuild the tag-name index after indexing the book
    pub search_index_tags: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            build_epub: true,
            build_txt: true,
            build_pdf: true,
            build_mobi: true,
            search_index: true,
            search_index_tags: true,
        }
    }
}

impl ImportOptions {
    pub fn overwriting() -> Self {
        Self {
            overwrite: true,
            ..Default::default()
        }
    }
}
