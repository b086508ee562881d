// FILE: crates/library/src/catalogue/mod.rs

//! The catalogue: publication pipeline and everything hanging off the book graph
//!
//! - `publish`: `from_text_and_meta` and the tags read from metadata
//! - `build`: HTML, fragments and the derived file formats
//! - `counters`: cached tag/theme counters and tag counts
//! - `tags`: catalogue paths and tag-filtered listings
//! - `books`: listings, related info, deletion
//! - `media`: attached audio media
//! - `shelves`: shelves, collections and underlines

mod books;
mod build;
mod counters;
mod media;
mod publish;
mod shelves;
mod tags;

pub use books::{Assets, BookList, RelatedInfo};
pub use counters::TagTarget;

use crate::cache::CounterCache;
use crate::error::{LibraryError, Result};
use crate::events::{CatalogueEvent, EventBus};
use crate::storage::MediaStorage;
use crate::tasks::{BuildQueue, BuildReport};
use crate::CatalogueSettings;
use build::Builder;
use folio_core::{Book, BookFormat, BookId, Tag, TagCategory};
use folio_database::queries::{books as book_queries, tags as tag_queries};
use folio_database::{connect, run_migrations, DatabaseConfig, DbPool};
use folio_document::{CommandConverter, ConverterSet, MetadataParser};
use log::info;
use tokio::sync::broadcast;

pub struct Catalogue {
    pool: DbPool,
    settings: CatalogueSettings,
    storage: MediaStorage,
    cache: CounterCache,
    builder: Builder,
    builds: BuildQueue,
    events: EventBus,
    metadata: MetadataParser,
}

impl Catalogue {
    /// Opens the catalogue database named in `settings`, migrating it
    pub async fn new(settings: CatalogueSettings) -> Result<Self> {
        info!(
            "Opening catalogue database: {}",
            settings.database_path.display()
        );
        let pool = connect(DatabaseConfig::new(&settings.database_path)).await?;
        Self::with_pool(pool, settings).await
    }

    /// Uses an existing pool, with converters taken from `settings`
    pub async fn with_pool(pool: DbPool, settings: CatalogueSettings) -> Result<Self> {
        let commands = CommandConverter::new()
            .with_template(BookFormat::Pdf, settings.pdf_command.as_str())
            .with_template(BookFormat::Epub, settings.epub_command.as_str())
            .with_template(BookFormat::Mobi, settings.mobi_command.as_str())
            .with_template(BookFormat::Cover, settings.cover_command.as_str());
        Self::with_converters(pool, settings, ConverterSet::with_commands(commands)).await
    }

    pub async fn with_converters(
        pool: DbPool,
        settings: CatalogueSettings,
        converters: ConverterSet,
    ) -> Result<Self> {
        run_migrations(&pool).await?;

        let storage = MediaStorage::new(&settings.media_root);
        let cache = CounterCache::new(settings.cache_backend, &pool);
        let builder = Builder::new(pool.clone(), storage.clone(), converters);
        let builds = BuildQueue::new(settings.max_concurrent_builds, settings.eager_builds);
        let metadata = MetadataParser::new(settings.default_language.as_str());

        info!(
            "Catalogue ready (media root {}, {} cache, {} builds)",
            settings.media_root.display(),
            cache.backend(),
            if builds.is_eager() { "eager" } else { "background" }
        );

        Ok(Self {
            pool,
            settings,
            storage,
            cache,
            builder,
            builds,
            events: EventBus::default(),
            metadata,
        })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn settings(&self) -> &CatalogueSettings {
        &self.settings
    }

    pub fn storage(&self) -> &MediaStorage {
        &self.storage
    }

    pub fn cache(&self) -> &CounterCache {
        &self.cache
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogueEvent> {
        self.events.subscribe()
    }

    /// True when some converter can produce `format`
    pub fn can_build(&self, format: BookFormat) -> bool {
        self.builder.supports(format)
    }

    /// Waits for queued format builds to finish
    pub async fn wait_for_builds(&self) -> BuildReport {
        self.builds.wait_idle().await
    }

    /// Looks a book up by slug
    pub async fn book(&self, slug: &str) -> Result<Book> {
        book_queries::find_book_by_slug(&self.pool, slug)
            .await?
            .ok_or_else(|| LibraryError::BookNotFound(slug.to_string()))
    }

    /// Looks a tag up by category and slug
    pub async fn tag(&self, category: TagCategory, slug: &str) -> Result<Tag> {
        tag_queries::find_tag(&self.pool, category, slug)
            .await?
            .ok_or_else(|| LibraryError::TagNotFound(format!("{}/{}", category.url_name(), slug)))
    }

    /// Parent id of a book; a book that no longer exists has none
    async fn parent_of(&self, id: BookId) -> Result<Option<BookId>> {
        match book_queries::get_book(&self.pool, id).await {
            Ok(book) => Ok(book.parent_id),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Ancestors of a book, root first
    async fn ancestors(&self, book: &Book) -> Result<Vec<Book>> {
        let mut chain = Vec::new();
        let mut next = book.parent_id;
        while let Some(id) = next {
            // a cycle in parent links would never end
            if id == book.id || chain.iter().any(|b: &Book| b.id == id) {
                break;
            }
            let parent = book_queries::get_book(&self.pool, id).await?;
            next = parent.parent_id;
            chain.push(parent);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Existing l-tag of a book
    async fn find_book_tag(&self, book: &Book) -> Result<Option<Tag>> {
        Ok(tag_queries::find_tag(&self.pool, TagCategory::Book, &book.book_tag_slug()).await?)
    }
}
