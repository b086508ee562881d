// FILE: crates/library/src/catalogue/build.rs

//! HTML, fragments and the derived file formats

use super::counters::TagTarget;
use super::Catalogue;
use crate::error::{LibraryError, Result};
use crate::events::CatalogueEvent;
use crate::storage::MediaStorage;
use folio_core::slug::slugify;
use folio_core::{Book, BookFormat, Fragment, TagCategory, TagId};
use folio_database::queries::{files, fragments, tags as tag_queries};
use folio_database::search;
use folio_database::DbPool;
use folio_document::{has_text, render_html, truncate_html_words, ConverterSet};
use log::{debug, info, warn};
use std::sync::Arc;

/// Words kept in a fragment's short text
const SHORT_TEXT_WORDS: usize = 15;

/// Produces stored files of a book; cheap to clone into background jobs
#[derive(Clone)]
pub(crate) struct Builder {
    pool: DbPool,
    storage: MediaStorage,
    converters: Arc<ConverterSet>,
}

impl Builder {
    pub fn new(pool: DbPool, storage: MediaStorage, converters: ConverterSet) -> Self {
        Self {
            pool,
            storage,
            converters: Arc::new(converters),
        }
    }

    pub fn supports(&self, format: BookFormat) -> bool {
        self.converters.supports(format)
    }

    /// Converts the book's XML source into `format` and stores the result
    pub async fn build(&self, book: &Book, format: BookFormat) -> Result<String> {
        let source = files::get_book_file(&self.pool, book.id, BookFormat::Xml)
            .await?
            .ok_or_else(|| {
                LibraryError::BuildFailed(format!("{} has no XML source", book.slug))
            })?;
        let source = self.storage.absolute(&source);

        let relative = self.storage.upload_path(format.extension(), &book.slug);
        let output = self.storage.prepare(&relative)?;

        let converters = Arc::clone(&self.converters);
        tokio::task::spawn_blocking(move || converters.convert(&source, format, &output))
            .await
            .map_err(|e| LibraryError::BuildFailed(e.to_string()))??;

        let previous = files::set_book_file(&self.pool, book.id, format, &relative).await?;
        self.storage.release_previous(previous.as_deref(), &relative);
        info!("Built {} of {}", format, book.slug);
        Ok(relative)
    }

    /// Stores `content` as the book's `format` file
    pub async fn store(&self, book: &Book, format: BookFormat, content: &[u8]) -> Result<String> {
        let relative = self.storage.upload_path(format.extension(), &book.slug);
        let previous = files::get_book_file(&self.pool, book.id, format).await?;
        self.storage.save(previous.as_deref(), &relative, content)?;
        files::set_book_file(&self.pool, book.id, format, &relative).await?;
        Ok(relative)
    }

    /// Reads the book's stored XML source
    pub async fn read_source(&self, book: &Book) -> Result<Option<String>> {
        let Some(relative) = files::get_book_file(&self.pool, book.id, BookFormat::Xml).await?
        else {
            return Ok(None);
        };
        let content = tokio::fs::read(self.storage.absolute(&relative)).await?;
        let content = String::from_utf8(content)
            .map_err(|_| LibraryError::InvalidFile(format!("{} is not UTF-8", relative)))?;
        Ok(Some(content))
    }
}

impl Catalogue {
    /// Renders HTML, stores it and recreates the book's fragments
    ///
    /// Returns false when the source renders to no text; nothing is stored then.
    pub async fn build_html(&self, book: &Book) -> Result<bool> {
        let Some(source) = self.builder.read_source(book).await? else {
            warn!("No XML source stored for {}", book.slug);
            return Ok(false);
        };

        let document = render_html(&source)?;
        if !has_text(&document.html) {
            debug!("{} renders to no text", book.slug);
            return Ok(false);
        }
        self.builder
            .store(book, BookFormat::Html, document.html.as_bytes())
            .await?;

        fragments::delete_book_fragments(&self.pool, book.id).await?;

        let mut shared: Vec<TagId> = tag_queries::get_book_tags(&self.pool, book.id)
            .await?
            .into_iter()
            .filter(|tag| TagCategory::META.contains(&tag.category))
            .map(|tag| tag.id)
            .collect();
        shared.push(self.book_tag(book).await?.id);
        for ancestor in self.ancestors(book).await? {
            if let Some(tag) = self.find_book_tag(&ancestor).await? {
                shared.push(tag.id);
            }
        }

        let mut created = 0;
        for extracted in document.fragments {
            if extracted.themes.is_empty() {
                debug!("Fragment {} of {} has no themes", extracted.id, book.slug);
                continue;
            }

            let mut tags = shared.clone();
            for name in &extracted.themes {
                let (theme, _) = tag_queries::get_or_create_tag(
                    &self.pool,
                    TagCategory::Theme,
                    &slugify(name),
                    name,
                    &name.to_lowercase(),
                )
                .await?;
                tags.push(theme.id);
            }

            let short = truncate_html_words(&extracted.text, SHORT_TEXT_WORDS);
            let mut fragment = Fragment::new(book.id, extracted.id.as_str(), extracted.text.as_str());
            if short != extracted.text {
                fragment.short_text = short;
            }
            fragment.id = fragments::create_fragment(&self.pool, &fragment).await?;

            let diff = tag_queries::set_fragment_tags(&self.pool, fragment.id, &tags).await?;
            self.on_tags_updated(
                TagTarget::Fragment {
                    fragment: fragment.id,
                    book: book.id,
                },
                &diff,
            )
            .await?;
            created += 1;
        }

        if self.settings.search_index && search::is_indexed(&self.pool, book.id).await? {
            let documents = self.fragment_documents(book.id).await?;
            search::index_fragments(&self.pool, book.id, &documents).await?;
        }

        info!("Built HTML of {} with {} fragments", book.slug, created);
        self.events.emit(CatalogueEvent::HtmlBuilt { book: book.id });
        Ok(true)
    }

    /// Builds the plain text file through the build queue
    pub async fn build_txt(&self, book: &Book) {
        self.schedule(book, BookFormat::Txt).await;
    }

    /// Builds the cover in-line; failures are logged and ignored
    pub async fn build_cover(&self, book: &Book) {
        if !self.builder.supports(BookFormat::Cover) {
            debug!("No cover converter configured, skipping {}", book.slug);
            return;
        }
        if let Err(e) = self.builder.build(book, BookFormat::Cover).await {
            warn!("Cover of {} failed: {}", book.slug, e);
        }
    }

    /// Queues a build of `format`; formats without a converter are skipped
    pub async fn schedule(&self, book: &Book, format: BookFormat) {
        if !self.builder.supports(format) {
            warn!("No {} converter configured, skipping {}", format, book.slug);
            return;
        }
        let builder = self.builder.clone();
        let job_book = book.clone();
        self.builds
            .submit(format!("{}.{}", book.slug, format.extension()), async move {
                builder.build(&job_book, format).await.map(|_| ())
            })
            .await;
    }

    /// Stores an externally produced file as the book's `format` file
    pub async fn store_book_file(
        &self,
        book: &Book,
        format: BookFormat,
        source: &std::path::Path,
    ) -> Result<String> {
        let relative = self.storage.upload_path(format.extension(), &book.slug);
        let previous = files::get_book_file(&self.pool, book.id, format).await?;
        self.storage.save_file(previous.as_deref(), &relative, source)?;
        files::set_book_file(&self.pool, book.id, format, &relative).await?;
        debug!("Stored {} file of {}", format, book.slug);
        Ok(relative)
    }

    /// Relative path of a stored file
    pub async fn book_file(&self, book: &Book, format: BookFormat) -> Result<Option<String>> {
        Ok(files::get_book_file(&self.pool, book.id, format).await?)
    }
}
