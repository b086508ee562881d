// FILE: crates/library/src/catalogue/publish.rs

//! Publishing a book from its XML source and parsed metadata

use super::counters::TagTarget;
use super::Catalogue;
use crate::error::{LibraryError, Result};
use crate::events::CatalogueEvent;
use crate::ImportOptions;
use folio_core::slug::{is_valid_slug, slugify, sortify};
use folio_core::{Book, BookFormat, BookId, BookInfo, Tag, TagCategory, TagId};
use folio_database::queries::{books as book_queries, fragments, tags as tag_queries};
use folio_database::search::{self, BookDocument, FragmentDocument};
use folio_document::render_text;
use log::{debug, info};
use std::collections::{BTreeSet, VecDeque};
use std::path::Path;

impl Catalogue {
    /// Publishes the book described by the XML file at `path`
    pub async fn from_xml_file(&self, path: impl AsRef<Path>, options: &ImportOptions) -> Result<Book> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await?;
        let info = self.metadata.parse_bytes(&raw)?;
        self.from_text_and_meta(&raw, &info, options).await
    }

    /// Publishes a book from its raw XML source and parsed metadata
    ///
    /// Parts listed in the metadata must already exist. Re-publishing an
    /// existing book requires `overwrite`; its shelves and ancestor l-tags
    /// survive.
    pub async fn from_text_and_meta(
        &self,
        raw: &[u8],
        info: &BookInfo,
        options: &ImportOptions,
    ) -> Result<Book> {
        let slug = info.slug();

        let mut parts = Vec::with_capacity(info.parts.len());
        for part in &info.parts {
            let found = book_queries::find_book_by_slug(&self.pool, &part.slug).await?;
            parts.push(found.ok_or_else(|| LibraryError::MissingPart(part.slug.clone()))?);
        }

        if !is_valid_slug(slug) {
            return Err(LibraryError::InvalidSlug(slug.to_string()));
        }

        let (mut book, kept_tags) = match book_queries::find_book_by_slug(&self.pool, slug).await? {
            Some(existing) => {
                if !options.overwrite {
                    return Err(LibraryError::AlreadyExists(slug.to_string()));
                }
                let own_tag = existing.book_tag_slug();
                let kept: Vec<TagId> = tag_queries::get_book_tags(&self.pool, existing.id)
                    .await?
                    .into_iter()
                    .filter(|tag| {
                        tag.category == TagCategory::Set
                            || (tag.category == TagCategory::Book && tag.slug != own_tag)
                    })
                    .map(|tag| tag.id)
                    .collect();
                info!("Overwriting {} (keeping {} shelf and part tags)", slug, kept.len());
                (existing, kept)
            }
            None => {
                let mut book = Book::new(slug, info.title.as_str());
                book.id = book_queries::create_book(&self.pool, &book).await?;
                info!("Created book {}", slug);
                (book, Vec::new())
            }
        };

        book.language = info.language.clone();
        book.title = info.title.clone();
        book.common_slug = info
            .variant_of
            .as_ref()
            .map(|uri| uri.slug.clone())
            .unwrap_or_else(|| slug.to_string());
        book.description = info.description.clone();
        book.extra_info = info.to_dict();
        book.refresh_sort_key();
        book_queries::update_book(&self.pool, &book).await?;

        let meta_tags = self.tags_from_info(info).await?;
        let mut tag_ids: Vec<TagId> = meta_tags.iter().map(|tag| tag.id).collect();
        tag_ids.extend(kept_tags);
        let diff = tag_queries::set_book_tags(&self.pool, book.id, &tag_ids).await?;
        self.on_tags_updated(TagTarget::Book(book.id), &diff).await?;

        let book_tag = self.book_tag(&book).await?;

        for (number, mut part) in parts.into_iter().enumerate() {
            part.parent_id = Some(book.id);
            part.parent_number = number as i64;
            book_queries::update_book(&self.pool, &part).await?;
        }

        self.builder.store(&book, BookFormat::Xml, raw).await?;

        let mut stale_tags = BTreeSet::new();
        for fragment in fragments::get_book_fragments(&self.pool, book.id).await? {
            for tag in tag_queries::get_fragment_tags(&self.pool, fragment.id).await? {
                stale_tags.insert(tag.id);
            }
        }
        fragments::delete_book_fragments(&self.pool, book.id).await?;
        for id in stale_tags {
            let tag = tag_queries::get_tag(&self.pool, id).await?;
            self.touch_tag(&tag).await?;
        }

        let has_html = self.build_html(&book).await?;
        if has_html && options.build_txt && self.settings.build_txt {
            self.build_txt(&book).await;
        }

        self.build_cover(&book).await;

        for (format, wanted, enabled) in [
            (BookFormat::Epub, options.build_epub, self.settings.build_epub),
            (BookFormat::Pdf, options.build_pdf, self.settings.build_pdf),
            (BookFormat::Mobi, options.build_mobi, self.settings.build_mobi),
        ] {
            if wanted && enabled {
                self.schedule(&book, format).await;
            }
        }

        if options.search_index && self.settings.search_index {
            self.index_book(&book, raw).await?;
            if options.search_index_tags {
                let indexed = search::index_tags(&self.pool).await?;
                debug!("Re-indexed {} tags", indexed);
            }
        }

        self.mark_descendants(&book, &book_tag).await?;

        book_queries::update_book(&self.pool, &book).await?;
        self.reset_tag_counter(book.id).await?;
        self.reset_theme_counter(book.id).await?;

        info!("Published {}", book.slug);
        self.events.emit(CatalogueEvent::Published {
            book: book.id,
            slug: book.slug.clone(),
        });

        Ok(book_queries::get_book(&self.pool, book.id).await?)
    }

    /// Gets or creates the tags named in the metadata
    ///
    /// Authors are named "First Last" and sorted by last name; other tags
    /// sort by name.
    pub async fn tags_from_info(&self, info: &BookInfo) -> Result<Vec<Tag>> {
        let mut named: Vec<(TagCategory, String, String)> = Vec::new();
        for kind in &info.kinds {
            named.push((TagCategory::Kind, kind.clone(), sortify(kind)));
        }
        for genre in &info.genres {
            named.push((TagCategory::Genre, genre.clone(), sortify(genre)));
        }
        for author in &info.authors {
            let sort_key = if author.last_name.is_empty() {
                author.readable()
            } else {
                author.last_name.clone()
            };
            named.push((TagCategory::Author, author.readable(), sortify(&sort_key)));
        }
        for epoch in &info.epochs {
            named.push((TagCategory::Epoch, epoch.clone(), sortify(epoch)));
        }

        let mut seen = BTreeSet::new();
        let mut tags = Vec::with_capacity(named.len());
        for (category, name, sort_key) in named {
            let slug = slugify(&name);
            if slug.is_empty() {
                continue;
            }
            let (tag, created) =
                tag_queries::get_or_create_tag(&self.pool, category, &slug, &name, &sort_key).await?;
            if created {
                debug!("Created tag {}", tag.url_chunk());
            }
            if seen.insert(tag.id) {
                tags.push(tag);
            }
        }
        Ok(tags)
    }

    /// Gets or creates the l-tag of a book
    pub async fn book_tag(&self, book: &Book) -> Result<Tag> {
        let (tag, _) = tag_queries::get_or_create_tag(
            &self.pool,
            TagCategory::Book,
            &book.book_tag_slug(),
            &book.book_tag_name(),
            &book.title.to_lowercase(),
        )
        .await?;
        Ok(tag)
    }

    /// Indexes the book's text, metadata and fragments
    async fn index_book(&self, book: &Book, raw: &[u8]) -> Result<()> {
        let source = std::str::from_utf8(raw)
            .map_err(|_| LibraryError::InvalidFile(format!("{} is not UTF-8", book.slug)))?;

        let tags = tag_queries::get_book_tags(&self.pool, book.id).await?;
        let document = BookDocument {
            book_id: book.id,
            title: book.title.clone(),
            authors: tags
                .iter()
                .filter(|tag| tag.category == TagCategory::Author)
                .map(|tag| tag.name.clone())
                .collect(),
            tags: tags
                .iter()
                .filter(|tag| !matches!(tag.category, TagCategory::Book | TagCategory::Set))
                .map(|tag| tag.name.clone())
                .collect(),
            body: render_text(source)?,
        };

        let fragment_documents = self.fragment_documents(book.id).await?;
        search::index_book(&self.pool, &document, &fragment_documents).await?;
        Ok(())
    }

    /// Search entries for the book's current fragments
    pub(super) async fn fragment_documents(&self, book: BookId) -> Result<Vec<FragmentDocument>> {
        let mut documents = Vec::new();
        for fragment in fragments::get_book_fragments(&self.pool, book).await? {
            let themes = tag_queries::get_fragment_tags(&self.pool, fragment.id)
                .await?
                .into_iter()
                .filter(|tag| tag.category == TagCategory::Theme)
                .map(|tag| tag.name)
                .collect();
            documents.push(FragmentDocument {
                fragment_id: fragment.id,
                text: fragment.text,
                themes,
            });
        }
        Ok(documents)
    }

    /// Adds the book's l-tag to every descendant and its fragments
    async fn mark_descendants(&self, book: &Book, book_tag: &Tag) -> Result<()> {
        let mut queue: VecDeque<Book> = book_queries::get_children(&self.pool, book.id)
            .await?
            .into();
        let mut visited = BTreeSet::from([book.id]);
        let mut collected = BTreeSet::new();

        while let Some(child) = queue.pop_front() {
            if !visited.insert(child.id) {
                continue;
            }

            let added = tag_queries::add_book_tags(&self.pool, child.id, &[book_tag.id]).await?;
            if !added.is_empty() {
                debug!("Marked {} as part of {}", child.slug, book.slug);
            }

            for fragment in fragments::get_book_fragments(&self.pool, child.id).await? {
                tag_queries::add_fragment_tags(&self.pool, fragment.id, &[book_tag.id]).await?;
            }

            for tag in tag_queries::get_book_tags(&self.pool, child.id).await? {
                collected.insert(tag.id);
            }
            queue.extend(book_queries::get_children(&self.pool, child.id).await?);
        }

        for id in collected {
            let tag = tag_queries::get_tag(&self.pool, id).await?;
            self.touch_tag(&tag).await?;
        }
        Ok(())
    }
}
