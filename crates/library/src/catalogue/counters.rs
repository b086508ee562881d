// FILE: crates/library/src/catalogue/counters.rs

//! Cached tag and theme counters, and per-tag object counts

use super::Catalogue;
use crate::cache::{tag_counter_key, theme_counter_key, TagCounter};
use crate::error::Result;
use crate::events::CatalogueEvent;
use folio_core::{Book, BookId, FragmentId, Tag, TagCategory};
use folio_database::queries::{books as book_queries, fragments, tags as tag_queries, TagDiff};
use log::debug;
use std::collections::{BTreeSet, HashMap};

/// Object whose tag set changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagTarget {
    Book(BookId),
    Fragment { fragment: FragmentId, book: BookId },
}

impl Catalogue {
    /// Tag id to count over the book and all its parts
    ///
    /// Each part contributes the sum of its own parts' counters, with every
    /// counted tag of the part itself set to 1.
    pub async fn tag_counter(&self, book: BookId) -> Result<TagCounter> {
        if let Some(counter) = self.cache.get(&tag_counter_key(book)).await? {
            return Ok(counter);
        }

        // breadth-first, so every part comes after its parent
        let mut order = vec![book];
        let mut children: HashMap<BookId, Vec<BookId>> = HashMap::new();
        let mut i = 0;
        while i < order.len() {
            let id = order[i];
            let ids: Vec<BookId> = book_queries::get_children(&self.pool, id)
                .await?
                .into_iter()
                .map(|child| child.id)
                .filter(|child| !order.contains(child))
                .collect();
            order.extend(ids.iter().copied());
            children.insert(id, ids);
            i += 1;
        }

        let mut computed: HashMap<BookId, TagCounter> = HashMap::new();
        for id in order.iter().rev().copied() {
            let key = tag_counter_key(id);
            let counter = match self.cache.get(&key).await? {
                Some(counter) => counter,
                None => {
                    let mut counter = TagCounter::new();
                    for child in children.get(&id).into_iter().flatten() {
                        if let Some(child_counter) = computed.get(child) {
                            for (tag, count) in child_counter {
                                *counter.entry(*tag).or_insert(0) += count;
                            }
                        }
                    }
                    for tag in tag_queries::get_book_tags(&self.pool, id).await? {
                        if tag.category.is_counted() {
                            counter.insert(tag.id, 1);
                        }
                    }
                    self.cache.set(&key, &counter).await?;
                    counter
                }
            };
            computed.insert(id, counter);
        }

        Ok(computed.remove(&book).unwrap_or_default())
    }

    /// Theme tag id to the number of fragments marked with the book's l-tag
    pub async fn theme_counter(&self, book: &Book) -> Result<TagCounter> {
        let key = theme_counter_key(book.id);
        if let Some(counter) = self.cache.get(&key).await? {
            return Ok(counter);
        }

        let counter: TagCounter = match self.find_book_tag(book).await? {
            Some(book_tag) => fragments::count_themes_of_tagged_fragments(&self.pool, book_tag.id)
                .await?
                .into_iter()
                .collect(),
            None => TagCounter::new(),
        };
        self.cache.set(&key, &counter).await?;
        Ok(counter)
    }

    /// Drops the cached tag counter of a book and of each ancestor
    pub async fn reset_tag_counter(&self, book: BookId) -> Result<()> {
        self.reset_up_the_chain(book, tag_counter_key).await
    }

    /// Drops the cached theme counter of a book and of each ancestor
    pub async fn reset_theme_counter(&self, book: BookId) -> Result<()> {
        self.reset_up_the_chain(book, theme_counter_key).await
    }

    async fn reset_up_the_chain(&self, book: BookId, key: fn(BookId) -> String) -> Result<()> {
        let mut seen = BTreeSet::new();
        let mut next = Some(book);
        while let Some(id) = next {
            if !seen.insert(id) {
                break;
            }
            self.cache.delete(&key(id)).await?;
            next = self.parent_of(id).await?;
        }
        Ok(())
    }

    /// Reacts to a change of an object's tag set
    ///
    /// Every affected tag is touched. A book's tag counter is reset when a
    /// counted tag changed; a fragment's book theme counter when a theme did.
    pub async fn on_tags_updated(&self, target: TagTarget, diff: &TagDiff) -> Result<()> {
        if diff.is_empty() {
            return Ok(());
        }

        let mut categories = BTreeSet::new();
        for id in diff.affected() {
            let tag = tag_queries::get_tag(&self.pool, id).await?;
            categories.insert(tag.category);
            self.touch_tag(&tag).await?;
        }

        match target {
            TagTarget::Book(book) => {
                if categories.iter().any(|c| c.is_counted()) {
                    self.reset_tag_counter(book).await?;
                }
            }
            TagTarget::Fragment { book, .. } => {
                if categories.contains(&TagCategory::Theme) {
                    self.reset_theme_counter(book).await?;
                }
            }
        }
        Ok(())
    }

    /// Clears a tag's cached count
    pub async fn touch_tag(&self, tag: &Tag) -> Result<()> {
        tag_queries::touch_tag(&self.pool, tag.id).await?;
        debug!("Touched tag {}", tag.url_chunk());
        self.events.emit(CatalogueEvent::TagTouched { tag: tag.id });
        Ok(())
    }

    /// Number of objects tagged, cached in the tag row
    ///
    /// Themes count fragments; l-tags count nothing. Other tags count books,
    /// leaving out parts of another tagged book, except for shelves.
    pub async fn tag_count(&self, tag: &Tag) -> Result<i64> {
        let current = tag_queries::get_tag(&self.pool, tag.id).await?;
        if let Some(count) = current.book_count {
            return Ok(count);
        }

        let count = match tag.category {
            TagCategory::Theme => tag_queries::count_fragments_with_tag(&self.pool, tag.id).await?,
            TagCategory::Book => 0,
            TagCategory::Set => tag_queries::book_ids_with_tag(&self.pool, tag.id).await?.len() as i64,
            _ => {
                let ids = tag_queries::book_ids_with_tag(&self.pool, tag.id).await?;
                let parts = self.parts_of_books(&ids).await?;
                ids.iter().filter(|id| !parts.contains(id)).count() as i64
            }
        };

        tag_queries::set_book_count(&self.pool, tag.id, count).await?;
        Ok(count)
    }

    /// Ids of books carrying the l-tag of any of `books`
    pub(crate) async fn parts_of_books(&self, books: &[BookId]) -> Result<BTreeSet<BookId>> {
        let mut parts = BTreeSet::new();
        for book in book_queries::get_books(&self.pool, books).await? {
            if let Some(book_tag) = self.find_book_tag(&book).await? {
                parts.extend(tag_queries::book_ids_with_tag(&self.pool, book_tag.id).await?);
            }
        }
        Ok(parts)
    }

    /// Theme tags of the book's fragments with their counts, by sort key
    pub async fn related_themes(&self, book: &Book) -> Result<Vec<(Tag, i64)>> {
        let counter = self.theme_counter(book).await?;
        let mut themes = Vec::with_capacity(counter.len());
        for (id, count) in counter {
            themes.push((tag_queries::get_tag(&self.pool, id).await?, count));
        }
        themes.sort_by(|(a, _), (b, _)| a.sort_key.cmp(&b.sort_key));
        Ok(themes)
    }

    /// Counted tags of the book and its parts, by category then sort key
    pub async fn related_tags(&self, book: BookId) -> Result<Vec<(Tag, i64)>> {
        let counter = self.tag_counter(book).await?;
        let mut tags = Vec::with_capacity(counter.len());
        for (id, count) in counter {
            tags.push((tag_queries::get_tag(&self.pool, id).await?, count));
        }
        tags.sort_by(|(a, _), (b, _)| (a.category, &a.sort_key).cmp(&(b.category, &b.sort_key)));
        Ok(tags)
    }
}
