// FILE: crates/library/src/catalogue/tags.rs

//! Catalogue paths (`autor/adam-mickiewicz/motyw/noc`) and tag-filtered listings

use super::Catalogue;
use crate::error::{LibraryError, Result};
use folio_core::{Book, BookId, Tag, TagCategory};
use folio_database::queries::{books as book_queries, tags as tag_queries};
use log::debug;

impl Catalogue {
    /// Resolves a catalogue path into tags
    ///
    /// A category word qualifies the slug after it. A bare slug is looked up
    /// across categories: one hit is accepted but the path is reported as
    /// deprecated, several hits make it ambiguous.
    pub async fn get_tag_list(&self, path: &str) -> Result<Vec<Tag>> {
        let mut tags = Vec::new();
        let mut ambiguous_slugs = Vec::new();
        let mut deprecated = false;
        let mut category: Option<TagCategory> = None;

        for word in path.split('/').filter(|w| !w.is_empty()) {
            if category.is_none() {
                if let Some(c) = TagCategory::from_url_name(word) {
                    category = Some(c);
                    continue;
                }
            }

            match category.take() {
                Some(c) => tags.push(self.tag(c, word).await?),
                None => {
                    let mut matches = tag_queries::find_tags_by_slug(&self.pool, word).await?;
                    match matches.len() {
                        0 => return Err(LibraryError::TagNotFound(word.to_string())),
                        1 => {
                            deprecated = true;
                            tags.append(&mut matches);
                        }
                        _ => ambiguous_slugs.push(word.to_string()),
                    }
                }
            }
        }

        if let Some(c) = category {
            return Err(LibraryError::TagNotFound(format!("{}/", c.url_name())));
        }
        if !ambiguous_slugs.is_empty() {
            return Err(LibraryError::AmbiguousTags { tags, ambiguous_slugs });
        }
        if deprecated {
            return Err(LibraryError::DeprecatedTagPath { tags });
        }
        Ok(tags)
    }

    /// Canonical path of a tag list
    pub fn tag_path(tags: &[Tag]) -> String {
        tags.iter().map(Tag::url_chunk).collect::<Vec<_>>().join("/")
    }

    /// Books tagged with all `tags` that are not parts of another such book
    pub async fn tagged_top_level(&self, tags: &[Tag]) -> Result<Vec<Book>> {
        let ids: Vec<BookId> = tag_queries::book_ids_with_all_tags(
            &self.pool,
            &tags.iter().map(|t| t.id).collect::<Vec<_>>(),
        )
        .await?;
        let parts = self.parts_of_books(&ids).await?;
        let top: Vec<BookId> = ids.into_iter().filter(|id| !parts.contains(id)).collect();
        debug!("{} top-level books tagged {}", top.len(), Self::tag_path(tags));
        Ok(book_queries::get_books(&self.pool, &top).await?)
    }

    /// Tags of a category (all public ones when `None`) with their counts
    pub async fn tags_with_counts(&self, category: Option<TagCategory>) -> Result<Vec<(Tag, i64)>> {
        let mut listed = Vec::new();
        for tag in tag_queries::list_tags(&self.pool, category).await? {
            if category.is_none() && matches!(tag.category, TagCategory::Book | TagCategory::Set) {
                continue;
            }
            let count = self.tag_count(&tag).await?;
            listed.push((tag, count));
        }
        Ok(listed)
    }
}
