// FILE: crates/library/src/catalogue/books.rs

//! Book listings, related info, downloadable assets and deletion

use super::Catalogue;
use crate::error::{LibraryError, Result};
use crate::events::CatalogueEvent;
use folio_core::{
    Book, BookFormat, BookId, BookMedia, Fragment, MediaType, Tag, TagCategory, TagId,
};
use folio_database::queries::{books as book_queries, files, fragments, media, tags as tag_queries};
use folio_database::search;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::str::FromStr;

/// Hierarchical book listing
#[derive(Debug, Clone, Default)]
pub struct BookList {
    /// Every author tag with its top-level books, in tag order
    pub by_author: Vec<(Tag, Vec<Book>)>,
    /// Top-level books without an author
    pub orphans: Vec<Book>,
    /// Listed parts keyed by their parent
    pub by_parent: BTreeMap<BookId, Vec<Book>>,
}

impl BookList {
    pub fn children(&self, parent: BookId) -> &[Book] {
        self.by_parent.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Data shown next to a book, cached as JSON in the book row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedInfo {
    /// `(name, slug)` of author, kind, genre and epoch tags by category
    pub tags: BTreeMap<String, Vec<(String, String)>>,
    /// Media type to presence
    pub media: BTreeMap<String, bool>,
    /// `(title, slug)` of the ancestors, root first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<(String, String)>,
}

/// What a format or media name resolves to for a book
#[derive(Debug, Clone, PartialEq)]
pub enum Assets {
    /// Stored book file, if built
    File(Option<String>),
    /// Attached media of one type
    Media(Vec<BookMedia>),
}

impl Assets {
    pub fn is_empty(&self) -> bool {
        match self {
            Assets::File(path) => path.is_none(),
            Assets::Media(items) => items.is_empty(),
        }
    }
}

impl Catalogue {
    /// Books ordered by position, grouped by parent and author
    ///
    /// With a non-empty filter only books tagged with all of its tags are
    /// listed; a book whose parent is filtered out counts as top level.
    pub async fn book_list(&self, filter: &[Tag]) -> Result<BookList> {
        let mut books = book_queries::list_books_by_position(&self.pool).await?;
        if !filter.is_empty() {
            let ids: Vec<_> = filter.iter().map(|t| t.id).collect();
            let kept: BTreeSet<BookId> = tag_queries::book_ids_with_all_tags(&self.pool, &ids)
                .await?
                .into_iter()
                .collect();
            books.retain(|b| kept.contains(&b.id));
        }
        let listed: BTreeSet<BookId> = books.iter().map(|b| b.id).collect();

        let mut list = BookList::default();
        let mut top_level = Vec::new();
        for book in books {
            match book.parent_id {
                Some(parent) if listed.contains(&parent) => {
                    list.by_parent.entry(parent).or_default().push(book)
                }
                _ => top_level.push(book),
            }
        }

        let authors = tag_queries::list_tags(&self.pool, Some(TagCategory::Author)).await?;
        let mut by_author: Vec<(Tag, Vec<Book>)> =
            authors.into_iter().map(|tag| (tag, Vec::new())).collect();
        for book in top_level {
            let author_ids: BTreeSet<_> = tag_queries::get_book_tags(&self.pool, book.id)
                .await?
                .into_iter()
                .filter(|t| t.category == TagCategory::Author)
                .map(|t| t.id)
                .collect();
            if author_ids.is_empty() {
                list.orphans.push(book);
                continue;
            }
            for (tag, listed) in by_author.iter_mut() {
                if author_ids.contains(&tag.id) {
                    listed.push(book.clone());
                }
            }
        }
        list.by_author = by_author;
        Ok(list)
    }

    /// Related info of a book, computed and cached on first use
    pub async fn related_info(&self, book: &Book) -> Result<RelatedInfo> {
        if let Some(json) = book_queries::get_related_info(&self.pool, book.id).await? {
            match serde_json::from_str(&json) {
                Ok(info) => return Ok(info),
                Err(e) => warn!("Discarding related info of {}: {}", book.slug, e),
            }
        }

        let mut info = RelatedInfo::default();
        for tag in tag_queries::get_book_tags(&self.pool, book.id).await? {
            if TagCategory::META.contains(&tag.category) {
                info.tags
                    .entry(tag.category.as_str().to_string())
                    .or_default()
                    .push((tag.name, tag.slug));
            }
        }
        for media_type in MediaType::ALL {
            let present = !media::get_book_media(&self.pool, book.id, Some(media_type))
                .await?
                .is_empty();
            info.media.insert(media_type.as_str().to_string(), present);
        }
        info.parents = self
            .ancestors(book)
            .await?
            .into_iter()
            .map(|b| (b.title, b.slug))
            .collect();

        let json = serde_json::to_string(&info).map_err(folio_core::AppError::from)?;
        book_queries::set_related_info(&self.pool, book.id, Some(&json)).await?;
        debug!("Cached related info of {}", book.slug);
        Ok(info)
    }

    /// Authors, then ancestor titles and the book's own title
    pub async fn pretty_title(&self, book: &Book) -> Result<String> {
        let mut names: Vec<String> = tag_queries::get_book_tags(&self.pool, book.id)
            .await?
            .into_iter()
            .filter(|t| t.category == TagCategory::Author)
            .map(|t| t.name)
            .collect();
        names.extend(self.ancestors(book).await?.into_iter().map(|b| b.title));
        names.push(book.title.clone());
        Ok(names.join(", "))
    }

    /// A random fragment of the book or its parts, else of the nearest ancestor
    pub async fn choose_fragment(&self, book: &Book) -> Result<Option<Fragment>> {
        let mut current = Some(book.clone());
        let mut seen = BTreeSet::new();
        while let Some(candidate) = current {
            if !seen.insert(candidate.id) {
                break;
            }
            if let Some(tag) = self.find_book_tag(&candidate).await? {
                if let Some(fragment) = fragments::random_fragment_with_tag(&self.pool, tag.id).await? {
                    return Ok(Some(fragment));
                }
            }
            current = match candidate.parent_id {
                Some(parent) => book_queries::get_books(&self.pool, &[parent]).await?.pop(),
                None => None,
            };
        }
        Ok(None)
    }

    /// True when a book file or media of that name exists
    pub async fn has_media(&self, book: &Book, name: &str) -> Result<bool> {
        Ok(!self.get_media(book, name).await?.is_empty())
    }

    /// Looks up a book format (`pdf`, `epub`, ...) or media type (`mp3`, ...)
    pub async fn get_media(&self, book: &Book, name: &str) -> Result<Assets> {
        if let Ok(format) = BookFormat::from_str(name) {
            return Ok(Assets::File(
                files::get_book_file(&self.pool, book.id, format).await?,
            ));
        }
        if let Ok(media_type) = MediaType::from_str(name) {
            return Ok(Assets::Media(
                media::get_book_media(&self.pool, book.id, Some(media_type)).await?,
            ));
        }
        Err(LibraryError::UnsupportedFormat(name.to_string()))
    }

    /// Deletes a book with its files, fragments and tag links
    ///
    /// Parts of the book become top-level books.
    pub async fn delete_book(&self, slug: &str) -> Result<()> {
        let book = self.book(slug).await?;

        if self.settings.search_index {
            search::remove_book(&self.pool, book.id).await?;
            search::index_tags(&self.pool).await?;
        }

        for (format, path) in files::list_book_files(&self.pool, book.id).await? {
            if let Err(e) = self.storage.delete(&path) {
                warn!("Could not remove {} file of {}: {}", format, book.slug, e);
            }
        }
        for item in media::get_book_media(&self.pool, book.id, None).await? {
            if let Err(e) = self.storage.delete(&item.path) {
                warn!("Could not remove media {}: {}", item.path, e);
            }
        }

        let mut affected = self.detach_descendants(&book).await?;
        self.reset_tag_counter(book.id).await?;
        self.reset_theme_counter(book.id).await?;

        let book_tag = self.find_book_tag(&book).await?;
        for tag in tag_queries::get_book_tags(&self.pool, book.id).await? {
            affected.insert(tag.id);
        }
        for fragment in fragments::get_book_fragments(&self.pool, book.id).await? {
            for tag in tag_queries::get_fragment_tags(&self.pool, fragment.id).await? {
                affected.insert(tag.id);
            }
        }
        if let Some(tag) = &book_tag {
            affected.remove(&tag.id);
            tag_queries::delete_tag(&self.pool, tag.id).await?;
        }

        book_queries::delete_book(&self.pool, book.id).await?;

        for id in affected {
            let tag = tag_queries::get_tag(&self.pool, id).await?;
            self.touch_tag(&tag).await?;
        }

        info!("Deleted {}", book.slug);
        self.events.emit(CatalogueEvent::BookDeleted {
            book: book.id,
            slug: book.slug,
        });
        Ok(())
    }

    /// Strips the l-tags of the book's ancestors from all of its parts
    ///
    /// The parts stop descending from those ancestors once the book is gone.
    /// Returns the tags of the detached books and fragments.
    async fn detach_descendants(&self, book: &Book) -> Result<BTreeSet<TagId>> {
        let mut stale = Vec::new();
        for ancestor in self.ancestors(book).await? {
            if let Some(tag) = self.find_book_tag(&ancestor).await? {
                stale.push(tag.id);
            }
        }

        let mut collected = BTreeSet::new();
        if stale.is_empty() {
            return Ok(collected);
        }

        let mut queue: VecDeque<Book> = book_queries::get_children(&self.pool, book.id)
            .await?
            .into();
        let mut visited = BTreeSet::from([book.id]);
        while let Some(part) = queue.pop_front() {
            if !visited.insert(part.id) {
                continue;
            }

            for tag in &stale {
                tag_queries::remove_book_tag(&self.pool, part.id, *tag).await?;
            }
            for fragment in fragments::get_book_fragments(&self.pool, part.id).await? {
                for tag in &stale {
                    tag_queries::remove_fragment_tag(&self.pool, fragment.id, *tag).await?;
                }
                for tag in tag_queries::get_fragment_tags(&self.pool, fragment.id).await? {
                    collected.insert(tag.id);
                }
            }
            for tag in tag_queries::get_book_tags(&self.pool, part.id).await? {
                collected.insert(tag.id);
            }

            self.reset_tag_counter(part.id).await?;
            self.reset_theme_counter(part.id).await?;
            debug!("Detached {} from the ancestors of {}", part.slug, book.slug);
            queue.extend(book_queries::get_children(&self.pool, part.id).await?);
        }

        collected.extend(stale);
        Ok(collected)
    }

    pub async fn search_books(&self, query: &str, limit: i64) -> Result<Vec<Book>> {
        let results = search::search_books(&self.pool, query, limit).await?;
        Ok(results.into_iter().map(|r| r.item).collect())
    }

    pub async fn search_fragments(&self, query: &str, limit: i64) -> Result<Vec<Fragment>> {
        let results = search::search_fragments(&self.pool, query, limit).await?;
        Ok(results.into_iter().map(|r| r.item).collect())
    }

    pub async fn search_tags(&self, query: &str, limit: i64) -> Result<Vec<Tag>> {
        let results = search::search_tags(&self.pool, query, limit).await?;
        Ok(results.into_iter().map(|r| r.item).collect())
    }

    /// Tags whose names start with `prefix`, for completion
    pub async fn tag_hints(&self, prefix: &str, limit: i64) -> Result<Vec<Tag>> {
        Ok(search::tags_starting_with(&self.pool, prefix, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{source, test_catalogue};
    use super::*;
    use crate::ImportOptions;

    const PRUS: &str = r#"<dc:creator xml:lang="pl">Prus, Bolesław</dc:creator>"#;

    async fn publish(catalogue: &Catalogue, xml: &str) -> Result<Book> {
        let info = catalogue.metadata.parse(xml)?;
        catalogue
            .from_text_and_meta(xml.as_bytes(), &info, &ImportOptions::default())
            .await
    }

    fn has_part(slug: &str) -> String {
        format!(
            "<dc:relation.hasPart>http://wolnelektury.pl/katalog/lektura/{}</dc:relation.hasPart>",
            slug
        )
    }

    #[tokio::test]
    async fn test_book_list_groups_by_parent_and_author() -> Result<()> {
        let (catalogue, _dir) = test_catalogue().await?;
        publish(&catalogue, &source("tom-1", "Tom I", PRUS, "<akap>Raz.</akap>")).await?;
        publish(&catalogue, &source("lalka", "Lalka", &format!("{}{}", PRUS, has_part("tom-1")), "")).await?;
        publish(&catalogue, &source("anonim", "Bogurodzica", "", "<akap>Bogurodzica dziewica.</akap>")).await?;
        catalogue
            .tags_from_info(&{
                let mut info = folio_core::BookInfo::new("x", "pol");
                info.authors = vec![folio_core::Person::from_text("Sienkiewicz, Henryk")];
                info
            })
            .await?;

        let list = catalogue.book_list(&[]).await?;
        let authors: Vec<(&str, usize)> = list
            .by_author
            .iter()
            .map(|(tag, books)| (tag.slug.as_str(), books.len()))
            .collect();
        assert_eq!(authors, vec![("boleslaw-prus", 1), ("henryk-sienkiewicz", 0)]);
        assert_eq!(list.by_author[0].1[0].slug, "lalka");
        assert_eq!(list.orphans[0].slug, "anonim");

        let lalka = catalogue.book("lalka").await?;
        assert_eq!(list.children(lalka.id)[0].slug, "tom-1");
        Ok(())
    }

    #[tokio::test]
    async fn test_filtered_out_parent_makes_part_top_level() -> Result<()> {
        let (catalogue, _dir) = test_catalogue().await?;
        publish(
            &catalogue,
            &source(
                "tom-1",
                "Tom I",
                r#"<dc:subject.period xml:lang="pl">Pozytywizm</dc:subject.period>"#,
                "<akap>Raz.</akap>",
            ),
        )
        .await?;
        publish(&catalogue, &source("calosc", "Całość", &has_part("tom-1"), "")).await?;

        let epoch = catalogue.tag(TagCategory::Epoch, "pozytywizm").await?;
        let list = catalogue.book_list(&[epoch]).await?;
        assert!(list.by_parent.is_empty());
        assert_eq!(list.orphans.len(), 1);
        assert_eq!(list.orphans[0].slug, "tom-1");
        Ok(())
    }

    #[tokio::test]
    async fn test_related_info_is_cached_until_book_changes() -> Result<()> {
        let (catalogue, _dir) = test_catalogue().await?;
        publish(&catalogue, &source("tom-1", "Tom I", PRUS, "<akap>Raz.</akap>")).await?;
        publish(&catalogue, &source("lalka", "Lalka", &has_part("tom-1"), "")).await?;

        let part = catalogue.book("tom-1").await?;
        let info = catalogue.related_info(&part).await?;
        assert_eq!(
            info.tags["author"],
            vec![("Bolesław Prus".to_string(), "boleslaw-prus".to_string())]
        );
        assert!(!info.media["mp3"]);
        assert_eq!(info.parents, vec![("Lalka".to_string(), "lalka".to_string())]);
        assert!(book_queries::get_related_info(catalogue.pool(), part.id).await?.is_some());

        book_queries::update_book(catalogue.pool(), &part).await?;
        assert!(book_queries::get_related_info(catalogue.pool(), part.id).await?.is_none());

        let json = serde_json::to_string(&RelatedInfo::default()).map_err(folio_core::AppError::from)?;
        assert!(!json.contains("parents"));
        Ok(())
    }

    #[tokio::test]
    async fn test_pretty_title() -> Result<()> {
        let (catalogue, _dir) = test_catalogue().await?;
        publish(&catalogue, &source("tom-1", "Tom I", PRUS, "<akap>Raz.</akap>")).await?;
        publish(&catalogue, &source("lalka", "Lalka", &has_part("tom-1"), "")).await?;

        let part = catalogue.book("tom-1").await?;
        assert_eq!(catalogue.pretty_title(&part).await?, "Bolesław Prus, Lalka, Tom I");
        Ok(())
    }

    #[tokio::test]
    async fn test_choose_fragment_falls_back_to_parent() -> Result<()> {
        let (catalogue, _dir) = test_catalogue().await?;
        publish(
            &catalogue,
            &source(
                "tom-1",
                "Tom I",
                "",
                r#"<akap><begin id="b1"/><motyw id="m1">Miasto</motyw>Warszawa nocą.<end id="e1"/></akap>"#,
            ),
        )
        .await?;
        publish(&catalogue, &source("tom-2", "Tom II", "", "<akap>Bez motywów.</akap>")).await?;
        let whole = publish(
            &catalogue,
            &source("lalka", "Lalka", &format!("{}{}", has_part("tom-1"), has_part("tom-2")), ""),
        )
        .await?;

        let first = catalogue.book("tom-1").await?;
        let from_whole = catalogue.choose_fragment(&whole).await?;
        assert_eq!(from_whole.map(|f| f.book_id), Some(first.id));

        let second = catalogue.book("tom-2").await?;
        assert!(catalogue.choose_fragment(&second).await?.is_some());

        let lone = publish(&catalogue, &source("sam", "Sam", "", "<akap>Nic.</akap>")).await?;
        assert!(catalogue.choose_fragment(&lone).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_get_media_by_name() -> Result<()> {
        let (catalogue, _dir) = test_catalogue().await?;
        let book = publish(&catalogue, &source("lalka", "Lalka", "", "<akap>Tekst.</akap>")).await?;

        assert!(catalogue.has_media(&book, "xml").await?);
        assert!(catalogue.has_media(&book, "txt").await?);
        assert!(!catalogue.has_media(&book, "pdf").await?);
        assert_eq!(catalogue.get_media(&book, "ogg").await?, Assets::Media(Vec::new()));
        assert!(matches!(
            catalogue.get_media(&book, "djvu").await,
            Err(LibraryError::UnsupportedFormat(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_book() -> Result<()> {
        let (catalogue, dir) = test_catalogue().await?;
        publish(&catalogue, &source("tom-1", "Tom I", PRUS, "<akap>Raz.</akap>")).await?;
        let whole = publish(&catalogue, &source("lalka", "Lalka", &format!("{}{}", PRUS, has_part("tom-1")), "<akap>Wstęp.</akap>")).await?;
        assert!(dir.path().join("book/xml/lalka.xml").exists());
        let mut events = catalogue.subscribe();

        catalogue.delete_book("lalka").await?;

        assert!(catalogue.book("lalka").await.unwrap_err().is_not_found());
        assert!(!dir.path().join("book/xml/lalka.xml").exists());
        assert!(catalogue.tag(TagCategory::Book, "l-lalka").await.is_err());
        assert!(catalogue.search_books("Lalka", 10).await?.is_empty());

        let part = catalogue.book("tom-1").await?;
        assert_eq!(part.parent_id, None);
        let author = catalogue.tag(TagCategory::Author, "boleslaw-prus").await?;
        assert_eq!(catalogue.tag_count(&author).await?, 1);

        let mut deleted = false;
        while let Ok(event) = events.try_recv() {
            if let CatalogueEvent::BookDeleted { book, .. } = event {
                deleted = book == whole.id;
            }
        }
        assert!(deleted);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_middle_book_detaches_parts_from_ancestors() -> Result<()> {
        let (catalogue, _dir) = test_catalogue().await?;
        publish(
            &catalogue,
            &source(
                "c",
                "C",
                PRUS,
                r#"<akap><begin id="b1"/><motyw id="m1">Morze</motyw>Fala.<end id="e1"/></akap>"#,
            ),
        )
        .await?;
        publish(&catalogue, &source("b", "B", &has_part("c"), "")).await?;
        let a = publish(&catalogue, &source("a", "A", &format!("{}{}", PRUS, has_part("b")), "")).await?;

        let author = catalogue.tag(TagCategory::Author, "boleslaw-prus").await?;
        assert_eq!(catalogue.tag_count(&author).await?, 1);
        assert_eq!(catalogue.theme_counter(&a).await?.len(), 1);

        catalogue.delete_book("b").await?;

        let c = catalogue.book("c").await?;
        assert_eq!(c.parent_id, None);
        let slugs: Vec<String> = tag_queries::get_book_tags(catalogue.pool(), c.id)
            .await?
            .into_iter()
            .map(|t| t.slug)
            .collect();
        assert_eq!(slugs, vec!["boleslaw-prus".to_string()]);
        for fragment in fragments::get_book_fragments(catalogue.pool(), c.id).await? {
            let tags = tag_queries::get_fragment_tags(catalogue.pool(), fragment.id).await?;
            assert!(tags.iter().all(|t| t.slug != "l-a"));
        }

        assert_eq!(catalogue.tag_count(&author).await?, 2);
        let mut top: Vec<String> = catalogue
            .tagged_top_level(&[author])
            .await?
            .into_iter()
            .map(|b| b.slug)
            .collect();
        top.sort();
        assert_eq!(top, vec!["a".to_string(), "c".to_string()]);
        assert!(catalogue.theme_counter(&a).await?.is_empty());
        Ok(())
    }
}
