// FILE: crates/library/src/catalogue/shelves.rs

//! User shelves, curated collections and underlines

use super::counters::TagTarget;
use super::Catalogue;
use crate::error::{LibraryError, Result};
use folio_core::slug::slugify;
use folio_core::{Book, Collection, Tag, TagCategory, Underline, UnderlineId, Validator};
use folio_database::queries::tags::TagDiff;
use folio_database::queries::{books as book_queries, collections, tags as tag_queries};
use log::{debug, info, warn};
use uuid::Uuid;

fn check_shelf_owner(user: &str, shelf: &Tag) -> Result<()> {
    if shelf.category == TagCategory::Set && shelf.user.as_deref() == Some(user) {
        Ok(())
    } else {
        Err(LibraryError::NotOwner {
            user: user.to_string(),
            what: format!("shelf {}", shelf.slug),
        })
    }
}

impl Catalogue {
    /// Creates a shelf owned by `user` under a random slug
    pub async fn create_shelf(&self, user: &str, name: &str) -> Result<Tag> {
        let slug = Uuid::new_v4().simple().to_string();
        let mut shelf = Tag::new(TagCategory::Set, slug, name, slugify(name));
        shelf.user = Some(user.to_string());
        shelf.id = tag_queries::create_tag(&self.pool, &shelf).await?;
        info!("Created shelf {} for {}", shelf.slug, user);
        Ok(shelf)
    }

    /// Shelves of a user with their book counts, by sort key
    pub async fn user_shelves(&self, user: &str) -> Result<Vec<(Tag, i64)>> {
        let mut shelves = Vec::new();
        for shelf in tag_queries::user_shelves(&self.pool, user).await? {
            let count = self.tag_count(&shelf).await?;
            shelves.push((shelf, count));
        }
        Ok(shelves)
    }

    pub async fn shelf_books(&self, shelf: &Tag) -> Result<Vec<Book>> {
        let ids = tag_queries::book_ids_with_tag(&self.pool, shelf.id).await?;
        Ok(book_queries::get_books(&self.pool, &ids).await?)
    }

    pub async fn add_to_shelf(&self, user: &str, shelf: &Tag, book: &Book) -> Result<()> {
        check_shelf_owner(user, shelf)?;
        let added = tag_queries::add_book_tags(&self.pool, book.id, &[shelf.id]).await?;
        let diff = TagDiff {
            added,
            removed: Vec::new(),
        };
        self.on_tags_updated(TagTarget::Book(book.id), &diff).await
    }

    /// Removes a book from a shelf; returns false when it was not there
    pub async fn remove_from_shelf(&self, user: &str, shelf: &Tag, book: &Book) -> Result<bool> {
        check_shelf_owner(user, shelf)?;
        if !tag_queries::remove_book_tag(&self.pool, book.id, shelf.id).await? {
            return Ok(false);
        }
        let diff = TagDiff {
            added: Vec::new(),
            removed: vec![shelf.id],
        };
        self.on_tags_updated(TagTarget::Book(book.id), &diff).await?;
        Ok(true)
    }

    pub async fn delete_shelf(&self, user: &str, shelf: &Tag) -> Result<()> {
        check_shelf_owner(user, shelf)?;
        tag_queries::delete_tag(&self.pool, shelf.id).await?;
        info!("Deleted shelf {} of {}", shelf.slug, user);
        Ok(())
    }

    /// Validates and stores a collection
    pub async fn save_collection(&self, collection: &Collection) -> Result<()> {
        collection.validate().map_err(LibraryError::Validation)?;
        collections::save_collection(&self.pool, collection).await?;
        debug!("Saved collection {} ({} slugs)", collection.slug, collection.slugs().len());
        Ok(())
    }

    pub async fn list_collections(&self) -> Result<Vec<Collection>> {
        Ok(collections::list_collections(&self.pool).await?)
    }

    pub async fn delete_collection(&self, slug: &str) -> Result<()> {
        Ok(collections::delete_collection(&self.pool, slug).await?)
    }

    /// Books of a collection in declaration order; slugs not yet published are skipped
    pub async fn collection_books(&self, slug: &str) -> Result<Vec<Book>> {
        let collection = collections::get_collection(&self.pool, slug).await?;
        let mut books = Vec::new();
        for book_slug in collection.slugs() {
            match book_queries::find_book_by_slug(&self.pool, book_slug).await? {
                Some(book) => books.push(book),
                None => debug!("Collection {} names missing book {}", slug, book_slug),
            }
        }
        Ok(books)
    }

    pub async fn add_underline(&self, mut underline: Underline) -> Result<Underline> {
        underline.validate().map_err(LibraryError::Validation)?;
        book_queries::get_book(&self.pool, underline.book_id).await?;
        underline.id = collections::create_underline(&self.pool, &underline).await?;
        Ok(underline)
    }

    /// Sets or clears the comment of an underline owned by `user`
    pub async fn comment_underline(
        &self,
        user: &str,
        id: UnderlineId,
        comment: Option<&str>,
    ) -> Result<Underline> {
        let underline = self.owned_underline(user, id).await?;
        let comment = comment.map(str::trim).filter(|c| !c.is_empty());
        collections::set_underline_comment(&self.pool, underline.id, comment).await?;
        Ok(collections::get_underline(&self.pool, id).await?)
    }

    pub async fn delete_underline(&self, user: &str, id: UnderlineId) -> Result<()> {
        let underline = self.owned_underline(user, id).await?;
        Ok(collections::delete_underline(&self.pool, underline.id).await?)
    }

    pub async fn user_underlines(&self, book: &Book, user: &str) -> Result<Vec<Underline>> {
        Ok(collections::get_user_underlines(&self.pool, book.id, user).await?)
    }

    async fn owned_underline(&self, user: &str, id: UnderlineId) -> Result<Underline> {
        let underline = collections::get_underline(&self.pool, id).await?;
        if underline.user != user {
            warn!("{} tried to change an underline of {}", user, underline.user);
            return Err(LibraryError::NotOwner {
                user: user.to_string(),
                what: format!("underline {}", id),
            });
        }
        Ok(underline)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::test_catalogue;
    use super::*;

    async fn book(catalogue: &Catalogue, slug: &str) -> Result<Book> {
        let mut book = Book::new(slug, slug);
        book.id = book_queries::create_book(catalogue.pool(), &book).await?;
        Ok(book)
    }

    #[tokio::test]
    async fn test_shelf_lifecycle() -> Result<()> {
        let (catalogue, _dir) = test_catalogue().await?;
        let lalka = book(&catalogue, "lalka").await?;
        let faraon = book(&catalogue, "faraon").await?;

        let shelf = catalogue.create_shelf("ola", "Ulubione Książki").await?;
        assert_eq!(shelf.slug.len(), 32);
        assert_eq!(shelf.sort_key, "ulubione-ksiazki");

        catalogue.add_to_shelf("ola", &shelf, &lalka).await?;
        catalogue.add_to_shelf("ola", &shelf, &faraon).await?;
        let shelves = catalogue.user_shelves("ola").await?;
        assert_eq!(shelves.len(), 1);
        assert_eq!(shelves[0].1, 2);

        assert!(catalogue.remove_from_shelf("ola", &shelf, &lalka).await?);
        assert!(!catalogue.remove_from_shelf("ola", &shelf, &lalka).await?);
        assert_eq!(catalogue.user_shelves("ola").await?[0].1, 1);
        assert_eq!(catalogue.shelf_books(&shelf).await?[0].slug, "faraon");

        catalogue.delete_shelf("ola", &shelf).await?;
        assert!(catalogue.user_shelves("ola").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_shelf_belongs_to_owner() -> Result<()> {
        let (catalogue, _dir) = test_catalogue().await?;
        let lalka = book(&catalogue, "lalka").await?;
        let shelf = catalogue.create_shelf("ola", "Moje").await?;

        let err = catalogue.add_to_shelf("ala", &shelf, &lalka).await.unwrap_err();
        assert!(matches!(err, LibraryError::NotOwner { .. }));
        assert!(catalogue.user_shelves("ala").await?.is_empty());
        assert!(catalogue.delete_shelf("ala", &shelf).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_collection_resolves_existing_books() -> Result<()> {
        let (catalogue, _dir) = test_catalogue().await?;
        book(&catalogue, "dziady").await?;
        book(&catalogue, "lalka").await?;

        let mut collection = Collection::new("lektury", "Lektury");
        collection.book_slugs = "lalka\nnie-ma\ndziady\n".to_string();
        catalogue.save_collection(&collection).await?;

        let slugs: Vec<String> = catalogue
            .collection_books("lektury")
            .await?
            .into_iter()
            .map(|b| b.slug)
            .collect();
        assert_eq!(slugs, vec!["lalka", "dziady"]);

        let invalid = Collection::new("Złe Lektury", "");
        let err = catalogue.save_collection(&invalid).await.unwrap_err();
        assert!(matches!(err, LibraryError::Validation(ref errors) if errors.len() == 2));
        Ok(())
    }

    #[tokio::test]
    async fn test_underline_comments_need_ownership() -> Result<()> {
        let (catalogue, _dir) = test_catalogue().await?;
        let lalka = book(&catalogue, "lalka").await?;

        let underline = catalogue.add_underline(Underline::new(lalka.id, "ola", 10, 25)).await?;
        let updated = catalogue
            .comment_underline("ola", underline.id, Some("  piękne  "))
            .await?;
        assert_eq!(updated.comment.as_deref(), Some("piękne"));

        let err = catalogue
            .comment_underline("ala", underline.id, Some("moje"))
            .await
            .unwrap_err();
        assert!(matches!(err, LibraryError::NotOwner { .. }));

        assert_eq!(catalogue.user_underlines(&lalka, "ola").await?.len(), 1);
        assert!(catalogue.user_underlines(&lalka, "ala").await?.is_empty());

        catalogue.delete_underline("ola", underline.id).await?;
        assert!(catalogue.user_underlines(&lalka, "ola").await?.is_empty());

        let err = catalogue.add_underline(Underline::new(lalka.id, "ola", 9, 3)).await.unwrap_err();
        assert!(matches!(err, LibraryError::Validation(_)));
        Ok(())
    }
}
