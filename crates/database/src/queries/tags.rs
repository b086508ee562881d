//! Tag database operations, including the book and fragment tag links

use crate::DbPool;
use folio_core::{AppError, BookId, FragmentId, Tag, TagCategory, TagId, Timestamp};
use sqlx::sqlite::SqliteRow;
use std::collections::BTreeSet;

const TAG_COLUMNS: &str =
    "t.id, t.name, t.slug, t.sort_key, t.category, t.description, t.book_count, t.user, t.changed_at";

/// Tags added to and removed from an object by a tag-set change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    pub added: Vec<TagId>,
    pub removed: Vec<TagId>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Every tag whose membership changed
    pub fn affected(&self) -> Vec<TagId> {
        self.added.iter().chain(self.removed.iter()).copied().collect()
    }
}

/// Inserts a new tag and returns its id
pub async fn create_tag(pool: &DbPool, tag: &Tag) -> Result<TagId, AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO tags (name, slug, sort_key, category, description, book_count, user, changed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&tag.name)
    .bind(&tag.slug)
    .bind(&tag.sort_key)
    .bind(tag.category.as_str())
    .bind(&tag.description)
    .bind(tag.book_count)
    .bind(&tag.user)
    .bind(tag.changed_at.as_millis())
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to create tag", e))?;

    Ok(TagId(result.last_insert_rowid()))
}

/// Gets a tag by ID
pub async fn get_tag(pool: &DbPool, id: TagId) -> Result<Tag, AppError> {
    let row = sqlx::query(&format!("SELECT {} FROM tags t WHERE t.id = ?", TAG_COLUMNS))
        .bind(id.0)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch tag", e))?
        .ok_or_else(|| AppError::not_found("Tag", id))?;

    row_to_tag(row)
}

/// Finds a tag by category and slug
pub async fn find_tag(
    pool: &DbPool,
    category: TagCategory,
    slug: &str,
) -> Result<Option<Tag>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM tags t WHERE t.category = ? AND t.slug = ?",
        TAG_COLUMNS
    ))
    .bind(category.as_str())
    .bind(slug)
    .fetch_optional(pool)
    .await
    .map_err(|e| AppError::database("Failed to fetch tag", e))?;

    row.map(row_to_tag).transpose()
}

/// Gets a tag by category and slug, creating it with the given name and sort key
///
/// Returns the tag and whether it was created.
pub async fn get_or_create_tag(
    pool: &DbPool,
    category: TagCategory,
    slug: &str,
    name: &str,
    sort_key: &str,
) -> Result<(Tag, bool), AppError> {
    if let Some(tag) = find_tag(pool, category, slug).await? {
        return Ok((tag, false));
    }

    let mut tag = Tag::new(category, slug, name, sort_key);
    tag.id = create_tag(pool, &tag).await?;
    Ok((tag, true))
}

/// Finds tags with the given slug in every category except `book`
pub async fn find_tags_by_slug(pool: &DbPool, slug: &str) -> Result<Vec<Tag>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM tags t WHERE t.slug = ? AND t.category != 'book' ORDER BY t.sort_key",
        TAG_COLUMNS
    ))
    .bind(slug)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to find tags by slug", e))?;

    rows.into_iter().map(row_to_tag).collect()
}

/// Lists tags ordered by sort key, optionally restricted to a category
pub async fn list_tags(pool: &DbPool, category: Option<TagCategory>) -> Result<Vec<Tag>, AppError> {
    let rows = match category {
        Some(category) => sqlx::query(&format!(
            "SELECT {} FROM tags t WHERE t.category = ? ORDER BY t.sort_key, t.id",
            TAG_COLUMNS
        ))
        .bind(category.as_str())
        .fetch_all(pool)
        .await,
        None => sqlx::query(&format!(
            "SELECT {} FROM tags t ORDER BY t.sort_key, t.id",
            TAG_COLUMNS
        ))
        .fetch_all(pool)
        .await,
    }
    .map_err(|e| AppError::database("Failed to list tags", e))?;

    rows.into_iter().map(row_to_tag).collect()
}

/// Lists a user's shelves
pub async fn user_shelves(pool: &DbPool, user: &str) -> Result<Vec<Tag>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM tags t WHERE t.category = 'set' AND t.user = ? ORDER BY t.sort_key",
        TAG_COLUMNS
    ))
    .bind(user)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to list shelves", e))?;

    rows.into_iter().map(row_to_tag).collect()
}

/// Updates a tag's descriptive fields
pub async fn update_tag(pool: &DbPool, tag: &Tag) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE tags SET name = ?, slug = ?, sort_key = ?, description = ?, user = ?, changed_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&tag.name)
    .bind(&tag.slug)
    .bind(&tag.sort_key)
    .bind(&tag.description)
    .bind(&tag.user)
    .bind(Timestamp::now().as_millis())
    .bind(tag.id.0)
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to update tag", e))?;

    Ok(())
}

/// Deletes a tag and its links
pub async fn delete_tag(pool: &DbPool, id: TagId) -> Result<(), AppError> {
    sqlx::query("DELETE FROM tags WHERE id = ?")
        .bind(id.0)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to delete tag", e))?;

    Ok(())
}

/// Clears the cached count and bumps `changed_at`
pub async fn touch_tag(pool: &DbPool, id: TagId) -> Result<(), AppError> {
    sqlx::query("UPDATE tags SET book_count = NULL, changed_at = ? WHERE id = ?")
        .bind(Timestamp::now().as_millis())
        .bind(id.0)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to touch tag", e))?;

    Ok(())
}

/// Stores the cached count of a tag
pub async fn set_book_count(pool: &DbPool, id: TagId, count: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE tags SET book_count = ? WHERE id = ?")
        .bind(count)
        .bind(id.0)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to store tag count", e))?;

    Ok(())
}

/// Gets the tags of a book ordered by category and sort key
pub async fn get_book_tags(pool: &DbPool, book: BookId) -> Result<Vec<Tag>, AppError> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM tags t
        JOIN book_tags bt ON bt.tag_id = t.id
        WHERE bt.book_id = ?
        ORDER BY t.category, t.sort_key
        "#,
        TAG_COLUMNS
    ))
    .bind(book.0)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to get book tags", e))?;

    rows.into_iter().map(row_to_tag).collect()
}

/// Replaces the tag set of a book
pub async fn set_book_tags(pool: &DbPool, book: BookId, tags: &[TagId]) -> Result<TagDiff, AppError> {
    let current: Vec<i64> = sqlx::query_scalar("SELECT tag_id FROM book_tags WHERE book_id = ?")
        .bind(book.0)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::database("Failed to read book tags", e))?;

    let diff = diff_tags(&current, tags);
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to begin transaction", e))?;

    for tag in &diff.removed {
        sqlx::query("DELETE FROM book_tags WHERE book_id = ? AND tag_id = ?")
            .bind(book.0)
            .bind(tag.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database("Failed to remove book tag", e))?;
    }
    for tag in &diff.added {
        sqlx::query("INSERT INTO book_tags (book_id, tag_id) VALUES (?, ?)")
            .bind(book.0)
            .bind(tag.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database("Failed to add book tag", e))?;
    }

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit book tags", e))?;

    Ok(diff)
}

/// Adds tags to a book, returning the ones that were not there yet
pub async fn add_book_tags(pool: &DbPool, book: BookId, tags: &[TagId]) -> Result<Vec<TagId>, AppError> {
    let mut added = Vec::new();
    for tag in tags {
        let result = sqlx::query("INSERT OR IGNORE INTO book_tags (book_id, tag_id) VALUES (?, ?)")
            .bind(book.0)
            .bind(tag.0)
            .execute(pool)
            .await
            .map_err(|e| AppError::database("Failed to add book tag", e))?;
        if result.rows_affected() > 0 {
            added.push(*tag);
        }
    }
    Ok(added)
}

/// Removes a tag from a book; returns whether it was present
pub async fn remove_book_tag(pool: &DbPool, book: BookId, tag: TagId) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM book_tags WHERE book_id = ? AND tag_id = ?")
        .bind(book.0)
        .bind(tag.0)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to remove book tag", e))?;

    Ok(result.rows_affected() > 0)
}

/// Ids of books carrying a tag
pub async fn book_ids_with_tag(pool: &DbPool, tag: TagId) -> Result<Vec<BookId>, AppError> {
    let ids: Vec<i64> = sqlx::query_scalar("SELECT book_id FROM book_tags WHERE tag_id = ? ORDER BY book_id")
        .bind(tag.0)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::database("Failed to get tagged books", e))?;

    Ok(ids.into_iter().map(BookId).collect())
}

/// Ids of books carrying every one of the tags
pub async fn book_ids_with_all_tags(pool: &DbPool, tags: &[TagId]) -> Result<Vec<BookId>, AppError> {
    if tags.is_empty() {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM books ORDER BY id")
            .fetch_all(pool)
            .await
            .map_err(|e| AppError::database("Failed to list book ids", e))?;
        return Ok(ids.into_iter().map(BookId).collect());
    }

    let unique: BTreeSet<i64> = tags.iter().map(|t| t.0).collect();
    let placeholders = vec!["?"; unique.len()].join(", ");
    let sql = format!(
        r#"
        SELECT book_id FROM book_tags
        WHERE tag_id IN ({})
        GROUP BY book_id
        HAVING COUNT(DISTINCT tag_id) = ?
        ORDER BY book_id
        "#,
        placeholders
    );
    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for tag in &unique {
        query = query.bind(*tag);
    }
    let ids = query
        .bind(unique.len() as i64)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::database("Failed to get tagged books", e))?;

    Ok(ids.into_iter().map(BookId).collect())
}

/// Gets the tags of a fragment ordered by category and sort key
pub async fn get_fragment_tags(pool: &DbPool, fragment: FragmentId) -> Result<Vec<Tag>, AppError> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM tags t
        JOIN fragment_tags ft ON ft.tag_id = t.id
        WHERE ft.fragment_id = ?
        ORDER BY t.category, t.sort_key
        "#,
        TAG_COLUMNS
    ))
    .bind(fragment.0)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to get fragment tags", e))?;

    rows.into_iter().map(row_to_tag).collect()
}

/// Replaces the tag set of a fragment
pub async fn set_fragment_tags(
    pool: &DbPool,
    fragment: FragmentId,
    tags: &[TagId],
) -> Result<TagDiff, AppError> {
    let current: Vec<i64> =
        sqlx::query_scalar("SELECT tag_id FROM fragment_tags WHERE fragment_id = ?")
            .bind(fragment.0)
            .fetch_all(pool)
            .await
            .map_err(|e| AppError::database("Failed to read fragment tags", e))?;

    let diff = diff_tags(&current, tags);
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to begin transaction", e))?;

    for tag in &diff.removed {
        sqlx::query("DELETE FROM fragment_tags WHERE fragment_id = ? AND tag_id = ?")
            .bind(fragment.0)
            .bind(tag.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database("Failed to remove fragment tag", e))?;
    }
    for tag in &diff.added {
        sqlx::query("INSERT INTO fragment_tags (fragment_id, tag_id) VALUES (?, ?)")
            .bind(fragment.0)
            .bind(tag.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database("Failed to add fragment tag", e))?;
    }

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit fragment tags", e))?;

    Ok(diff)
}

/// Adds tags to a fragment, returning the ones that were not there yet
pub async fn add_fragment_tags(
    pool: &DbPool,
    fragment: FragmentId,
    tags: &[TagId],
) -> Result<Vec<TagId>, AppError> {
    let mut added = Vec::new();
    for tag in tags {
        let result =
            sqlx::query("INSERT OR IGNORE INTO fragment_tags (fragment_id, tag_id) VALUES (?, ?)")
                .bind(fragment.0)
                .bind(tag.0)
                .execute(pool)
                .await
                .map_err(|e| AppError::database("Failed to add fragment tag", e))?;
        if result.rows_affected() > 0 {
            added.push(*tag);
        }
    }
    Ok(added)
}

/// Removes a tag from a fragment; returns whether it was present
pub async fn remove_fragment_tag(
    pool: &DbPool,
    fragment: FragmentId,
    tag: TagId,
) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM fragment_tags WHERE fragment_id = ? AND tag_id = ?")
        .bind(fragment.0)
        .bind(tag.0)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to remove fragment tag", e))?;

    Ok(result.rows_affected() > 0)
}

/// Counts fragments carrying a tag
pub async fn count_fragments_with_tag(pool: &DbPool, tag: TagId) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM fragment_tags WHERE tag_id = ?")
        .bind(tag.0)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to count tagged fragments", e))
}

fn diff_tags(current: &[i64], wanted: &[TagId]) -> TagDiff {
    let current: BTreeSet<i64> = current.iter().copied().collect();
    let wanted: BTreeSet<i64> = wanted.iter().map(|t| t.0).collect();
    TagDiff {
        added: wanted.difference(&current).copied().map(TagId).collect(),
        removed: current.difference(&wanted).copied().map(TagId).collect(),
    }
}

pub(crate) fn row_to_tag(row: SqliteRow) -> Result<Tag, AppError> {
    use sqlx::Row;

    let category: String = row
        .try_get("category")
        .map_err(|e| AppError::database("Missing category", e))?;
    let changed_at: i64 = row
        .try_get("changed_at")
        .map_err(|e| AppError::database("Missing changed_at", e))?;

    Ok(Tag {
        id: TagId(
            row.try_get("id")
                .map_err(|e| AppError::database("Missing tag ID", e))?,
        ),
        name: row
            .try_get("name")
            .map_err(|e| AppError::database("Missing name", e))?,
        slug: row
            .try_get("slug")
            .map_err(|e| AppError::database("Missing slug", e))?,
        sort_key: row
            .try_get("sort_key")
            .map_err(|e| AppError::database("Missing sort key", e))?,
        category: category.parse()?,
        description: row
            .try_get("description")
            .map_err(|e| AppError::database("Missing description", e))?,
        book_count: row
            .try_get("book_count")
            .map_err(|e| AppError::database("Missing book count", e))?,
        user: row
            .try_get("user")
            .map_err(|e| AppError::database("Missing user", e))?,
        changed_at: Timestamp::from_millis(changed_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::create_test_db;
    use crate::migrations::run_migrations;
    use crate::queries::books::create_book;
    use crate::queries::fragments::create_fragment;
    use folio_core::{Book, Fragment};

    async fn setup() -> DbPool {
        let pool = create_test_db().await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_get_or_create_tag_is_idempotent() {
        let pool = setup().await;
        let (first, created) =
            get_or_create_tag(&pool, TagCategory::Epoch, "romantyzm", "Romantyzm", "romantyzm")
                .await
                .unwrap();
        assert!(created);

        let (second, created) =
            get_or_create_tag(&pool, TagCategory::Epoch, "romantyzm", "Other", "other")
                .await
                .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Romantyzm");
    }

    #[tokio::test]
    async fn test_same_slug_in_different_categories() {
        let pool = setup().await;
        get_or_create_tag(&pool, TagCategory::Kind, "liryka", "Liryka", "liryka").await.unwrap();
        get_or_create_tag(&pool, TagCategory::Genre, "liryka", "Liryka", "liryka").await.unwrap();
        get_or_create_tag(&pool, TagCategory::Book, "liryka", "Liryka", "liryka").await.unwrap();

        let found = find_tags_by_slug(&pool, "liryka").await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|t| t.category != TagCategory::Book));
    }

    #[tokio::test]
    async fn test_set_book_tags_reports_diff() {
        let pool = setup().await;
        let book = create_book(&pool, &Book::new("dziady", "Dziady")).await.unwrap();
        let (a, _) = get_or_create_tag(&pool, TagCategory::Kind, "dramat", "Dramat", "dramat").await.unwrap();
        let (b, _) = get_or_create_tag(&pool, TagCategory::Epoch, "romantyzm", "Romantyzm", "romantyzm").await.unwrap();
        let (c, _) = get_or_create_tag(&pool, TagCategory::Genre, "dramat-romantyczny", "Dramat romantyczny", "dramat romantyczny").await.unwrap();

        let diff = set_book_tags(&pool, book, &[a.id, b.id]).await.unwrap();
        assert_eq!(diff.added.len(), 2);
        assert!(diff.removed.is_empty());

        let diff = set_book_tags(&pool, book, &[b.id, c.id]).await.unwrap();
        assert_eq!(diff.added, vec![c.id]);
        assert_eq!(diff.removed, vec![a.id]);

        let tags = get_book_tags(&pool, book).await.unwrap();
        assert_eq!(tags.len(), 2);
    }

    #[tokio::test]
    async fn test_book_ids_with_all_tags() {
        let pool = setup().await;
        let b1 = create_book(&pool, &Book::new("b1", "B1")).await.unwrap();
        let b2 = create_book(&pool, &Book::new("b2", "B2")).await.unwrap();
        let (x, _) = get_or_create_tag(&pool, TagCategory::Kind, "x", "X", "x").await.unwrap();
        let (y, _) = get_or_create_tag(&pool, TagCategory::Kind, "y", "Y", "y").await.unwrap();

        add_book_tags(&pool, b1, &[x.id, y.id]).await.unwrap();
        add_book_tags(&pool, b2, &[x.id]).await.unwrap();

        assert_eq!(book_ids_with_all_tags(&pool, &[x.id]).await.unwrap(), vec![b1, b2]);
        assert_eq!(book_ids_with_all_tags(&pool, &[x.id, y.id]).await.unwrap(), vec![b1]);
        assert_eq!(book_ids_with_all_tags(&pool, &[]).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_touch_tag_clears_count() {
        let pool = setup().await;
        let (tag, _) = get_or_create_tag(&pool, TagCategory::Kind, "epika", "Epika", "epika").await.unwrap();
        set_book_count(&pool, tag.id, 7).await.unwrap();
        assert_eq!(get_tag(&pool, tag.id).await.unwrap().book_count, Some(7));

        touch_tag(&pool, tag.id).await.unwrap();
        assert_eq!(get_tag(&pool, tag.id).await.unwrap().book_count, None);
    }

    #[tokio::test]
    async fn test_add_book_tags_skips_existing() {
        let pool = setup().await;
        let book = create_book(&pool, &Book::new("b", "B")).await.unwrap();
        let (x, _) = get_or_create_tag(&pool, TagCategory::Kind, "x", "X", "x").await.unwrap();

        assert_eq!(add_book_tags(&pool, book, &[x.id]).await.unwrap(), vec![x.id]);
        assert!(add_book_tags(&pool, book, &[x.id]).await.unwrap().is_empty());
        assert!(remove_book_tag(&pool, book, x.id).await.unwrap());
        assert!(!remove_book_tag(&pool, book, x.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_fragment_tag() {
        let pool = setup().await;
        let book = create_book(&pool, &Book::new("b", "B")).await.unwrap();
        let fragment = create_fragment(&pool, &Fragment::new(book, "m1", "Tekst."))
            .await
            .unwrap();
        let (theme, _) = get_or_create_tag(&pool, TagCategory::Theme, "morze", "Morze", "morze").await.unwrap();
        let (book_tag, _) = get_or_create_tag(&pool, TagCategory::Book, "l-b", "B", "b").await.unwrap();
        add_fragment_tags(&pool, fragment, &[theme.id, book_tag.id]).await.unwrap();

        assert!(remove_fragment_tag(&pool, fragment, book_tag.id).await.unwrap());
        assert!(!remove_fragment_tag(&pool, fragment, book_tag.id).await.unwrap());

        let left = get_fragment_tags(&pool, fragment).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, theme.id);
        assert_eq!(count_fragments_with_tag(&pool, book_tag.id).await.unwrap(), 0);
    }
}
