//! Book database operations

use crate::DbPool;
use folio_core::{AppError, Book, BookId, Timestamp};
use sqlx::sqlite::SqliteRow;

const BOOK_COLUMNS: &str = r#"
    id, slug, common_slug, title, sort_key, language, description, extra_info,
    parent_id, parent_number, created_at, changed_at
"#;

/// Inserts a new book and returns its id
pub async fn create_book(pool: &DbPool, book: &Book) -> Result<BookId, AppError> {
    let extra_info = serde_json::to_string(&book.extra_info)
        .map_err(|e| AppError::database("Failed to serialize extra info", e))?;

    let result = sqlx::query(
        r#"
        INSERT INTO books (
            slug, common_slug, title, sort_key, language, description, extra_info,
            parent_id, parent_number, created_at, changed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&book.slug)
    .bind(&book.common_slug)
    .bind(&book.title)
    .bind(&book.sort_key)
    .bind(&book.language)
    .bind(&book.description)
    .bind(extra_info)
    .bind(book.parent_id.map(|id| id.0))
    .bind(book.parent_number)
    .bind(book.created_at.as_millis())
    .bind(book.changed_at.as_millis())
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to create book", e))?;

    Ok(BookId(result.last_insert_rowid()))
}

/// Gets a book by ID
pub async fn get_book(pool: &DbPool, id: BookId) -> Result<Book, AppError> {
    let row = sqlx::query(&format!("SELECT {} FROM books WHERE id = ?", BOOK_COLUMNS))
        .bind(id.0)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch book", e))?
        .ok_or_else(|| AppError::not_found("Book", id))?;

    row_to_book(row)
}

/// Finds a book by slug
pub async fn find_book_by_slug(pool: &DbPool, slug: &str) -> Result<Option<Book>, AppError> {
    let row = sqlx::query(&format!("SELECT {} FROM books WHERE slug = ?", BOOK_COLUMNS))
        .bind(slug)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch book by slug", e))?;

    row.map(row_to_book).transpose()
}

/// Gets a book by slug
pub async fn get_book_by_slug(pool: &DbPool, slug: &str) -> Result<Book, AppError> {
    find_book_by_slug(pool, slug)
        .await?
        .ok_or_else(|| AppError::not_found("Book", slug))
}

/// Updates an existing book, refreshing `changed_at` and clearing the related-info cache
pub async fn update_book(pool: &DbPool, book: &Book) -> Result<(), AppError> {
    let extra_info = serde_json::to_string(&book.extra_info)
        .map_err(|e| AppError::database("Failed to serialize extra info", e))?;

    let result = sqlx::query(
        r#"
        UPDATE books SET
            slug = ?, common_slug = ?, title = ?, sort_key = ?, language = ?,
            description = ?, extra_info = ?, parent_id = ?, parent_number = ?,
            related_info = NULL, changed_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&book.slug)
    .bind(&book.common_slug)
    .bind(&book.title)
    .bind(&book.sort_key)
    .bind(&book.language)
    .bind(&book.description)
    .bind(extra_info)
    .bind(book.parent_id.map(|id| id.0))
    .bind(book.parent_number)
    .bind(Timestamp::now().as_millis())
    .bind(book.id.0)
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to update book", e))?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Book", book.id));
    }

    Ok(())
}

/// Deletes a book; its parts become top-level
pub async fn delete_book(pool: &DbPool, id: BookId) -> Result<(), AppError> {
    sqlx::query("DELETE FROM books WHERE id = ?")
        .bind(id.0)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to delete book", e))?;

    Ok(())
}

/// Lists all books ordered by sort key
pub async fn list_books(pool: &DbPool) -> Result<Vec<Book>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM books ORDER BY sort_key, id",
        BOOK_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to list books", e))?;

    rows.into_iter().map(row_to_book).collect()
}

/// Lists books ordered by `(parent_number, sort_key)`, the order of hierarchical listings
pub async fn list_books_by_position(pool: &DbPool) -> Result<Vec<Book>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM books ORDER BY parent_number, sort_key, id",
        BOOK_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to list books", e))?;

    rows.into_iter().map(row_to_book).collect()
}

/// Gets the direct parts of a book in order
pub async fn get_children(pool: &DbPool, parent: BookId) -> Result<Vec<Book>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM books WHERE parent_id = ? ORDER BY parent_number, sort_key",
        BOOK_COLUMNS
    ))
    .bind(parent.0)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to get book children", e))?;

    rows.into_iter().map(row_to_book).collect()
}

/// Gets books sharing a common slug (variants of one text)
pub async fn get_books_by_common_slug(pool: &DbPool, common_slug: &str) -> Result<Vec<Book>, AppError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM books WHERE common_slug = ? ORDER BY sort_key",
        BOOK_COLUMNS
    ))
    .bind(common_slug)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to get book variants", e))?;

    rows.into_iter().map(row_to_book).collect()
}

/// Gets books by ids, ordered by sort key; unknown ids are skipped
pub async fn get_books(pool: &DbPool, ids: &[BookId]) -> Result<Vec<Book>, AppError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT {} FROM books WHERE id IN ({}) ORDER BY sort_key, id",
        BOOK_COLUMNS, placeholders
    );
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id.0);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::database("Failed to get books", e))?;

    rows.into_iter().map(row_to_book).collect()
}

/// Counts all books
pub async fn count_books(pool: &DbPool) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to count books", e))
}

/// Reads the cached related info of a book
pub async fn get_related_info(pool: &DbPool, id: BookId) -> Result<Option<String>, AppError> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT related_info FROM books WHERE id = ?")
            .bind(id.0)
            .fetch_optional(pool)
            .await
            .map_err(|e| AppError::database("Failed to read related info", e))?;

    value.ok_or_else(|| AppError::not_found("Book", id))
}

/// Stores the related info of a book
pub async fn set_related_info(pool: &DbPool, id: BookId, json: Option<&str>) -> Result<(), AppError> {
    sqlx::query("UPDATE books SET related_info = ? WHERE id = ?")
        .bind(json)
        .bind(id.0)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to store related info", e))?;

    Ok(())
}

pub(crate) fn row_to_book(row: SqliteRow) -> Result<Book, AppError> {
    use sqlx::Row;

    let extra_info_json: String = row
        .try_get("extra_info")
        .map_err(|e| AppError::database("Missing extra info", e))?;
    let extra_info = serde_json::from_str(&extra_info_json)
        .map_err(|e| AppError::database("Failed to deserialize extra info", e))?;

    let parent_id: Option<i64> = row
        .try_get("parent_id")
        .map_err(|e| AppError::database("Missing parent id", e))?;
    let created_at: i64 = row
        .try_get("created_at")
        .map_err(|e| AppError::database("Missing created_at", e))?;
    let changed_at: i64 = row
        .try_get("changed_at")
        .map_err(|e| AppError::database("Missing changed_at", e))?;

    Ok(Book {
        id: BookId(
            row.try_get("id")
                .map_err(|e| AppError::database("Missing book ID", e))?,
        ),
        slug: row
            .try_get("slug")
            .map_err(|e| AppError::database("Missing slug", e))?,
        common_slug: row
            .try_get("common_slug")
            .map_err(|e| AppError::database("Missing common slug", e))?,
        title: row
            .try_get("title")
            .map_err(|e| AppError::database("Missing title", e))?,
        sort_key: row
            .try_get("sort_key")
            .map_err(|e| AppError::database("Missing sort key", e))?,
        language: row
            .try_get("language")
            .map_err(|e| AppError::database("Missing language", e))?,
        description: row
            .try_get("description")
            .map_err(|e| AppError::database("Missing description", e))?,
        extra_info,
        parent_id: parent_id.map(BookId),
        parent_number: row
            .try_get("parent_number")
            .map_err(|e| AppError::database("Missing parent number", e))?,
        created_at: Timestamp::from_millis(created_at),
        changed_at: Timestamp::from_millis(changed_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::create_test_db;
    use crate::migrations::run_migrations;

    async fn setup() -> DbPool {
        let pool = create_test_db().await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_create_and_get_book() {
        let pool = setup().await;
        let book = Book::new("pan-tadeusz", "Pan Tadeusz");

        let id = create_book(&pool, &book).await.unwrap();
        let retrieved = get_book(&pool, id).await.unwrap();

        assert_eq!(retrieved.slug, "pan-tadeusz");
        assert_eq!(retrieved.title, "Pan Tadeusz");
        assert_eq!(retrieved.parent_id, None);
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let pool = setup().await;
        let book = Book::new("dziady", "Dziady");
        create_book(&pool, &book).await.unwrap();
        assert!(create_book(&pool, &book).await.is_err());
    }

    #[tokio::test]
    async fn test_find_missing_book_by_slug() {
        let pool = setup().await;
        assert!(find_book_by_slug(&pool, "nope").await.unwrap().is_none());
        let err = get_book_by_slug(&pool, "nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_clears_related_info() {
        let pool = setup().await;
        let mut book = Book::new("dziady", "Dziady");
        book.id = create_book(&pool, &book).await.unwrap();

        set_related_info(&pool, book.id, Some("{}")).await.unwrap();
        assert_eq!(get_related_info(&pool, book.id).await.unwrap().as_deref(), Some("{}"));

        book.title = "Dziady, część III".to_string();
        update_book(&pool, &book).await.unwrap();
        assert_eq!(get_related_info(&pool, book.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_children_ordered_by_parent_number() {
        let pool = setup().await;
        let mut parent = Book::new("dziady", "Dziady");
        parent.id = create_book(&pool, &parent).await.unwrap();

        for (number, slug) in [(1, "dziady-czesc-ii"), (0, "dziady-czesc-i")] {
            let mut child = Book::new(slug, slug);
            child.parent_id = Some(parent.id);
            child.parent_number = number;
            create_book(&pool, &child).await.unwrap();
        }

        let children = get_children(&pool, parent.id).await.unwrap();
        let slugs: Vec<_> = children.iter().map(|b| b.slug.as_str()).collect();
        assert_eq!(slugs, vec!["dziady-czesc-i", "dziady-czesc-ii"]);
    }

    #[tokio::test]
    async fn test_delete_parent_orphans_children() {
        let pool = setup().await;
        let mut parent = Book::new("dziady", "Dziady");
        parent.id = create_book(&pool, &parent).await.unwrap();
        let mut child = Book::new("dziady-czesc-i", "Dziady I");
        child.parent_id = Some(parent.id);
        child.id = create_book(&pool, &child).await.unwrap();

        delete_book(&pool, parent.id).await.unwrap();

        let child = get_book(&pool, child.id).await.unwrap();
        assert_eq!(child.parent_id, None);
        assert_eq!(count_books(&pool).await.unwrap(), 1);
    }
}
