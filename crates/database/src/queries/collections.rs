//! Collection and underline database operations

use crate::DbPool;
use folio_core::{AppError, BookId, Collection, Timestamp, Underline, UnderlineId};
use sqlx::sqlite::SqliteRow;

/// Inserts or replaces a collection
pub async fn save_collection(pool: &DbPool, collection: &Collection) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO collections (slug, title, description, book_slugs) VALUES (?, ?, ?, ?)
        ON CONFLICT (slug) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            book_slugs = excluded.book_slugs
        "#,
    )
    .bind(&collection.slug)
    .bind(&collection.title)
    .bind(&collection.description)
    .bind(&collection.book_slugs)
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to save collection", e))?;

    Ok(())
}

/// Gets a collection by slug
pub async fn get_collection(pool: &DbPool, slug: &str) -> Result<Collection, AppError> {
    let row: Option<(String, String, String, String)> = sqlx::query_as(
        "SELECT slug, title, description, book_slugs FROM collections WHERE slug = ?",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await
    .map_err(|e| AppError::database("Failed to fetch collection", e))?;

    let (slug, title, description, book_slugs) =
        row.ok_or_else(|| AppError::not_found("Collection", slug))?;
    Ok(Collection {
        slug,
        title,
        description,
        book_slugs,
    })
}

/// Lists collections ordered by title
pub async fn list_collections(pool: &DbPool) -> Result<Vec<Collection>, AppError> {
    let rows: Vec<(String, String, String, String)> = sqlx::query_as(
        "SELECT slug, title, description, book_slugs FROM collections ORDER BY title",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to list collections", e))?;

    Ok(rows
        .into_iter()
        .map(|(slug, title, description, book_slugs)| Collection {
            slug,
            title,
            description,
            book_slugs,
        })
        .collect())
}

/// Deletes a collection
pub async fn delete_collection(pool: &DbPool, slug: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM collections WHERE slug = ?")
        .bind(slug)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to delete collection", e))?;

    Ok(())
}

/// Inserts an underline and returns its id
pub async fn create_underline(pool: &DbPool, underline: &Underline) -> Result<UnderlineId, AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO underlines (book_id, user, start_pos, end_pos, comment, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(underline.book_id.0)
    .bind(&underline.user)
    .bind(underline.start)
    .bind(underline.end)
    .bind(&underline.comment)
    .bind(underline.created_at.as_millis())
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to create underline", e))?;

    Ok(UnderlineId(result.last_insert_rowid()))
}

/// Gets an underline by ID
pub async fn get_underline(pool: &DbPool, id: UnderlineId) -> Result<Underline, AppError> {
    let row = sqlx::query(
        "SELECT id, book_id, user, start_pos, end_pos, comment, created_at FROM underlines WHERE id = ?",
    )
    .bind(id.0)
    .fetch_optional(pool)
    .await
    .map_err(|e| AppError::database("Failed to fetch underline", e))?
    .ok_or_else(|| AppError::not_found("Underline", id))?;

    row_to_underline(row)
}

/// Sets the comment of an underline
pub async fn set_underline_comment(
    pool: &DbPool,
    id: UnderlineId,
    comment: Option<&str>,
) -> Result<(), AppError> {
    sqlx::query("UPDATE underlines SET comment = ? WHERE id = ?")
        .bind(comment)
        .bind(id.0)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to update underline", e))?;

    Ok(())
}

/// Lists a user's underlines of a book in text order
pub async fn get_user_underlines(
    pool: &DbPool,
    book: BookId,
    user: &str,
) -> Result<Vec<Underline>, AppError> {
    let rows = sqlx::query(
        r#"
        SELECT id, book_id, user, start_pos, end_pos, comment, created_at FROM underlines
        WHERE book_id = ? AND user = ?
        ORDER BY start_pos, end_pos
        "#,
    )
    .bind(book.0)
    .bind(user)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to list underlines", e))?;

    rows.into_iter().map(row_to_underline).collect()
}

/// Deletes an underline
pub async fn delete_underline(pool: &DbPool, id: UnderlineId) -> Result<(), AppError> {
    sqlx::query("DELETE FROM underlines WHERE id = ?")
        .bind(id.0)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to delete underline", e))?;

    Ok(())
}

fn row_to_underline(row: SqliteRow) -> Result<Underline, AppError> {
    use sqlx::Row;

    let created_at: i64 = row
        .try_get("created_at")
        .map_err(|e| AppError::database("Missing created_at", e))?;

    Ok(Underline {
        id: UnderlineId(
            row.try_get("id")
                .map_err(|e| AppError::database("Missing underline ID", e))?,
        ),
        book_id: BookId(
            row.try_get("book_id")
                .map_err(|e| AppError::database("Missing book ID", e))?,
        ),
        user: row
            .try_get("user")
            .map_err(|e| AppError::database("Missing user", e))?,
        start: row
            .try_get("start_pos")
            .map_err(|e| AppError::database("Missing start", e))?,
        end: row
            .try_get("end_pos")
            .map_err(|e| AppError::database("Missing end", e))?,
        comment: row
            .try_get("comment")
            .map_err(|e| AppError::database("Missing comment", e))?,
        created_at: Timestamp::from_millis(created_at),
    })
}
