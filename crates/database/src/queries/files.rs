//! Stored book file operations

use crate::DbPool;
use folio_core::{AppError, BookFormat, BookId, Timestamp};

/// Records the stored file of a book format, returning the previous path
pub async fn set_book_file(
    pool: &DbPool,
    book: BookId,
    format: BookFormat,
    path: &str,
) -> Result<Option<String>, AppError> {
    let previous = get_book_file(pool, book, format).await?;

    sqlx::query(
        r#"
        INSERT INTO book_files (book_id, format, path, updated_at) VALUES (?, ?, ?, ?)
        ON CONFLICT (book_id, format) DO UPDATE SET path = excluded.path, updated_at = excluded.updated_at
        "#,
    )
    .bind(book.0)
    .bind(format.as_str())
    .bind(path)
    .bind(Timestamp::now().as_millis())
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to store book file", e))?;

    Ok(previous)
}

/// Gets the stored path of a book format
pub async fn get_book_file(
    pool: &DbPool,
    book: BookId,
    format: BookFormat,
) -> Result<Option<String>, AppError> {
    sqlx::query_scalar("SELECT path FROM book_files WHERE book_id = ? AND format = ?")
        .bind(book.0)
        .bind(format.as_str())
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch book file", e))
}

/// Lists every stored file of a book
pub async fn list_book_files(
    pool: &DbPool,
    book: BookId,
) -> Result<Vec<(BookFormat, String)>, AppError> {
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT format, path FROM book_files WHERE book_id = ? ORDER BY format")
            .bind(book.0)
            .fetch_all(pool)
            .await
            .map_err(|e| AppError::database("Failed to list book files", e))?;

    rows.into_iter()
        .map(|(format, path)| Ok((format.parse::<BookFormat>()?, path)))
        .collect::<Result<Vec<_>, AppError>>()
}

/// Forgets the stored file of a book format, returning its path
pub async fn delete_book_file(
    pool: &DbPool,
    book: BookId,
    format: BookFormat,
) -> Result<Option<String>, AppError> {
    let previous = get_book_file(pool, book, format).await?;

    sqlx::query("DELETE FROM book_files WHERE book_id = ? AND format = ?")
        .bind(book.0)
        .bind(format.as_str())
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to delete book file", e))?;

    Ok(previous)
}
