//! Attached media database operations

use crate::DbPool;
use folio_core::{AppError, BookId, BookMedia, MediaExtraInfo, MediaId, MediaType, Timestamp};
use sqlx::sqlite::SqliteRow;

const MEDIA_COLUMNS: &str = "id, book_id, type, name, path, uploaded_at, extra_info, source_sha1";

/// Inserts a media record and returns its id
pub async fn create_media(pool: &DbPool, media: &BookMedia) -> Result<MediaId, AppError> {
    let extra_info = serde_json::to_string(&media.extra_info)
        .map_err(|e| AppError::database("Failed to serialize media info", e))?;

    let result = sqlx::query(
        r#"
        INSERT INTO book_media (book_id, type, name, path, uploaded_at, extra_info, source_sha1)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(media.book_id.0)
    .bind(media.media_type.as_str())
    .bind(&media.name)
    .bind(&media.path)
    .bind(media.uploaded_at.as_millis())
    .bind(extra_info)
    .bind(&media.source_sha1)
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to create media", e))?;

    Ok(MediaId(result.last_insert_rowid()))
}

/// Updates a media record
pub async fn update_media(pool: &DbPool, media: &BookMedia) -> Result<(), AppError> {
    let extra_info = serde_json::to_string(&media.extra_info)
        .map_err(|e| AppError::database("Failed to serialize media info", e))?;

    sqlx::query(
        r#"
        UPDATE book_media SET type = ?, name = ?, path = ?, extra_info = ?, source_sha1 = ?
        WHERE id = ?
        "#,
    )
    .bind(media.media_type.as_str())
    .bind(&media.name)
    .bind(&media.path)
    .bind(extra_info)
    .bind(&media.source_sha1)
    .bind(media.id.0)
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to update media", e))?;

    Ok(())
}

/// Gets a media record by ID
pub async fn get_media(pool: &DbPool, id: MediaId) -> Result<BookMedia, AppError> {
    let row = sqlx::query(&format!("SELECT {} FROM book_media WHERE id = ?", MEDIA_COLUMNS))
        .bind(id.0)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch media", e))?
        .ok_or_else(|| AppError::not_found("BookMedia", id))?;

    row_to_media(row)
}

/// Lists the media of a book ordered by type and name, optionally of one type
pub async fn get_book_media(
    pool: &DbPool,
    book: BookId,
    media_type: Option<MediaType>,
) -> Result<Vec<BookMedia>, AppError> {
    let rows = match media_type {
        Some(media_type) => sqlx::query(&format!(
            "SELECT {} FROM book_media WHERE book_id = ? AND type = ? ORDER BY type, name",
            MEDIA_COLUMNS
        ))
        .bind(book.0)
        .bind(media_type.as_str())
        .fetch_all(pool)
        .await,
        None => sqlx::query(&format!(
            "SELECT {} FROM book_media WHERE book_id = ? ORDER BY type, name",
            MEDIA_COLUMNS
        ))
        .bind(book.0)
        .fetch_all(pool)
        .await,
    }
    .map_err(|e| AppError::database("Failed to list book media", e))?;

    rows.into_iter().map(row_to_media).collect()
}

/// Deletes a media record
pub async fn delete_media(pool: &DbPool, id: MediaId) -> Result<(), AppError> {
    sqlx::query("DELETE FROM book_media WHERE id = ?")
        .bind(id.0)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to delete media", e))?;

    Ok(())
}

pub(crate) fn row_to_media(row: SqliteRow) -> Result<BookMedia, AppError> {
    use sqlx::Row;

    let media_type: String = row
        .try_get("type")
        .map_err(|e| AppError::database("Missing media type", e))?;
    let extra_info: String = row
        .try_get("extra_info")
        .map_err(|e| AppError::database("Missing media info", e))?;
    let extra_info: MediaExtraInfo = serde_json::from_str(&extra_info)
        .map_err(|e| AppError::database("Failed to deserialize media info", e))?;
    let uploaded_at: i64 = row
        .try_get("uploaded_at")
        .map_err(|e| AppError::database("Missing upload time", e))?;

    Ok(BookMedia {
        id: MediaId(
            row.try_get("id")
                .map_err(|e| AppError::database("Missing media ID", e))?,
        ),
        book_id: BookId(
            row.try_get("book_id")
                .map_err(|e| AppError::database("Missing book ID", e))?,
        ),
        media_type: media_type.parse()?,
        name: row
            .try_get("name")
            .map_err(|e| AppError::database("Missing name", e))?,
        path: row
            .try_get("path")
            .map_err(|e| AppError::database("Missing path", e))?,
        uploaded_at: Timestamp::from_millis(uploaded_at),
        extra_info,
        source_sha1: row
            .try_get("source_sha1")
            .map_err(|e| AppError::database("Missing source sha1", e))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::create_test_db;
    use crate::migrations::run_migrations;
    use crate::queries::books::create_book;
    use folio_core::Book;

    #[tokio::test]
    async fn test_media_crud() {
        let pool = create_test_db().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let book = create_book(&pool, &Book::new("dziady", "Dziady")).await.unwrap();

        let mut media = BookMedia::new(book, MediaType::Ogg, "Część I");
        media.path = "book/ogg/czesc-i.ogg".to_string();
        media.id = create_media(&pool, &media).await.unwrap();
        create_media(&pool, &BookMedia::new(book, MediaType::Mp3, "Część I")).await.unwrap();

        media.extra_info.artist_name = "Jan Kowalski".to_string();
        media.source_sha1 = Some("abc".to_string());
        update_media(&pool, &media).await.unwrap();

        let stored = get_media(&pool, media.id).await.unwrap();
        assert_eq!(stored.extra_info.artist_name, "Jan Kowalski");
        assert_eq!(stored.source_sha1.as_deref(), Some("abc"));

        assert_eq!(get_book_media(&pool, book, None).await.unwrap().len(), 2);
        assert_eq!(get_book_media(&pool, book, Some(MediaType::Ogg)).await.unwrap().len(), 1);

        delete_media(&pool, media.id).await.unwrap();
        assert!(get_media(&pool, media.id).await.unwrap_err().is_not_found());
    }
}
