//! Fragment database operations

use crate::DbPool;
use folio_core::{AppError, BookId, Fragment, FragmentId, TagId};
use sqlx::sqlite::SqliteRow;

/// Inserts a fragment and returns its id
pub async fn create_fragment(pool: &DbPool, fragment: &Fragment) -> Result<FragmentId, AppError> {
    let result = sqlx::query(
        "INSERT INTO fragments (book_id, anchor, text, short_text) VALUES (?, ?, ?, ?)",
    )
    .bind(fragment.book_id.0)
    .bind(&fragment.anchor)
    .bind(&fragment.text)
    .bind(&fragment.short_text)
    .execute(pool)
    .await
    .map_err(|e| AppError::database("Failed to create fragment", e))?;

    Ok(FragmentId(result.last_insert_rowid()))
}

/// Gets a fragment by ID
pub async fn get_fragment(pool: &DbPool, id: FragmentId) -> Result<Fragment, AppError> {
    let row = sqlx::query("SELECT id, book_id, anchor, text, short_text FROM fragments WHERE id = ?")
        .bind(id.0)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::database("Failed to fetch fragment", e))?
        .ok_or_else(|| AppError::not_found("Fragment", id))?;

    row_to_fragment(row)
}

/// Gets the fragments of a book in document order
pub async fn get_book_fragments(pool: &DbPool, book: BookId) -> Result<Vec<Fragment>, AppError> {
    let rows = sqlx::query(
        "SELECT id, book_id, anchor, text, short_text FROM fragments WHERE book_id = ? ORDER BY id",
    )
    .bind(book.0)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to get book fragments", e))?;

    rows.into_iter().map(row_to_fragment).collect()
}

/// Deletes every fragment of a book, returning the number removed
pub async fn delete_book_fragments(pool: &DbPool, book: BookId) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM fragments WHERE book_id = ?")
        .bind(book.0)
        .execute(pool)
        .await
        .map_err(|e| AppError::database("Failed to delete book fragments", e))?;

    Ok(result.rows_affected())
}

/// Fragments carrying a tag
pub async fn get_fragments_with_tag(pool: &DbPool, tag: TagId) -> Result<Vec<Fragment>, AppError> {
    let rows = sqlx::query(
        r#"
        SELECT f.id, f.book_id, f.anchor, f.text, f.short_text FROM fragments f
        JOIN fragment_tags ft ON ft.fragment_id = f.id
        WHERE ft.tag_id = ?
        ORDER BY f.id
        "#,
    )
    .bind(tag.0)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to get tagged fragments", e))?;

    rows.into_iter().map(row_to_fragment).collect()
}

/// Picks a random fragment carrying a tag
pub async fn random_fragment_with_tag(
    pool: &DbPool,
    tag: TagId,
) -> Result<Option<Fragment>, AppError> {
    let row = sqlx::query(
        r#"
        SELECT f.id, f.book_id, f.anchor, f.text, f.short_text FROM fragments f
        JOIN fragment_tags ft ON ft.fragment_id = f.id
        WHERE ft.tag_id = ?
        ORDER BY RANDOM()
        LIMIT 1
        "#,
    )
    .bind(tag.0)
    .fetch_optional(pool)
    .await
    .map_err(|e| AppError::database("Failed to pick fragment", e))?;

    row.map(row_to_fragment).transpose()
}

/// Counts, per theme tag, the fragments carrying both `tag` and that theme
pub async fn count_themes_of_tagged_fragments(
    pool: &DbPool,
    tag: TagId,
) -> Result<Vec<(TagId, i64)>, AppError> {
    let rows: Vec<(i64, i64)> = sqlx::query_as(
        r#"
        SELECT theme.tag_id, COUNT(*) FROM fragment_tags marker
        JOIN fragment_tags theme ON theme.fragment_id = marker.fragment_id
        JOIN tags t ON t.id = theme.tag_id
        WHERE marker.tag_id = ? AND t.category = 'theme'
        GROUP BY theme.tag_id
        ORDER BY theme.tag_id
        "#,
    )
    .bind(tag.0)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to count fragment themes", e))?;

    Ok(rows.into_iter().map(|(id, count)| (TagId(id), count)).collect())
}

/// Counts all fragments
pub async fn count_fragments(pool: &DbPool) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM fragments")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::database("Failed to count fragments", e))
}

pub(crate) fn row_to_fragment(row: SqliteRow) -> Result<Fragment, AppError> {
    use sqlx::Row;

    Ok(Fragment {
        id: FragmentId(
            row.try_get("id")
                .map_err(|e| AppError::database("Missing fragment ID", e))?,
        ),
        book_id: BookId(
            row.try_get("book_id")
                .map_err(|e| AppError::database("Missing book ID", e))?,
        ),
        anchor: row
            .try_get("anchor")
            .map_err(|e| AppError::database("Missing anchor", e))?,
        text: row
            .try_get("text")
            .map_err(|e| AppError::database("Missing text", e))?,
        short_text: row
            .try_get("short_text")
            .map_err(|e| AppError::database("Missing short text", e))?,
    })
}
