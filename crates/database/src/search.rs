//! Full-text search index using FTS5
//!
//! The index is maintained explicitly: the catalogue indexes a book when it is
//! published and removes it when the book is deleted. Tag names are rebuilt in
//! one pass by [`index_tags`].

use crate::queries::{books::row_to_book, fragments::row_to_fragment, tags::row_to_tag};
use crate::DbPool;
use folio_core::{AppError, Book, BookId, Fragment, FragmentId, Tag};
use log::debug;

/// Search result with relevance ranking
#[derive(Debug, Clone)]
pub struct SearchResult<T> {
    pub item: T,
    pub rank: f64,
}

/// Indexed content of a book
#[derive(Debug, Clone, Default)]
pub struct BookDocument {
    pub book_id: BookId,
    pub title: String,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub body: String,
}

/// Indexed content of a fragment
#[derive(Debug, Clone)]
pub struct FragmentDocument {
    pub fragment_id: FragmentId,
    pub text: String,
    pub themes: Vec<String>,
}

/// Turns free text into an FTS5 query matching every term
///
/// Returns `None` when the text has no searchable terms.
pub fn fts_query(text: &str, prefix: bool) -> Option<String> {
    let terms: Vec<String> = text
        .split_whitespace()
        .map(|term| term.replace('"', ""))
        .filter(|term| !term.is_empty())
        .map(|term| {
            if prefix {
                format!("\"{}\"*", term)
            } else {
                format!("\"{}\"", term)
            }
        })
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

/// Indexes a book and its fragments, replacing previous entries
pub async fn index_book(
    pool: &DbPool,
    book: &BookDocument,
    fragments: &[FragmentDocument],
) -> Result<(), AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to begin indexing", e))?;

    sqlx::query("DELETE FROM book_index WHERE book_id = ?")
        .bind(book.book_id.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| index_error("remove stale book entry", e))?;
    sqlx::query("DELETE FROM fragment_index WHERE book_id = ?")
        .bind(book.book_id.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| index_error("remove stale fragment entries", e))?;

    sqlx::query("INSERT INTO book_index (book_id, title, authors, tags, body) VALUES (?, ?, ?, ?, ?)")
        .bind(book.book_id.0)
        .bind(&book.title)
        .bind(book.authors.join(", "))
        .bind(book.tags.join(", "))
        .bind(&book.body)
        .execute(&mut *tx)
        .await
        .map_err(|e| index_error("index book", e))?;

    for fragment in fragments {
        sqlx::query("INSERT INTO fragment_index (fragment_id, book_id, text, themes) VALUES (?, ?, ?, ?)")
            .bind(fragment.fragment_id.0)
            .bind(book.book_id.0)
            .bind(&fragment.text)
            .bind(fragment.themes.join(", "))
            .execute(&mut *tx)
            .await
            .map_err(|e| index_error("index fragment", e))?;
    }

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit index", e))?;

    debug!(
        "Indexed book {} with {} fragments",
        book.book_id,
        fragments.len()
    );
    Ok(())
}

/// Replaces the fragment entries of a book, leaving its book entry alone
pub async fn index_fragments(
    pool: &DbPool,
    book: BookId,
    fragments: &[FragmentDocument],
) -> Result<(), AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to begin indexing", e))?;

    sqlx::query("DELETE FROM fragment_index WHERE book_id = ?")
        .bind(book.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| index_error("remove stale fragment entries", e))?;
    for fragment in fragments {
        sqlx::query("INSERT INTO fragment_index (fragment_id, book_id, text, themes) VALUES (?, ?, ?, ?)")
            .bind(fragment.fragment_id.0)
            .bind(book.0)
            .bind(&fragment.text)
            .bind(fragment.themes.join(", "))
            .execute(&mut *tx)
            .await
            .map_err(|e| index_error("index fragment", e))?;
    }

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit index", e))?;
    debug!("Reindexed {} fragments of book {}", fragments.len(), book);
    Ok(())
}

/// True when the book has an entry in the book index
pub async fn is_indexed(pool: &DbPool, book: BookId) -> Result<bool, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM book_index WHERE book_id = ?")
        .bind(book.0)
        .fetch_one(pool)
        .await
        .map_err(|e| index_error("look up book entry", e))?;
    Ok(count > 0)
}

/// Removes a book and its fragments from the index
pub async fn remove_book(pool: &DbPool, book: BookId) -> Result<(), AppError> {
    sqlx::query("DELETE FROM book_index WHERE book_id = ?")
        .bind(book.0)
        .execute(pool)
        .await
        .map_err(|e| index_error("remove book", e))?;
    sqlx::query("DELETE FROM fragment_index WHERE book_id = ?")
        .bind(book.0)
        .execute(pool)
        .await
        .map_err(|e| index_error("remove fragments", e))?;

    Ok(())
}

/// Rebuilds the tag-name index from every tag except shelves and l-tags
pub async fn index_tags(pool: &DbPool) -> Result<u64, AppError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::database("Failed to begin tag indexing", e))?;

    sqlx::query("DELETE FROM tag_index")
        .execute(&mut *tx)
        .await
        .map_err(|e| index_error("clear tag index", e))?;

    let result = sqlx::query(
        r#"
        INSERT INTO tag_index (tag_id, category, name)
        SELECT id, category, name FROM tags WHERE category NOT IN ('set', 'book')
        "#,
    )
    .execute(&mut *tx)
    .await
    .map_err(|e| index_error("index tags", e))?;

    tx.commit()
        .await
        .map_err(|e| AppError::database("Failed to commit tag index", e))?;

    Ok(result.rows_affected())
}

/// Searches books by title, authors, tags and text
pub async fn search_books(
    pool: &DbPool,
    query: &str,
    limit: i64,
) -> Result<Vec<SearchResult<Book>>, AppError> {
    let Some(query) = fts_query(query, false) else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query(
        r#"
        SELECT b.id, b.slug, b.common_slug, b.title, b.sort_key, b.language, b.description,
               b.extra_info, b.parent_id, b.parent_number, b.created_at, b.changed_at,
               bi.rank as rank
        FROM book_index bi
        JOIN books b ON b.id = CAST(bi.book_id AS INTEGER)
        WHERE book_index MATCH ?
        ORDER BY rank
        LIMIT ?
        "#,
    )
    .bind(query)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to search books", e))?;

    rows.into_iter()
        .map(|row| {
            use sqlx::Row;
            let rank: f64 = row.try_get("rank").unwrap_or(0.0);
            let book = row_to_book(row)?;
            Ok(SearchResult { item: book, rank })
        })
        .collect()
}

/// Searches fragments by text and theme names
pub async fn search_fragments(
    pool: &DbPool,
    query: &str,
    limit: i64,
) -> Result<Vec<SearchResult<Fragment>>, AppError> {
    let Some(query) = fts_query(query, false) else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query(
        r#"
        SELECT f.id, f.book_id, f.anchor, f.text, f.short_text, fi.rank as rank
        FROM fragment_index fi
        JOIN fragments f ON f.id = CAST(fi.fragment_id AS INTEGER)
        WHERE fragment_index MATCH ?
        ORDER BY rank
        LIMIT ?
        "#,
    )
    .bind(query)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to search fragments", e))?;

    rows.into_iter()
        .map(|row| {
            use sqlx::Row;
            let rank: f64 = row.try_get("rank").unwrap_or(0.0);
            let fragment = row_to_fragment(row)?;
            Ok(SearchResult {
                item: fragment,
                rank,
            })
        })
        .collect()
}

/// Searches tag names
pub async fn search_tags(
    pool: &DbPool,
    query: &str,
    limit: i64,
) -> Result<Vec<SearchResult<Tag>>, AppError> {
    let Some(query) = fts_query(query, false) else {
        return Ok(Vec::new());
    };
    tag_matches(pool, &query, limit).await
}

/// Tags whose name has a word starting with `prefix`, for search hints
pub async fn tags_starting_with(
    pool: &DbPool,
    prefix: &str,
    limit: i64,
) -> Result<Vec<Tag>, AppError> {
    let Some(query) = fts_query(prefix, true) else {
        return Ok(Vec::new());
    };
    let results = tag_matches(pool, &query, limit).await?;
    Ok(results.into_iter().map(|r| r.item).collect())
}

async fn tag_matches(
    pool: &DbPool,
    fts: &str,
    limit: i64,
) -> Result<Vec<SearchResult<Tag>>, AppError> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.name, t.slug, t.sort_key, t.category, t.description, t.book_count,
               t.user, t.changed_at, ti.rank as rank
        FROM tag_index ti
        JOIN tags t ON t.id = CAST(ti.tag_id AS INTEGER)
        WHERE tag_index MATCH ?
        ORDER BY rank, t.sort_key
        LIMIT ?
        "#,
    )
    .bind(fts)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::database("Failed to search tags", e))?;

    rows.into_iter()
        .map(|row| {
            use sqlx::Row;
            let rank: f64 = row.try_get("rank").unwrap_or(0.0);
            let tag = row_to_tag(row)?;
            Ok(SearchResult { item: tag, rank })
        })
        .collect()
}

fn index_error(action: &str, e: sqlx::Error) -> AppError {
    AppError::SearchIndexError {
        message: format!("Failed to {}: {}", action, e),
    }
}
