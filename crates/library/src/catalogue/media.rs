// FILE: crates/library/src/catalogue/media.rs

use super::Catalogue;
use crate::error::{LibraryError, Result};
use crate::media::{read_media_info, read_source_sha1};
use folio_core::{BookMedia, MediaId};
use folio_database::queries::{books as book_queries, media as media_queries};
use log::{info, warn};
use std::path::Path;

impl Catalogue {
    /// Saves a media record, storing `source` as its file when given
    ///
    /// The file lives at a path derived from the media name; renaming the
    /// media moves the file. Credits and the source checksum are read from
    /// the audio tags.
    pub async fn save_media(&self, mut media: BookMedia, source: Option<&Path>) -> Result<BookMedia> {
        let book = book_queries::get_book(&self.pool, media.book_id).await?;

        let previous = if media.id.0 != 0 {
            Some(media_queries::get_media(&self.pool, media.id).await?.path)
        } else {
            None
        };
        let path = self
            .storage
            .upload_path(media.media_type.extension(), &media.name);

        match (source, previous.as_deref()) {
            (Some(source), previous) => self.storage.save_file(previous, &path, source)?,
            (None, Some(previous)) => self.storage.rename(previous, &path)?,
            (None, None) => {
                return Err(LibraryError::InvalidFile(format!(
                    "no file given for {} media {}",
                    media.media_type, media.name
                )))
            }
        }
        media.path = path;

        if media.media_type.has_tags() {
            let absolute = self.storage.absolute(&media.path);
            media.extra_info = read_media_info(&absolute, media.media_type);
            media.source_sha1 = read_source_sha1(&absolute, media.media_type);
        }

        if media.id.0 == 0 {
            media.id = media_queries::create_media(&self.pool, &media).await?;
            info!("Attached {} to {}", media, book.slug);
        } else {
            media_queries::update_media(&self.pool, &media).await?;
        }

        book_queries::set_related_info(&self.pool, book.id, None).await?;
        Ok(media)
    }

    /// Removes a media record and its file
    pub async fn delete_media(&self, id: MediaId) -> Result<()> {
        let media = media_queries::get_media(&self.pool, id).await?;
        media_queries::delete_media(&self.pool, id).await?;
        if let Err(e) = self.storage.delete(&media.path) {
            warn!("Could not remove {}: {}", media.path, e);
        }
        book_queries::set_related_info(&self.pool, media.book_id, None).await?;
        info!("Removed media {}", media);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{source, test_catalogue};
    use super::*;
    use crate::ImportOptions;
    use folio_core::MediaType;

    #[tokio::test]
    async fn test_media_lifecycle() -> Result<()> {
        let (catalogue, dir) = test_catalogue().await?;
        let xml = source("lalka", "Lalka", "", "<akap>Tekst.</akap>");
        let info = catalogue.metadata.parse(&xml)?;
        let book = catalogue
            .from_text_and_meta(xml.as_bytes(), &info, &ImportOptions::default())
            .await?;
        assert!(!catalogue.related_info(&book).await?.media["mp3"]);

        let upload = dir.path().join("upload.mp3");
        std::fs::write(&upload, b"not really audio")?;
        let media = catalogue
            .save_media(BookMedia::new(book.id, MediaType::Mp3, "Rozdział 1"), Some(&upload))
            .await?;
        assert_eq!(media.path, "book/mp3/rozdzial-1.mp3");
        assert!(catalogue.storage().exists(&media.path));
        assert_eq!(media.source_sha1, None);
        assert!(catalogue.related_info(&book).await?.media["mp3"]);

        let mut renamed = media.clone();
        renamed.name = "Rozdział pierwszy".to_string();
        let renamed = catalogue.save_media(renamed, None).await?;
        assert_eq!(renamed.path, "book/mp3/rozdzial-pierwszy.mp3");
        assert!(!catalogue.storage().exists(&media.path));
        assert!(catalogue.storage().exists(&renamed.path));

        catalogue.delete_media(renamed.id).await?;
        assert!(!catalogue.storage().exists(&renamed.path));
        assert!(!catalogue.has_media(&book, "mp3").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_media_needs_a_file() -> Result<()> {
        let (catalogue, _dir) = test_catalogue().await?;
        let mut book = folio_core::Book::new("lalka", "Lalka");
        book.id = book_queries::create_book(catalogue.pool(), &book).await?;

        let err = catalogue
            .save_media(BookMedia::new(book.id, MediaType::Ogg, "Całość"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LibraryError::InvalidFile(_)));
        Ok(())
    }
}
