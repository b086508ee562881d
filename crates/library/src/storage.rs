// FILE: crates/library/src/storage.rs

//! File storage under the media root
//!
//! Stored files are addressed by paths relative to the root, laid out as
//! `book/<ext>/<name>.<ext>`. Saving into a slot that already holds a file at
//! a different path removes the old file.

use crate::error::Result;
use folio_core::slug::{slugify, truncate_chars};
use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Longest relative path handed out for stored files
pub const MAX_PATH_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative path for a file named `name` with extension `ext`
    pub fn upload_path(&self, ext: &str, name: &str) -> String {
        let fixed = format!("book/{}/.{}", ext, ext).chars().count();
        let budget = MAX_PATH_LEN.saturating_sub(fixed + 4);
        let name = truncate_chars(&slugify(name), budget);
        format!("book/{}/{}.{}", ext, name, ext)
    }

    /// Absolute path of a stored file
    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.absolute(relative).is_file()
    }

    /// Writes `content` at `relative`, replacing the file previously stored in the slot
    pub fn save(&self, previous: Option<&str>, relative: &str, content: &[u8]) -> Result<()> {
        let target = self.absolute(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, content)?;
        debug!("Stored {} ({} bytes)", relative, content.len());
        self.release_previous(previous, relative);
        Ok(())
    }

    /// Copies an existing file into the slot at `relative`
    pub fn save_file(&self, previous: Option<&str>, relative: &str, source: &Path) -> Result<()> {
        let target = self.absolute(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        if source != target {
            fs::copy(source, &target)?;
        }
        debug!("Stored {} from {}", relative, source.display());
        self.release_previous(previous, relative);
        Ok(())
    }

    /// Absolute target for a file written directly into `relative`, with its directory created
    ///
    /// Call [`MediaStorage::release_previous`] once the file is in place.
    pub fn prepare(&self, relative: &str) -> Result<PathBuf> {
        let target = self.absolute(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(target)
    }

    /// Moves a stored file to a new relative path
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return Ok(());
        }
        let target = self.absolute(to);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(self.absolute(from), target)?;
        debug!("Renamed {} to {}", from, to);
        Ok(())
    }

    /// Removes a stored file; a missing file is not an error
    pub fn delete(&self, relative: &str) -> Result<()> {
        match fs::remove_file(self.absolute(relative)) {
            Ok(()) => {
                debug!("Removed {}", relative);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes the file a slot held before, unless it is the same path
    pub fn release_previous(&self, previous: Option<&str>, relative: &str) {
        if let Some(previous) = previous {
            if previous != relative {
                if let Err(e) = self.delete(previous) {
                    warn!("Could not remove replaced file {}: {}", previous, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_upload_path_layout() {
        let storage = MediaStorage::new("/srv/media");
        assert_eq!(
            storage.upload_path("pdf", "Pan Tadeusz"),
            "book/pdf/pan-tadeusz.pdf"
        );
        assert_eq!(
            storage.upload_path("daisy.zip", "Czytanie"),
            "book/daisy.zip/czytanie.daisy.zip"
        );
    }

    #[test]
    fn test_upload_path_fits_limit() {
        let storage = MediaStorage::new("/srv/media");
        let long = "bardzo-dlugi-tytul ".repeat(20);
        let path = storage.upload_path("epub", &long);
        assert!(path.chars().count() <= MAX_PATH_LEN);
        assert!(path.starts_with("book/epub/bardzo-dlugi-tytul"));
        assert!(path.ends_with(".epub"));
    }

    #[test]
    fn test_save_replaces_previous_file() {
        let dir = TempDir::new().unwrap();
        let storage = MediaStorage::new(dir.path());

        storage.save(None, "book/txt/stary.txt", b"stary").unwrap();
        storage
            .save(Some("book/txt/stary.txt"), "book/txt/nowy.txt", b"nowy")
            .unwrap();

        assert!(!storage.exists("book/txt/stary.txt"));
        assert_eq!(
            std::fs::read_to_string(storage.absolute("book/txt/nowy.txt")).unwrap(),
            "nowy"
        );
    }

    #[test]
    fn test_save_same_slot_keeps_file() {
        let dir = TempDir::new().unwrap();
        let storage = MediaStorage::new(dir.path());

        storage.save(None, "book/xml/a.xml", b"1").unwrap();
        storage.save(Some("book/xml/a.xml"), "book/xml/a.xml", b"2").unwrap();

        assert_eq!(std::fs::read(storage.absolute("book/xml/a.xml")).unwrap(), b"2");
    }

    #[test]
    fn test_prepare_creates_directory() {
        let dir = TempDir::new().unwrap();
        let storage = MediaStorage::new(dir.path());

        let target = storage.prepare("book/epub/a.epub").unwrap();
        assert!(target.parent().unwrap().is_dir());
        std::fs::write(&target, b"epub").unwrap();
        assert!(storage.exists("book/epub/a.epub"));
    }

    #[test]
    fn test_rename_and_delete() {
        let dir = TempDir::new().unwrap();
        let storage = MediaStorage::new(dir.path());

        storage.save(None, "book/mp3/a.mp3", b"id3").unwrap();
        storage.rename("book/mp3/a.mp3", "book/mp3/b.mp3").unwrap();
        assert!(storage.exists("book/mp3/b.mp3"));
        assert!(!storage.exists("book/mp3/a.mp3"));

        storage.delete("book/mp3/b.mp3").unwrap();
        storage.delete("book/mp3/b.mp3").unwrap();
        assert!(!storage.exists("book/mp3/b.mp3"));
    }
}
