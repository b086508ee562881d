// FILE: crates/library/src/import.rs

//! Directory importer
//!
//! Imports every `*.xml` source of a directory in file name order. A book
//! whose parts are not imported yet is postponed to the end of the queue;
//! postponing it again without any import in between means the parts will
//! never show up, and the import fails.

use crate::catalogue::Catalogue;
use crate::error::{LibraryError, Result};
use crate::ImportOptions;
use folio_core::{Book, BookFormat};
use log::{debug, info, warn};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Ebook files picked up next to an imported source
const SIDECAR_FORMATS: [BookFormat; 4] = [
    BookFormat::Pdf,
    BookFormat::Epub,
    BookFormat::Mobi,
    BookFormat::Txt,
];

/// Counts of an import run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    /// Arguments that could not be read as directories
    pub invalid_directories: Vec<PathBuf>,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.imported + self.skipped
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Results: {} files imported, {} skipped, {} total.",
            self.imported,
            self.skipped,
            self.total()
        )
    }
}

type Progress = Box<dyn Fn(&Path) + Send + Sync>;

pub struct BookImporter<'a> {
    catalogue: &'a Catalogue,
    options: ImportOptions,
    verbose: bool,
    progress: Option<Progress>,
}

impl<'a> BookImporter<'a> {
    pub fn new(catalogue: &'a Catalogue, options: ImportOptions) -> Self {
        Self {
            catalogue,
            options,
            verbose: true,
            progress: None,
        }
    }

    /// Logs each parsed file when `verbose`
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Called with each file before it is imported
    pub fn with_progress(mut self, progress: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Imports the sources of every directory in turn
    pub async fn import_directories<P: AsRef<Path>>(&self, directories: &[P]) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        for directory in directories {
            let directory = directory.as_ref();
            if !directory.is_dir() {
                warn!("{} is not a directory", directory.display());
                summary.invalid_directories.push(directory.to_path_buf());
                continue;
            }
            self.import_directory(directory, &mut summary).await?;
        }
        info!("{}", summary);
        Ok(summary)
    }

    async fn import_directory(&self, directory: &Path, summary: &mut ImportSummary) -> Result<()> {
        let mut queue: VecDeque<PathBuf> = source_files(directory)?.into();
        let mut postponed: HashMap<PathBuf, usize> = HashMap::new();

        while let Some(path) = queue.pop_front() {
            if let Some(progress) = &self.progress {
                progress(&path);
            }
            if self.verbose {
                info!("Parsing '{}'", path.display());
            }

            match self.catalogue.from_xml_file(&path, &self.options).await {
                Ok(book) => {
                    self.store_sidecars(&book, &path).await?;
                    summary.imported += 1;
                }
                Err(LibraryError::AlreadyExists(slug)) => {
                    warn!("Book {} already exists, skipping {}", slug, path.display());
                    summary.skipped += 1;
                }
                Err(LibraryError::MissingPart(part)) => {
                    let stalled = postponed
                        .get(&path)
                        .is_some_and(|&seen| seen >= summary.imported);
                    if stalled {
                        return Err(LibraryError::MissingPart(part));
                    }
                    debug!("{} waits for part {}, postponing", path.display(), part);
                    postponed.insert(path.clone(), summary.imported);
                    queue.push_back(path);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Stores `<base>.pdf`, `.epub`, `.mobi` and `.txt` found next to the source
    async fn store_sidecars(&self, book: &Book, source: &Path) -> Result<()> {
        for format in SIDECAR_FORMATS {
            let sidecar = source.with_extension(format.extension());
            if sidecar.is_file() {
                let stored = self.catalogue.store_book_file(book, format, &sidecar).await?;
                debug!("Stored {} as {}", sidecar.display(), stored);
            }
        }
        Ok(())
    }
}

/// `*.xml` files directly inside `directory`, sorted by name
fn source_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| LibraryError::ImportFailed(e.to_string()))?;
        let is_xml = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        if entry.file_type().is_file() && is_xml {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
