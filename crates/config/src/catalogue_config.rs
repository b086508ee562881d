//! Catalogue configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Where cached tag and theme counters are kept
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local map, lost on restart
    #[default]
    Memory,
    /// `cache_entries` table in the catalogue database
    Database,
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheBackend::Memory => write!(f, "memory"),
            CacheBackend::Database => write!(f, "database"),
        }
    }
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "database" | "db" => Ok(CacheBackend::Database),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

/// Catalogue-wide settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogueConfig {
    /// Counter cache backend
    pub cache_backend: CacheBackend,

    /// Directories scanned by `folio import` when no path is given
    pub import_directories: Vec<PathBuf>,
}

impl ConfigSection for CatalogueConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let results = self
            .import_directories
            .iter()
            .enumerate()
            .map(|(i, dir)| {
                Validator::not_empty(
                    &dir.to_string_lossy(),
                    &format!("catalogue.import_directories[{}]", i),
                )
            })
            .collect();

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.cache_backend = other.cache_backend;
        if !other.import_directories.is_empty() {
            self.import_directories = other.import_directories;
        }
    }

    fn section_name(&self) -> &'static str {
        "catalogue"
    }
}
