//! Folio Configuration System
//!
//! Layered configuration for the catalogue: defaults, then the TOML file,
//! then `FOLIO_*` environment variables. Each section implements
//! `ConfigSection` and validates itself.
//!
//! # Example
//!
//! ```rust
//! use folio_config::{Config, ConfigManager};
//!
//! let dir = tempfile::TempDir::new().expect("temp dir");
//! let manager = ConfigManager::with_directory(dir.path().to_path_buf()).expect("manager");
//! let config = manager.load().unwrap_or_else(|e| {
//!     eprintln!("Config error: {}, using defaults", e);
//!     Config::default()
//! });
//!
//! println!("Database: {}", config.app.database_path.display());
//! ```

mod error;
mod manager;
mod persistence;
mod validation;

// Config sections
pub mod app_config;
pub mod build_config;
pub mod catalogue_config;

pub use error::{ConfigError, ConfigResult, FileAction, ValidationError};
pub use manager::{apply_overrides, ConfigManager};
pub use validation::{ConfigSection, Validator};

pub use app_config::{AppConfig, LogLevel};
pub use build_config::{BuildConfig, ConverterCommands};
pub use catalogue_config::{CacheBackend, CatalogueConfig};

use serde::{Deserialize, Serialize};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    /// Application-level settings
    pub app: AppConfig,

    /// Derived file builds
    pub build: BuildConfig,

    /// Catalogue behaviour
    pub catalogue: CatalogueConfig,
}

impl Config {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the entire configuration
    ///
    /// Returns all validation errors found across all sections.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(mut e) = self.app.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.build.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.catalogue.validate() {
            errors.append(&mut e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merges this config with another, preferring values from `other`
    pub fn merge(&mut self, other: Config) {
        self.app.merge(other.app);
        self.build.merge(other.build);
        self.catalogue.merge(other.catalogue);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            app: AppConfig::default(),
            build: BuildConfig::default(),
            catalogue: CatalogueConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_version_is_set() {
        let config = Config::default();
        assert_eq!(config.version, CONFIG_VERSION);
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        let mut override_config = Config::default();
        override_config.build.eager = true;
        override_config.catalogue.cache_backend = CacheBackend::Database;

        base.merge(override_config);
        assert!(base.build.eager);
        assert_eq!(base.catalogue.cache_backend, CacheBackend::Database);
    }

    #[test]
    fn test_errors_collected_across_sections() {
        let mut config = Config::default();
        config.app.default_language = String::new();
        config.build.max_concurrent_builds = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
