//! Reading and writing `config.toml`
//!
//! The file is replaced through a temporary file in the same directory, and
//! the previous version is kept next to it as `config.toml.backup`.

use crate::error::FileAction;
use crate::{Config, ConfigError, ConfigResult, CONFIG_VERSION};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Comment block written above the serialized settings
const HEADER: &str = "\
# Folio catalogue configuration
#
# Converter commands under [build.converters] are split on whitespace, with
# {input} replaced by the source file and {output} by the file to produce.
# An empty command leaves that format unbuilt.

";

/// Owns the location of one config file
pub struct ConfigPersistence {
    config_path: PathBuf,
}

impl ConfigPersistence {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Loads the file, or defaults when it does not exist yet
    ///
    /// A blank file is an error. Files written by an older version are
    /// rewritten with the current version number.
    pub fn load(&self) -> ConfigResult<Config> {
        let contents = match fs::read_to_string(&self.config_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "No config at {}, using defaults",
                    self.config_path.display()
                );
                return Ok(Config::default());
            }
            Err(source) => return Err(ConfigError::io(FileAction::Read, &self.config_path, source)),
        };

        if contents.trim().is_empty() {
            return Err(ConfigError::Blank(self.config_path.clone()));
        }

        let mut config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: self.config_path.clone(),
            source,
        })?;

        if config.version < CONFIG_VERSION {
            log::info!(
                "Rewriting config version {} as {}",
                config.version,
                CONFIG_VERSION
            );
            config.version = CONFIG_VERSION;
            self.save(&config)?;
        }

        if let Err(errors) = config.validate() {
            log::warn!("{}", ConfigError::Invalid(errors));
        }
        Ok(config)
    }

    /// Validates and writes the config, keeping a backup of the old file
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        config.validate().map_err(ConfigError::Invalid)?;

        let dir = match self.config_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => {
                return Err(ConfigError::NoConfigDir(format!(
                    "{} has no parent directory",
                    self.config_path.display()
                )))
            }
        };
        create_dir(dir)?;

        if self.config_path.is_file() {
            fs::copy(&self.config_path, self.backup_path())
                .map_err(|source| ConfigError::io(FileAction::Backup, self.backup_path(), source))?;
        }

        let body = toml::to_string_pretty(config)?;
        self.replace(dir, &format!("{}{}", HEADER, body))?;

        log::info!("Config saved to {}", self.config_path.display());
        Ok(())
    }

    /// Path of the copy kept before each overwrite
    pub fn backup_path(&self) -> PathBuf {
        self.config_path.with_extension("toml.backup")
    }

    fn replace(&self, dir: &Path, content: &str) -> ConfigResult<()> {
        let write_error = |source| ConfigError::io(FileAction::Write, &self.config_path, source);
        let mut temp = NamedTempFile::new_in(dir).map_err(write_error)?;
        temp.write_all(content.as_bytes()).map_err(write_error)?;
        temp.flush().map_err(write_error)?;
        temp.persist(&self.config_path)
            .map_err(|e| write_error(e.error))?;
        Ok(())
    }
}

fn create_dir(dir: &Path) -> ConfigResult<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|source| ConfigError::io(FileAction::CreateDir, dir, source))?;
    log::info!("Created config directory {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheBackend;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ConfigPersistence) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let persistence = ConfigPersistence::new(dir.path().join("config.toml"));
        (dir, persistence)
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let (_dir, persistence) = setup();
        assert_eq!(persistence.load().unwrap(), Config::default());
    }

    #[test]
    fn test_saved_file_has_header_and_values() {
        let (dir, persistence) = setup();

        let mut config = Config::default();
        config.catalogue.cache_backend = CacheBackend::Database;
        config.build.converters.epub = "ebook-convert {input} {output}".to_string();
        persistence.save(&config).unwrap();

        let on_disk = fs::read_to_string(dir.path().join("config.toml")).unwrap();
        assert!(on_disk.starts_with("# Folio catalogue configuration"));

        let loaded = persistence.load().unwrap();
        assert_eq!(loaded.catalogue.cache_backend, CacheBackend::Database);
        assert_eq!(loaded.build.converters.epub, "ebook-convert {input} {output}");
    }

    #[test]
    fn test_save_creates_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        ConfigPersistence::new(path.clone()).save(&Config::default()).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn test_backup_keeps_previous_contents() {
        let (_dir, persistence) = setup();

        let mut config = Config::default();
        config.build.eager = true;
        persistence.save(&config).unwrap();
        config.build.eager = false;
        persistence.save(&config).unwrap();

        let backup = fs::read_to_string(persistence.backup_path()).unwrap();
        assert!(backup.contains("eager = true"));
    }

    #[test]
    fn test_broken_toml_is_a_parse_error() {
        let (dir, persistence) = setup();
        fs::write(dir.path().join("config.toml"), "[build\neager = ").unwrap();

        assert!(matches!(persistence.load(), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_blank_file_is_rejected() {
        let (dir, persistence) = setup();
        fs::write(dir.path().join("config.toml"), "  \n").unwrap();

        assert!(matches!(persistence.load(), Err(ConfigError::Blank(_))));
    }

    #[test]
    fn test_invalid_values_are_not_saved() {
        let (_dir, persistence) = setup();

        let mut config = Config::default();
        config.build.max_concurrent_builds = 0;
        assert!(matches!(
            persistence.save(&config),
            Err(ConfigError::Invalid(ref errors)) if errors[0].field == "build.max_concurrent_builds"
        ));
    }

    #[test]
    fn test_old_version_is_rewritten() {
        let (dir, persistence) = setup();
        let path = dir.path().join("config.toml");
        fs::write(&path, "version = 0\n[build]\neager = true\n").unwrap();

        let config = persistence.load().unwrap();
        assert_eq!(config.version, CONFIG_VERSION);
        assert!(config.build.eager);
        assert!(fs::read_to_string(&path).unwrap().contains("version = 1"));
    }
}
