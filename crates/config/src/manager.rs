//! Configuration manager - main API for config operations

use crate::persistence::ConfigPersistence;
use crate::{Config, ConfigError, ConfigResult};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::str::FromStr;

/// Prefix of every environment override
const ENV_PREFIX: &str = "FOLIO_";

/// Main configuration manager
pub struct ConfigManager {
    persistence: ConfigPersistence,
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a new config manager using the default config directory
    ///
    /// - Linux: `~/.config/folio/`
    /// - macOS: `~/Library/Application Support/folio/`
    /// - Windows: `%APPDATA%\folio\`
    pub fn new() -> ConfigResult<Self> {
        let config_dir = Self::default_config_dir()?;
        Self::with_directory(config_dir)
    }

    /// Creates a config manager with a custom config directory
    pub fn with_directory(config_dir: PathBuf) -> ConfigResult<Self> {
        let config_path = config_dir.join("config.toml");
        let persistence = ConfigPersistence::new(config_path);

        Ok(Self {
            persistence,
            config_dir,
        })
    }

    fn default_config_dir() -> ConfigResult<PathBuf> {
        ProjectDirs::from("", "", "folio")
            .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
            .ok_or_else(|| ConfigError::NoConfigDir("the user has no home directory".to_string()))
    }

    /// Returns the config directory path
    pub fn config_dir(&self) -> &PathBuf {
        &self.config_dir
    }

    /// Returns the full config file path
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Resolves a configured path against the config directory
    ///
    /// Absolute paths are returned as-is.
    pub fn resolve_path(&self, path: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    /// Loads the configuration from file
    pub fn load(&self) -> ConfigResult<Config> {
        self.persistence.load()
    }

    /// Loads the configuration, falling back to defaults on any error
    pub fn load_or_default(&self) -> Config {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config: {}, using defaults", e);
                Config::default()
            }
        }
    }

    /// Saves the configuration to file
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.persistence.save(config)
    }

    /// Loads the current config, applies `update_fn` and saves the result
    ///
    /// ```rust,no_run
    /// # use folio_config::ConfigManager;
    /// # let manager = ConfigManager::new().unwrap();
    /// manager.update(|config| {
    ///     config.build.eager = true;
    /// }).expect("Failed to update config");
    /// ```
    pub fn update<F>(&self, update_fn: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.load()?;
        update_fn(&mut config);
        self.save(&config)
    }

    /// Writes a default config file if one doesn't exist
    ///
    /// Returns Ok(true) if a new file was created.
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.config_path().exists() {
            log::info!(
                "Config file already exists at {}",
                self.config_path().display()
            );
            return Ok(false);
        }

        self.persistence.save(&Config::default())?;
        log::info!("Generated default config at {}", self.config_path().display());
        Ok(true)
    }

    /// Resets the configuration to defaults
    pub fn reset(&self) -> ConfigResult<()> {
        self.save(&Config::default())
    }

    /// Validates the current configuration file
    pub fn validate(&self) -> ConfigResult<Vec<String>> {
        let config = self.load()?;

        match config.validate() {
            Ok(()) => Ok(Vec::new()),
            Err(errors) => Ok(errors.iter().map(|e| e.to_string()).collect()),
        }
    }

    /// Loads the config and applies `FOLIO_<SECTION>_<FIELD>` variables
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;
        apply_overrides(&mut config, |name| std::env::var(name).ok())?;

        if let Err(errors) = config.validate() {
            log::warn!(
                "Config validation warnings after env overrides: {:?}",
                errors
            );
        }

        Ok(config)
    }
}

/// Applies overrides looked up by variable name
///
/// Returns the number of variables applied. A value that does not parse for
/// its field fails with `BadOverride`.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> ConfigResult<usize>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = 0;
    let mut var = |suffix: &str| {
        let name = format!("{}{}", ENV_PREFIX, suffix);
        let value = lookup(&name);
        if value.is_some() {
            applied += 1;
            log::debug!("Config override from {}", name);
        }
        value.map(|v| (name, v))
    };

    if let Some((_, v)) = var("APP_DATABASE_PATH") {
        config.app.database_path = PathBuf::from(v);
    }
    if let Some((_, v)) = var("APP_MEDIA_ROOT") {
        config.app.media_root = PathBuf::from(v);
    }
    if let Some((name, v)) = var("APP_LOG_LEVEL") {
        config.app.log_level = parse(&name, &v)?;
    }
    if let Some((_, v)) = var("APP_DEFAULT_LANGUAGE") {
        config.app.default_language = v;
    }

    let build = &mut config.build;
    for (suffix, field) in [
        ("BUILD_PDF", &mut build.build_pdf),
        ("BUILD_EPUB", &mut build.build_epub),
        ("BUILD_MOBI", &mut build.build_mobi),
        ("BUILD_TXT", &mut build.build_txt),
        ("BUILD_SEARCH_INDEX", &mut build.search_index),
        ("BUILD_EAGER", &mut build.eager),
    ] {
        if let Some((name, v)) = var(suffix) {
            *field = parse_flag(&name, &v)?;
        }
    }
    if let Some((name, v)) = var("BUILD_MAX_CONCURRENT_BUILDS") {
        build.max_concurrent_builds = parse(&name, &v)?;
    }
    for (suffix, field) in [
        ("BUILD_CONVERTER_PDF", &mut build.converters.pdf),
        ("BUILD_CONVERTER_EPUB", &mut build.converters.epub),
        ("BUILD_CONVERTER_MOBI", &mut build.converters.mobi),
        ("BUILD_CONVERTER_COVER", &mut build.converters.cover),
    ] {
        if let Some((_, v)) = var(suffix) {
            *field = v;
        }
    }

    if let Some((name, v)) = var("CATALOGUE_CACHE_BACKEND") {
        config.catalogue.cache_backend = parse(&name, &v)?;
    }
    if let Some((_, v)) = var("CATALOGUE_IMPORT_DIRECTORIES") {
        config.catalogue.import_directories = std::env::split_paths(&v).collect();
    }

    Ok(applied)
}

fn parse<T: FromStr>(name: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::BadOverride {
            variable: name.to_string(),
            value: value.to_string(),
        })
}

fn parse_flag(name: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::BadOverride {
            variable: name.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheBackend, LogLevel};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn setup_test_manager() -> (TempDir, ConfigManager) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf())
            .expect("Failed to create manager");
        (temp_dir, manager)
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_load_or_default_with_missing_file() {
        let (_temp_dir, manager) = setup_test_manager();
        assert_eq!(manager.load_or_default(), Config::default());
    }

    #[test]
    fn test_update() {
        let (_temp_dir, manager) = setup_test_manager();
        manager.save(&Config::default()).expect("Should save");

        manager
            .update(|config| config.build.max_concurrent_builds = 4)
            .expect("Should update");

        let loaded = manager.load().expect("Should load");
        assert_eq!(loaded.build.max_concurrent_builds, 4);
    }

    #[test]
    fn test_initialize_creates_file_once() {
        let (_temp_dir, manager) = setup_test_manager();

        assert!(manager.initialize().expect("Should initialize"));
        assert!(manager.config_path().exists());
        assert!(!manager.initialize().expect("Should initialize"));
    }

    #[test]
    fn test_reset() {
        let (_temp_dir, manager) = setup_test_manager();

        let mut config = Config::default();
        config.build.eager = true;
        manager.save(&config).expect("Should save");
        manager.reset().expect("Should reset");

        assert_eq!(manager.load().expect("Should load"), Config::default());
    }

    #[test]
    fn test_invalid_config_not_saved() {
        let (_temp_dir, manager) = setup_test_manager();

        let mut config = Config::default();
        config.build.converters.pdf = "xelatex".to_string();
        manager
            .save(&config)
            .expect_err("Should not save invalid config");
    }

    #[test]
    fn test_resolve_path() {
        let (temp_dir, manager) = setup_test_manager();
        assert_eq!(
            manager.resolve_path(std::path::Path::new("folio.db")),
            temp_dir.path().join("folio.db")
        );
        let absolute = temp_dir.path().join("elsewhere.db");
        assert_eq!(manager.resolve_path(&absolute), absolute);
    }

    #[test]
    fn test_apply_overrides() {
        let vars = env(&[
            ("FOLIO_APP_LOG_LEVEL", "debug"),
            ("FOLIO_BUILD_EAGER", "yes"),
            ("FOLIO_BUILD_PDF", "0"),
            ("FOLIO_BUILD_MAX_CONCURRENT_BUILDS", "8"),
            ("FOLIO_BUILD_CONVERTER_EPUB", "ebook-convert {input} {output}"),
            ("FOLIO_CATALOGUE_CACHE_BACKEND", "database"),
        ]);

        let mut config = Config::default();
        let applied =
            apply_overrides(&mut config, |name| vars.get(name).cloned()).expect("Should apply");

        assert_eq!(applied, 6);
        assert_eq!(config.app.log_level, LogLevel::Debug);
        assert!(config.build.eager);
        assert!(!config.build.build_pdf);
        assert_eq!(config.build.max_concurrent_builds, 8);
        assert_eq!(config.build.converters.epub, "ebook-convert {input} {output}");
        assert_eq!(config.catalogue.cache_backend, CacheBackend::Database);
    }

    #[test]
    fn test_bad_override_is_reported() {
        let vars = env(&[("FOLIO_BUILD_EAGER", "maybe")]);
        let mut config = Config::default();

        let err = apply_overrides(&mut config, |name| vars.get(name).cloned()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::BadOverride { ref variable, .. } if variable == "FOLIO_BUILD_EAGER"
        ));
    }

    #[test]
    fn test_no_overrides_leaves_config_untouched() {
        let mut config = Config::default();
        let applied = apply_overrides(&mut config, |_| None).expect("Should apply");
        assert_eq!(applied, 0);
        assert_eq!(config, Config::default());
    }
}
