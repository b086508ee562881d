//! Integration tests for the configuration system

use folio_config::{
    apply_overrides, BuildConfig, CacheBackend, Config, ConfigError, ConfigManager,
    ConfigSection, CONFIG_VERSION,
};
use std::path::PathBuf;
use tempfile::TempDir;

fn setup_test_manager() -> Result<(TempDir, ConfigManager), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf())?;
    Ok((temp_dir, manager))
}

#[test]
fn test_full_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    assert!(manager.initialize()?);

    let config = manager.load()?;
    assert_eq!(config.version, CONFIG_VERSION);

    let mut modified = config.clone();
    modified.build.eager = true;
    modified.catalogue.cache_backend = CacheBackend::Database;
    modified.catalogue.import_directories = vec![PathBuf::from("/srv/books")];
    manager.save(&modified)?;

    let reloaded = manager.load()?;
    assert_eq!(reloaded, modified);

    manager.reset()?;
    assert_eq!(manager.load()?, Config::default());

    Ok(())
}

#[test]
fn test_config_validation_integration() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    manager.save(&Config::default())?;
    assert!(manager.validate()?.is_empty());

    let mut invalid = Config::default();
    invalid.build.converters.mobi = "kindlegen".to_string();
    assert!(matches!(
        manager.save(&invalid),
        Err(ConfigError::Invalid(_))
    ));

    Ok(())
}

#[test]
fn test_hand_written_file_with_invalid_values_still_loads() -> Result<(), Box<dyn std::error::Error>>
{
    let (_temp_dir, manager) = setup_test_manager()?;
    std::fs::write(
        manager.config_path(),
        "version = 1\n[build]\nmax_concurrent_builds = 0\n",
    )?;

    let config = manager.load()?;
    assert_eq!(config.build.max_concurrent_builds, 0);
    assert_eq!(manager.validate()?.len(), 1);

    Ok(())
}

#[test]
fn test_unknown_sections_are_ignored() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    std::fs::write(
        manager.config_path(),
        "[catalogue]\ncache_backend = \"database\"\n\n[feeds]\nenabled = true\n",
    )?;

    let config = manager.load()?;
    assert_eq!(config.catalogue.cache_backend, CacheBackend::Database);
    assert_eq!(config.build, BuildConfig::default());

    Ok(())
}

#[test]
fn test_overrides_applied_on_top_of_file() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    manager.update(|config| config.build.build_mobi = false)?;

    let mut config = manager.load()?;
    apply_overrides(&mut config, |name| match name {
        "FOLIO_APP_MEDIA_ROOT" => Some("/var/lib/folio/media".to_string()),
        _ => None,
    })?;

    assert!(!config.build.build_mobi);
    assert_eq!(config.app.media_root, PathBuf::from("/var/lib/folio/media"));
    assert!(config.build.validate().is_ok());

    Ok(())
}
