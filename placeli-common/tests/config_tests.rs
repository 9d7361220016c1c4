//! Tests for configuration loading and root folder resolution
//!
//! Covers the resolution order (CLI → env → TOML → default) and that a
//! missing or broken config file never stops startup.
//!
//! Note: tests touching PLACELI_ROOT are marked #[serial] so they do not
//! race on the process environment.

use placeli_common::config::{
    get_default_root_folder, load_config, load_config_or_default, load_toml_config, prepare_root_folder,
    resolve_root_folder, TomlConfig, DATABASE_FILE_NAME, ROOT_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_ENV_VAR);

    let root = resolve_root_folder(None, ROOT_ENV_VAR, &TomlConfig::default());
    assert_eq!(root, get_default_root_folder());
    assert!(root.to_string_lossy().contains("placeli"));
}

#[test]
#[serial]
fn test_resolver_priority_order() {
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/placeli-from-toml")),
        ..Default::default()
    };

    env::remove_var(ROOT_ENV_VAR);
    assert_eq!(
        resolve_root_folder(None, ROOT_ENV_VAR, &config),
        PathBuf::from("/tmp/placeli-from-toml")
    );

    env::set_var(ROOT_ENV_VAR, "/tmp/placeli-from-env");
    assert_eq!(
        resolve_root_folder(None, ROOT_ENV_VAR, &config),
        PathBuf::from("/tmp/placeli-from-env")
    );

    assert_eq!(
        resolve_root_folder(Some(Path::new("/tmp/placeli-from-cli")), ROOT_ENV_VAR, &config),
        PathBuf::from("/tmp/placeli-from-cli")
    );

    env::remove_var(ROOT_ENV_VAR);
}

#[test]
fn test_toml_config_full() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/data/places"

[logging]
level = "debug"

[import]
system_field_prefixes = ["google_", "yelp_"]
system_field_names = ["imported_from"]
enrichment_delay_ms = 250
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/data/places")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.import.enrichment_delay().as_millis(), 250);

    let rules = config.import.system_field_rules();
    assert!(rules.is_system("yelp_rating"));
    assert!(rules.is_system("imported_from"));
    assert!(!rules.is_system("osm_amenity"));
    assert!(!rules.is_system("import_date"));
}

#[test]
fn test_toml_config_defaults_when_sections_missing() {
    let config: TomlConfig = toml::from_str("").unwrap();
    assert!(config.root_folder.is_none());
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.import.enrichment_delay_ms, 100);
    let rules = config.import.system_field_rules();
    assert!(rules.is_system("google_maps_url"));
    assert!(rules.is_system("osm_cuisine"));
    assert!(rules.is_system("last_sync"));
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = load_config_or_default(Some(&temp_dir.path().join("absent.toml")));
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_invalid_config_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "this is [ not toml").unwrap();

    assert!(load_toml_config(&path).is_err());
    let config = load_config_or_default(Some(&path));
    assert!(config.root_folder.is_none());
}

#[test]
fn test_config_problems_are_reported_to_caller() {
    let temp_dir = TempDir::new().unwrap();

    let absent = temp_dir.path().join("absent.toml");
    let loaded = load_config(Some(&absent));
    let warning = loaded.warning.unwrap();
    assert!(warning.contains("not found"));
    assert!(warning.contains("absent.toml"));

    let broken = temp_dir.path().join("broken.toml");
    std::fs::write(&broken, "level = [").unwrap();
    let loaded = load_config(Some(&broken));
    assert!(loaded.warning.unwrap().contains("broken.toml"));
    assert_eq!(loaded.config.logging.level, "info");

    let good = temp_dir.path().join("good.toml");
    std::fs::write(&good, "[logging]\nlevel = \"debug\"\n").unwrap();
    let loaded = load_config(Some(&good));
    assert!(loaded.warning.is_none());
    assert_eq!(loaded.config.logging.level, "debug");
}

#[test]
fn test_prepare_root_folder_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("a").join("b");

    let db_path = prepare_root_folder(&root).unwrap();
    assert!(root.is_dir());
    assert_eq!(db_path, root.join(DATABASE_FILE_NAME));
}
