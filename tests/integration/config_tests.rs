use diskprint::config::{Config, ConfigError, SettingsOverrides, SETTINGS_FILE};
use diskprint::filter::FilterSet;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_load_home_without_settings_file() {
    let dir = tempdir().unwrap();

    let config = Config::load(Some(dir.path()), &SettingsOverrides::default()).unwrap();

    assert_eq!(config.home, dir.path());
    assert_eq!(config.settings.chunk_size, 10 * 1024 * 1024);
    assert_eq!(
        config.filter_path(),
        dir.path().join("configs").join("filter.conf")
    );
}

#[test]
fn test_settings_file_under_configs() {
    let dir = tempdir().unwrap();
    let configs = dir.path().join("configs");
    fs::create_dir_all(&configs).unwrap();
    fs::write(
        configs.join(SETTINGS_FILE),
        "chunk_size = 65536\nfilter_file = \"rules/photos.conf\"\n",
    )
    .unwrap();

    let config = Config::load(Some(dir.path()), &SettingsOverrides::default()).unwrap();

    assert_eq!(config.settings.chunk_size_bytes(), 65536);
    assert_eq!(config.filter_path(), configs.join("rules").join("photos.conf"));
}

#[test]
fn test_command_line_overrides_settings_file() {
    let dir = tempdir().unwrap();
    let configs = dir.path().join("configs");
    fs::create_dir_all(&configs).unwrap();
    fs::write(configs.join(SETTINGS_FILE), "chunk_size = 65536\n").unwrap();

    let overrides = SettingsOverrides {
        chunk_size: Some(1024),
        filter_file: Some(PathBuf::from("other.conf")),
    };
    let config = Config::load(Some(dir.path()), &overrides).unwrap();

    assert_eq!(config.settings.chunk_size, 1024);
    assert_eq!(config.filter_path(), configs.join("other.conf"));
}

#[test]
fn test_absolute_filter_file_is_used_as_is() {
    let dir = tempdir().unwrap();
    let rules = dir.path().join("elsewhere.conf");
    fs::write(&rules, "+.*\n").unwrap();

    let overrides = SettingsOverrides {
        chunk_size: None,
        filter_file: Some(rules.clone()),
    };
    let config = Config::load(Some(dir.path()), &overrides).unwrap();

    assert_eq!(config.filter_path(), rules);
    assert_eq!(FilterSet::load(&config.filter_path()).unwrap().len(), 1);
}

#[test]
fn test_zero_chunk_size_override_is_rejected() {
    let dir = tempdir().unwrap();
    let overrides = SettingsOverrides {
        chunk_size: Some(0),
        filter_file: None,
    };

    let err = Config::load(Some(dir.path()), &overrides).unwrap_err();

    assert!(matches!(err, ConfigError::Invalid { key: "chunk_size", .. }));
}

#[test]
fn test_missing_home_is_fatal() {
    let err = Config::load(None, &SettingsOverrides::default()).unwrap_err();

    assert!(err.to_string().contains("DISKPRINT_HOME"));
}
