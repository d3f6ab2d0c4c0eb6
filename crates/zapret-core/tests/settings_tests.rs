//! Integration tests for settings

use std::path::PathBuf;
use zapret_core::preset::PresetStore;
use zapret_core::strategy::{SortKey, SortOrder};
use zapret_core::{LaunchMode, Settings};

#[test]
fn test_partial_file_keeps_defaults() {
    let settings = Settings::from_toml(
        r#"
[paths]
work_dir = "C:/zapret"
presets_dir = "my-presets"

[support]
token = "abc"
"#,
    )
    .unwrap();

    assert_eq!(settings.paths.presets_dir(), PathBuf::from("C:/zapret").join("my-presets"));
    assert_eq!(settings.support.token.as_deref(), Some("abc"));
    assert_eq!(settings.support.timeout_secs, 30);
    assert_eq!(settings.general.launch_mode, LaunchMode::Direct);
    assert_eq!(settings.strategies.sort_key, SortKey::Name);
    assert_eq!(settings.strategies.sort_order, SortOrder::Ascending);
    assert!(settings.validate().is_ok());
}

#[test]
fn test_settings_drive_preset_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.paths.work_dir = dir.path().to_path_buf();

    let store = PresetStore::new(settings.paths.presets_dir(), settings.paths.active_preset_file());
    assert_eq!(store.dir(), dir.path().join("presets"));
    assert_eq!(store.mirror_path(), dir.path().join("preset-active.txt"));
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn test_generated_file_validates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    Settings::default().save(&path).unwrap();

    let loaded = Settings::load(&path).unwrap();
    loaded.validate().unwrap();
    assert_eq!(loaded, Settings::default());
}
