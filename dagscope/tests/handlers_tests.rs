use dagscope::handlers::*;
use dagscope_core::config::{ExplorerConfig, SettingKey};
use dagscope_core::data::Database;
use dagscope_core::report::ReportFormat;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_resolve_data_dir_expands_tilde() {
    let resolved = resolve_data_dir("~/.config/dagscope/");
    assert!(!resolved.to_string_lossy().starts_with('~'));
    assert!(resolved.ends_with(".config/dagscope"));

    assert_eq!(resolve_data_dir("/tmp/dagscope"), PathBuf::from("/tmp/dagscope"));
}

#[test]
fn test_database_path() {
    let path = database_path(&PathBuf::from("/data"));
    assert_eq!(path, PathBuf::from("/data").join(DATABASE_FILE));
}

#[test]
fn test_open_database_missing_returns_none() {
    let temp_dir = TempDir::new().unwrap();
    assert!(open_database(temp_dir.path()).unwrap().is_none());
}

#[test]
fn test_load_config_without_database_uses_defaults() {
    let config = load_config(None).unwrap();
    assert_eq!(config, ExplorerConfig::default());
}

#[test]
fn test_load_config_reads_stored_settings() {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&database_path(temp_dir.path())).unwrap();
    db.save_setting(SettingKey::LevelLimit, "7").unwrap();
    drop(db);

    let db = open_database(temp_dir.path()).unwrap().unwrap();
    let config = load_config(Some(&db)).unwrap();
    assert_eq!(config.level_limit, 7);
}

#[test]
fn test_apply_overrides() {
    let overrides = vec![
        (SettingKey::ScriptAddress, "addr_test1".to_string()),
        (SettingKey::FilterToken, "".to_string()),
        (SettingKey::LevelLimit, "3".to_string()),
    ];
    let config = apply_overrides(ExplorerConfig::default(), &overrides).unwrap();

    assert_eq!(config.script_address, "addr_test1");
    assert_eq!(config.filter_token, "");
    assert_eq!(config.level_limit, 3);
    assert_eq!(config.ipfs_gateway, ExplorerConfig::default().ipfs_gateway);
}

#[test]
fn test_apply_overrides_rejects_bad_level() {
    let overrides = vec![(SettingKey::LevelLimit, "many".to_string())];
    assert!(apply_overrides(ExplorerConfig::default(), &overrides).is_err());
}

#[test]
fn test_display_value_masks_token() {
    assert_eq!(
        display_value(SettingKey::BlockfrostToken, "mainnetABCDEF"),
        "main****"
    );
    assert_eq!(display_value(SettingKey::FilterToken, ""), "(empty)");
    assert_eq!(display_value(SettingKey::LevelLimit, "100"), "100");
}

#[test]
fn test_timeout_from_secs() {
    assert_eq!(timeout_from_secs(0), None);
    assert_eq!(timeout_from_secs(5), Some(Duration::from_secs(5)));
}

#[test]
fn test_resolve_format() {
    let html = PathBuf::from("graph.html");
    let json = "json".to_string();

    assert_eq!(resolve_format(None, None), ReportFormat::Text);
    assert_eq!(resolve_format(None, Some(&html)), ReportFormat::Html);
    assert_eq!(resolve_format(Some(&json), Some(&html)), ReportFormat::Json);
    assert_eq!(
        resolve_format(None, Some(&PathBuf::from("graph"))),
        ReportFormat::Text
    );
}
