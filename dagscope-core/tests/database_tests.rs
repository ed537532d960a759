// Tests for settings and session persistence

use dagscope_core::config::{ExplorerConfig, SettingKey};
use dagscope_core::data::{Database, SessionStats, SessionStatus};
use dagscope_core::CoreError;
use tempfile::TempDir;

fn create_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).unwrap();
    (temp_dir, db)
}

// ============================================================================
// Database Creation Tests
// ============================================================================

#[test]
fn test_database_creation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let db = Database::new(&db_path);
    assert!(db.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_database_drop() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    assert!(!Database::exists(&db_path));
    let db = Database::new(&db_path).unwrap();
    drop(db);
    assert!(Database::exists(&db_path));

    Database::drop(&db_path).unwrap();
    assert!(!Database::exists(&db_path));
}

#[test]
fn test_reopen_keeps_settings() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    {
        let db = Database::new(&db_path).unwrap();
        db.set_setting(SettingKey::BlockfrostToken, "mainnet123").unwrap();
    }

    let db = Database::new(&db_path).unwrap();
    assert_eq!(
        db.get_setting(SettingKey::BlockfrostToken).unwrap(),
        Some("mainnet123".to_string())
    );
}

// ============================================================================
// Settings Tests
// ============================================================================

#[test]
fn test_unset_setting_is_absent() {
    let (_temp, db) = create_test_db();
    assert_eq!(db.get_setting(SettingKey::ScriptAddress).unwrap(), None);
    assert!(!db.unset_setting(SettingKey::ScriptAddress).unwrap());
}

#[test]
fn test_set_overwrites_previous_value() {
    let (_temp, db) = create_test_db();
    db.set_setting(SettingKey::IpfsGateway, "https://a/").unwrap();
    db.set_setting(SettingKey::IpfsGateway, "https://b/").unwrap();

    assert_eq!(
        db.get_setting(SettingKey::IpfsGateway).unwrap(),
        Some("https://b/".to_string())
    );
    assert_eq!(db.stored_settings().unwrap().len(), 1);
}

#[test]
fn test_settings_stored_under_camel_case_keys() {
    let (_temp, db) = create_test_db();
    db.set_setting(SettingKey::LevelLimit, "4").unwrap();

    let stored = db.stored_settings().unwrap();
    assert_eq!(stored, vec![("levelLimit".to_string(), "4".to_string())]);
}

#[test]
fn test_load_config_layers_over_defaults() {
    let (_temp, db) = create_test_db();
    db.set_setting(SettingKey::FilterToken, "").unwrap();
    db.set_setting(SettingKey::BlockfrostToken, "tok").unwrap();

    let config = db.load_config().unwrap();
    assert_eq!(config.filter_token, "");
    assert_eq!(config.blockfrost_token, "tok");
    assert_eq!(config.ipfs_gateway, ExplorerConfig::default().ipfs_gateway);
}

#[test]
fn test_unset_restores_default() {
    let (_temp, db) = create_test_db();
    db.set_setting(SettingKey::LevelLimit, "2").unwrap();
    assert!(db.unset_setting(SettingKey::LevelLimit).unwrap());

    assert_eq!(db.load_config().unwrap().level_limit, 100);
}

#[test]
fn test_save_setting_rejects_invalid_level_limit() {
    let (_temp, db) = create_test_db();
    let err = db.save_setting(SettingKey::LevelLimit, "deep").unwrap_err();
    assert!(matches!(err, CoreError::Config(_)));
    assert_eq!(db.get_setting(SettingKey::LevelLimit).unwrap(), None);

    db.save_setting(SettingKey::LevelLimit, " 12 ").unwrap();
    assert_eq!(
        db.get_setting(SettingKey::LevelLimit).unwrap(),
        Some("12".to_string())
    );
}

// ============================================================================
// Session Tests
// ============================================================================

#[test]
fn test_create_session() {
    let (_temp, db) = create_test_db();
    let session_id = db.create_session(&ExplorerConfig::default()).unwrap();
    assert!(!session_id.is_empty());

    let sessions = db.recent_sessions(10).unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, session_id);
    assert_eq!(sessions[0].status, SessionStatus::Running);
    assert_eq!(sessions[0].end_time, None);
    assert_eq!(sessions[0].level_limit, 100);
}

#[test]
fn test_finish_session_records_stats() {
    let (_temp, db) = create_test_db();
    let session_id = db.create_session(&ExplorerConfig::default()).unwrap();

    let stats = SessionStats {
        utxo_count: 3,
        tip_count: 1,
        node_count: 5,
        edge_count: 4,
        failure_count: 0,
    };
    db.finish_session(&session_id, SessionStatus::Completed, &stats)
        .unwrap();

    let record = &db.recent_sessions(1).unwrap()[0];
    assert_eq!(record.status, SessionStatus::Completed);
    assert_eq!(record.stats, stats);
    assert!(record.end_time.is_some());
}

#[test]
fn test_failed_session_keeps_failure_count() {
    let (_temp, db) = create_test_db();
    let session_id = db.create_session(&ExplorerConfig::default()).unwrap();
    let stats = SessionStats {
        failure_count: 1,
        ..Default::default()
    };
    db.finish_session(&session_id, SessionStatus::Failed, &stats)
        .unwrap();

    let record = &db.recent_sessions(1).unwrap()[0];
    assert_eq!(record.status, SessionStatus::Failed);
    assert!(record.end_time.is_some());
    assert_eq!(record.stats.failure_count, 1);
}

#[test]
fn test_recent_sessions_newest_first_and_limited() {
    let (_temp, db) = create_test_db();
    let first = db.create_session(&ExplorerConfig::default()).unwrap();
    let second = db.create_session(&ExplorerConfig::default()).unwrap();
    let third = db.create_session(&ExplorerConfig::default()).unwrap();

    let sessions = db.recent_sessions(2).unwrap();
    let ids: Vec<_> = sessions.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec![third.as_str(), second.as_str()]);
    assert!(!ids.contains(&first.as_str()));
}
