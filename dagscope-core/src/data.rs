use crate::config::{ExplorerConfig, SettingKey};
use rusqlite::{Connection, OptionalExtension, Result, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

pub struct Database {
    conn: Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
    Superseded,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Superseded => "superseded",
        }
    }

    fn from_db(s: &str) -> Self {
        match s {
            "completed" => SessionStatus::Completed,
            "failed" => SessionStatus::Failed,
            "superseded" => SessionStatus::Superseded,
            _ => SessionStatus::Running,
        }
    }
}

/// Counts recorded when a session finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub utxo_count: usize,
    pub tip_count: usize,
    pub node_count: usize,
    pub edge_count: usize,
    pub failure_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub status: SessionStatus,
    pub script_address: String,
    pub filter_token: String,
    pub level_limit: usize,
    pub stats: SessionStats,
}

fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Database {
    pub fn drop(path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            -- Persisted explorer settings, keyed by their camelCase name
            CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

-- One row per graph materialization
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    start_time INTEGER NOT NULL,
    end_time INTEGER,
    status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'failed', 'superseded')),
    script_address TEXT NOT NULL,
    filter_token TEXT NOT NULL,
    level_limit INTEGER NOT NULL,
    utxo_count INTEGER NOT NULL DEFAULT 0,
    tip_count INTEGER NOT NULL DEFAULT 0,
    node_count INTEGER NOT NULL DEFAULT 0,
    edge_count INTEGER NOT NULL DEFAULT 0,
    failure_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_sessions_start ON sessions(start_time);
            ",
        )?;
        Ok(())
    }

    // Settings
    pub fn get_setting(&self, key: SettingKey) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key.storage_key()],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn set_setting(&self, key: SettingKey, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key.storage_key(), value, current_timestamp()],
        )?;
        Ok(())
    }

    /// Returns whether a stored value was removed.
    pub fn unset_setting(&self, key: SettingKey) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM settings WHERE key = ?1",
            params![key.storage_key()],
        )?;
        Ok(removed > 0)
    }

    pub fn stored_settings(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM settings ORDER BY key")?;

        let settings = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>>>()?;

        Ok(settings)
    }

    /// Stored settings layered over the defaults.
    pub fn load_config(&self) -> crate::Result<ExplorerConfig> {
        Ok(ExplorerConfig::from_pairs(self.stored_settings()?)?)
    }

    /// Validates `value` for `key` before storing it.
    pub fn save_setting(&self, key: SettingKey, value: &str) -> crate::Result<()> {
        let mut config = ExplorerConfig::default();
        config.set(key, value)?;
        self.set_setting(key, &config.get(key))?;
        Ok(())
    }

    // Session management
    pub fn create_session(&self, config: &ExplorerConfig) -> Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let timestamp = current_timestamp();

        self.conn.execute(
            "INSERT INTO sessions (id, start_time, status, script_address, filter_token, level_limit)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &session_id,
                timestamp,
                SessionStatus::Running.as_str(),
                &config.script_address,
                &config.filter_token,
                config.level_limit as i64,
            ],
        )?;

        Ok(session_id)
    }

    pub fn finish_session(
        &self,
        session_id: &str,
        status: SessionStatus,
        stats: &SessionStats,
    ) -> Result<()> {
        let timestamp = current_timestamp();
        self.conn.execute(
            "UPDATE sessions SET status = ?1, end_time = ?2, utxo_count = ?3, tip_count = ?4,
                node_count = ?5, edge_count = ?6, failure_count = ?7
             WHERE id = ?8",
            params![
                status.as_str(),
                timestamp,
                stats.utxo_count as i64,
                stats.tip_count as i64,
                stats.node_count as i64,
                stats.edge_count as i64,
                stats.failure_count as i64,
                session_id,
            ],
        )?;
        Ok(())
    }

    /// Most recent sessions first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, start_time, end_time, status, script_address, filter_token, level_limit,
                    utxo_count, tip_count, node_count, edge_count, failure_count
             FROM sessions ORDER BY start_time DESC, rowid DESC LIMIT ?1",
        )?;

        let sessions = stmt
            .query_map(params![limit as i64], |row| {
                let status: String = row.get(3)?;
                Ok(SessionRecord {
                    id: row.get(0)?,
                    start_time: row.get(1)?,
                    end_time: row.get(2)?,
                    status: SessionStatus::from_db(&status),
                    script_address: row.get(4)?,
                    filter_token: row.get(5)?,
                    level_limit: row.get::<_, i64>(6)? as usize,
                    stats: SessionStats {
                        utxo_count: row.get::<_, i64>(7)? as usize,
                        tip_count: row.get::<_, i64>(8)? as usize,
                        node_count: row.get::<_, i64>(9)? as usize,
                        edge_count: row.get::<_, i64>(10)? as usize,
                        failure_count: row.get::<_, i64>(11)? as usize,
                    },
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(sessions)
    }
}
