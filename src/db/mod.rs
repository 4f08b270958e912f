pub mod models;

use crate::session::snapshot::SessionSnapshot;
use models::{SavedSession, SavedSessionInfo};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Stored snapshot is unreadable: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Saved session not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

pub struct Database {
    pub conn: Mutex<Connection>,
}

const INFO_COLUMNS: &str = "id, title, experience, created_at, updated_at";

fn info_from_row(row: &Row<'_>) -> rusqlite::Result<SavedSessionInfo> {
    Ok(SavedSessionInfo {
        id: row.get(0)?,
        title: row.get(1)?,
        experience: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

impl Database {
    pub fn new(app_dir: &std::path::Path) -> Result<Self> {
        std::fs::create_dir_all(app_dir).ok();
        let db_path = app_dir.join("reflect-box.db");
        let conn = Connection::open(&db_path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        tracing::info!(path = %db_path.display(), "database ready");
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS saved_sessions (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                experience TEXT NOT NULL,
                snapshot TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    // ── Saved sessions ──

    pub fn save_session(&self, title: &str, snapshot: &SessionSnapshot) -> Result<SavedSessionInfo> {
        let json = serde_json::to_string(snapshot)?;
        let conn = self.conn.lock().unwrap();
        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO saved_sessions (id, title, experience, snapshot) VALUES (?1, ?2, ?3, ?4)",
            params![id, title, snapshot.experience, json],
        )?;
        let info = conn.query_row(
            &format!("SELECT {INFO_COLUMNS} FROM saved_sessions WHERE id = ?1"),
            params![id],
            info_from_row,
        )?;
        tracing::info!(id = %info.id, "session saved");
        Ok(info)
    }

    /// Overwrites a saved session's snapshot, and its title when given.
    pub fn update_saved_session(
        &self,
        id: &str,
        title: Option<&str>,
        snapshot: &SessionSnapshot,
    ) -> Result<SavedSessionInfo> {
        let json = serde_json::to_string(snapshot)?;
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE saved_sessions
             SET title = COALESCE(?1, title), experience = ?2, snapshot = ?3, updated_at = datetime('now')
             WHERE id = ?4",
            params![title, snapshot.experience, json, id],
        )?;
        if changed == 0 {
            return Err(DbError::NotFound(id.to_string()));
        }
        let info = conn.query_row(
            &format!("SELECT {INFO_COLUMNS} FROM saved_sessions WHERE id = ?1"),
            params![id],
            info_from_row,
        )?;
        Ok(info)
    }

    pub fn list_saved_sessions(&self) -> Result<Vec<SavedSessionInfo>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {INFO_COLUMNS} FROM saved_sessions ORDER BY updated_at DESC, created_at DESC"
        ))?;
        let rows = stmt.query_map([], info_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn load_saved_session(&self, id: &str) -> Result<SavedSession> {
        let conn = self.conn.lock().unwrap();
        let found = conn
            .query_row(
                &format!("SELECT {INFO_COLUMNS}, snapshot FROM saved_sessions WHERE id = ?1"),
                params![id],
                |row| Ok((info_from_row(row)?, row.get::<_, String>(5)?)),
            )
            .optional()?;
        let (info, json) = found.ok_or_else(|| DbError::NotFound(id.to_string()))?;
        let snapshot = serde_json::from_str(&json)?;
        Ok(SavedSession { info, snapshot })
    }

    pub fn delete_saved_session(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute("DELETE FROM saved_sessions WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(DbError::NotFound(id.to_string()));
        }
        tracing::info!(%id, "saved session deleted");
        Ok(())
    }

    // ── Settings ──

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }
}
