/// Session store for per-device client state.
/// Persists the dock's open/active selection, a stable device identifier,
/// and last-seen timestamps per counterpart. All of it is advisory cache,
/// never server-authoritative.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::{ClientError, Result};

const DOCK_STATE_KEY: &str = "chatDock";
const DEVICE_ID_KEY: &str = "deviceId";

/// Persisted dock selection, restored on the next session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DockSession {
    pub open: bool,
    pub active_conversation_id: Option<String>,
    pub active_target_id: Option<String>,
    pub active_target_name: String,
}

pub struct SessionStore {
    db: Arc<Mutex<Connection>>,
}

impl SessionStore {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        let db = Connection::open(&db_path)
            .map_err(|e| ClientError::StorageError(format!("Failed to open database: {}", e)))?;

        let store = SessionStore {
            db: Arc::new(Mutex::new(db)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().map_err(|e| {
            ClientError::StorageError(format!("Failed to create in-memory DB: {}", e))
        })?;

        let store = SessionStore {
            db: Arc::new(Mutex::new(db)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let db = self.lock()?;
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS session_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS last_seen (
                user_id TEXT PRIMARY KEY,
                seen_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| ClientError::StorageError(format!("Failed to create schema: {}", e)))?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| ClientError::StorageError("Failed to lock database".to_string()))
    }

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        let db = self.lock()?;
        let mut stmt = db
            .prepare("SELECT value FROM session_state WHERE key = ?")
            .map_err(|e| ClientError::StorageError(format!("Failed to prepare statement: {}", e)))?;
        stmt.query_row(params![key], |row| row.get::<_, String>(0))
            .optional()
            .map_err(|e| ClientError::StorageError(format!("Failed to query state: {}", e)))
    }

    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let db = self.lock()?;
        db.execute(
            "INSERT OR REPLACE INTO session_state (key, value) VALUES (?, ?)",
            params![key, value],
        )
        .map_err(|e| ClientError::StorageError(format!("Failed to save state: {}", e)))?;
        Ok(())
    }

    // Dock selection

    pub fn save_dock_state(&self, state: &DockSession) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.set_value(DOCK_STATE_KEY, &json)
    }

    pub fn load_dock_state(&self) -> Result<Option<DockSession>> {
        match self.get_value(DOCK_STATE_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json).ok()),
            None => Ok(None),
        }
    }

    pub fn clear_dock_state(&self) -> Result<()> {
        let db = self.lock()?;
        db.execute(
            "DELETE FROM session_state WHERE key = ?",
            params![DOCK_STATE_KEY],
        )
        .map_err(|e| ClientError::StorageError(format!("Failed to clear state: {}", e)))?;
        Ok(())
    }

    // Device identity

    /// Stable per-device identifier, created on first access.
    pub fn device_id(&self) -> Result<String> {
        if let Some(id) = self.get_value(DEVICE_ID_KEY)? {
            return Ok(id);
        }
        let id = Uuid::new_v4().to_string();
        self.set_value(DEVICE_ID_KEY, &id)?;
        Ok(id)
    }

    // Last-seen timestamps (cross-device unread coordination, advisory)

    pub fn set_last_seen(&self, user_id: &str, seen_at: DateTime<Utc>) -> Result<()> {
        let db = self.lock()?;
        db.execute(
            "INSERT OR REPLACE INTO last_seen (user_id, seen_at) VALUES (?, ?)",
            params![user_id, seen_at.to_rfc3339()],
        )
        .map_err(|e| ClientError::StorageError(format!("Failed to save last-seen: {}", e)))?;
        Ok(())
    }

    pub fn last_seen(&self, user_id: &str) -> Result<Option<DateTime<Utc>>> {
        let db = self.lock()?;
        let mut stmt = db
            .prepare("SELECT seen_at FROM last_seen WHERE user_id = ?")
            .map_err(|e| ClientError::StorageError(format!("Failed to prepare statement: {}", e)))?;
        let value = stmt
            .query_row(params![user_id], |row| row.get::<_, String>(0))
            .optional()
            .map_err(|e| ClientError::StorageError(format!("Failed to query last-seen: {}", e)))?;

        Ok(value.and_then(|raw| {
            chrono::DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_store_creation() {
        assert!(SessionStore::in_memory().is_ok());
    }

    #[test]
    fn test_dock_state_roundtrip() -> Result<()> {
        let store = SessionStore::in_memory()?;
        assert!(store.load_dock_state()?.is_none());

        let state = DockSession {
            open: true,
            active_conversation_id: Some("c1".to_string()),
            active_target_id: Some("u2".to_string()),
            active_target_name: "Ada Lovelace".to_string(),
        };
        store.save_dock_state(&state)?;

        let loaded = store.load_dock_state()?.unwrap();
        assert_eq!(loaded, state);

        store.clear_dock_state()?;
        assert!(store.load_dock_state()?.is_none());
        Ok(())
    }

    #[test]
    fn test_device_id_is_stable() -> Result<()> {
        let store = SessionStore::in_memory()?;
        let first = store.device_id()?;
        let second = store.device_id()?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_last_seen_roundtrip() -> Result<()> {
        let store = SessionStore::in_memory()?;
        assert!(store.last_seen("u2")?.is_none());

        let seen = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        store.set_last_seen("u2", seen)?;
        assert_eq!(store.last_seen("u2")?, Some(seen));
        Ok(())
    }

    #[test]
    fn test_on_disk_store_persists() -> Result<()> {
        let dir = tempfile::tempdir().map_err(ClientError::IoError)?;
        let path = dir.path().join("session.db");

        let first = SessionStore::new(path.clone())?;
        let device_id = first.device_id()?;
        drop(first);

        let second = SessionStore::new(path)?;
        assert_eq!(second.device_id()?, device_id);
        Ok(())
    }
}
