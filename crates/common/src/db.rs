//! SQLite database for Courseware state persistence

use crate::{Error, JsonMap, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Database wrapper for state persistence
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Expose the underlying connection for subsystems that manage their own
    /// tables within the shared database (sessions, identities).
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }
}

impl Database {
    /// Open or create database at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path.as_ref())?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        info!("Opened database at {:?}", path.as_ref());
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            -- Editor-managed items, one row per (kind, id)
            CREATE TABLE IF NOT EXISTS entities (
                kind TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                generation INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (kind, id)
            );
            CREATE INDEX IF NOT EXISTS idx_entities_kind ON entities(kind);

            -- Key-value store for misc state
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    // ========================================================================
    // Entity operations
    // ========================================================================

    /// Insert or overwrite an entity. Overwrites bump the generation.
    pub fn put_entity(&self, kind: &str, id: &str, data: &JsonMap) -> Result<()> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "INSERT INTO entities (kind, id, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(kind, id) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at,
                generation = generation + 1",
            params![kind, id, serde_json::to_string(data)?, now],
        )?;

        debug!("Stored {} with id {}", kind, id);
        Ok(())
    }

    /// Get an entity by kind and ID
    pub fn get_entity(&self, kind: &str, id: &str) -> Result<Option<EntityRow>> {
        let conn = self.conn.lock();

        let row = conn
            .query_row(
                "SELECT kind, id, data, created_at, updated_at, generation
                 FROM entities WHERE kind = ?1 AND id = ?2",
                params![kind, id],
                RawRow::from_row,
            )
            .optional()?;

        row.map(RawRow::parse).transpose()
    }

    /// List all entities of a kind, oldest first
    pub fn list_entities(&self, kind: &str) -> Result<Vec<EntityRow>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT kind, id, data, created_at, updated_at, generation
             FROM entities WHERE kind = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt.query_map(params![kind], RawRow::from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?.parse()?);
        }

        Ok(results)
    }

    /// Delete an entity
    pub fn delete_entity(&self, kind: &str, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "DELETE FROM entities WHERE kind = ?1 AND id = ?2",
            params![kind, id],
        )?;

        if rows > 0 {
            debug!("Deleted {} with id {}", kind, id);
        }

        Ok(rows > 0)
    }

    // ========================================================================
    // Key-value store
    // ========================================================================

    /// Set a key-value pair
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, now],
        )?;

        Ok(())
    }

    /// Get a value by key
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();

        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value)
    }
}

/// Raw database row before parsing
struct RawRow {
    kind: String,
    id: String,
    data: String,
    created_at: i64,
    updated_at: i64,
    generation: i64,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            kind: row.get(0)?,
            id: row.get(1)?,
            data: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
            generation: row.get(5)?,
        })
    }

    fn parse(self) -> Result<EntityRow> {
        let data = match serde_json::from_str(&self.data)? {
            serde_json::Value::Object(map) => map,
            _ => {
                return Err(Error::CorruptEntity {
                    kind: self.kind,
                    id: self.id,
                })
            }
        };
        Ok(EntityRow {
            kind: self.kind,
            id: self.id,
            data,
            created_at: self.created_at,
            updated_at: self.updated_at,
            generation: self.generation,
        })
    }
}

/// Parsed entity row
#[derive(Debug, Clone)]
pub struct EntityRow {
    pub kind: String,
    pub id: String,
    pub data: JsonMap,
    pub created_at: i64,
    pub updated_at: i64,
    pub generation: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(title: &str) -> JsonMap {
        let mut map = JsonMap::new();
        map.insert("title".to_string(), json!(title));
        map
    }

    #[test]
    fn test_crud() {
        let db = Database::open_memory().unwrap();

        // Insert
        db.put_entity("announcement", "a1", &data("first")).unwrap();

        // Get
        let row = db.get_entity("announcement", "a1").unwrap().unwrap();
        assert_eq!(row.data["title"], "first");
        assert_eq!(row.generation, 1);

        // Overwrite bumps the generation
        db.put_entity("announcement", "a1", &data("second")).unwrap();
        let row = db.get_entity("announcement", "a1").unwrap().unwrap();
        assert_eq!(row.data["title"], "second");
        assert_eq!(row.generation, 2);

        // List
        let rows = db.list_entities("announcement").unwrap();
        assert_eq!(rows.len(), 1);

        // Delete
        assert!(db.delete_entity("announcement", "a1").unwrap());
        assert!(db.get_entity("announcement", "a1").unwrap().is_none());
        assert!(!db.delete_entity("announcement", "a1").unwrap());
    }

    #[test]
    fn test_kinds_are_isolated() {
        let db = Database::open_memory().unwrap();
        db.put_entity("questions", "k", &data("q")).unwrap();

        assert!(db.get_entity("question_groups", "k").unwrap().is_none());
        assert!(db.list_entities("question_groups").unwrap().is_empty());
    }

    #[test]
    fn test_kv_store() {
        let db = Database::open_memory().unwrap();
        assert_eq!(db.kv_get("secret").unwrap(), None);
        db.kv_set("secret", "abc").unwrap();
        assert_eq!(db.kv_get("secret").unwrap().as_deref(), Some("abc"));
        db.kv_set("secret", "def").unwrap();
        assert_eq!(db.kv_get("secret").unwrap().as_deref(), Some("def"));
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");
        let db = Database::open(&path).unwrap();
        db.put_entity("announcement", "a1", &data("x")).unwrap();
        drop(db);

        let db = Database::open(&path).unwrap();
        let row = db.get_entity("announcement", "a1").unwrap().unwrap();
        assert_eq!(row.data["title"], "x");
    }
}
