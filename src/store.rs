//! Local key-value persistence
//!
//! Stands in for the embedded surface's origin-scoped storage. One string
//! table, fixed keys, last write wins: concurrent widget instances racing
//! on the same store is an accepted race, same as concurrent browser tabs.

use rusqlite::{params, Connection};

use crate::error::WidgetResult;
use crate::paths::get_store_path;

pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    /// Opens the store at the default on-disk location, creating the table
    /// if needed.
    pub fn open_default() -> WidgetResult<Self> {
        let db_path = get_store_path()?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&db_path)?;
        Self::init(conn)
    }

    /// Opens an in-memory store. Used by tests and throwaway embeddings.
    pub fn open_in_memory() -> WidgetResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> WidgetResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(LocalStore { conn })
    }

    /// Reads a value, or `None` when the key was never set.
    pub fn get(&self, key: &str) -> WidgetResult<Option<String>> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Writes a value, replacing any previous one.
    pub fn set(&self, key: &str, value: &str) -> WidgetResult<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Deletes a key. Deleting an absent key is a no-op.
    pub fn remove(&self, key: &str) -> WidgetResult<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}
