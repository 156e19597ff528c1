//! Durable resource alias store.
//!
//! Users refer to external resources ("the revenue sheet") by friendly names;
//! tools need provider IDs. [`AliasStore`] maps names to IDs and persists the
//! mapping in sqlite so aliases survive restarts.
//!
//! The store is an owned value, not a global. Share it with `Arc` where
//! multiple tools need access.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Result type alias using the store error type.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error type for alias store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No alias registered under the given name.
    #[error("no alias named '{0}'")]
    AliasNotFound(String),

    /// Underlying database failure.
    #[error("storage error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// A saved alias entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    /// The friendly name.
    pub name: String,
    /// The provider resource ID it resolves to.
    pub id: String,
    /// When the alias was last written.
    pub updated_at: DateTime<Utc>,
}

/// Durable name → resource-ID mapping backed by sqlite.
///
/// All operations take `&self`; the connection sits behind a mutex so the
/// store is `Send + Sync` and safe to share across tool tasks. Writes are
/// upserts: the last writer wins.
pub struct AliasStore {
    conn: Mutex<Connection>,
}

impl AliasStore {
    /// Open (or create) an alias store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory store. Contents are lost on drop.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS aliases (
                name       TEXT PRIMARY KEY,
                id         TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Save an alias. Overwrites any existing alias with the same name.
    pub fn save(&self, name: &str, id: &str) -> Result<()> {
        let now = Utc::now();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO aliases (name, id, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET id = excluded.id, updated_at = excluded.updated_at",
            params![name, id, now.to_rfc3339()],
        )?;
        tracing::debug!(alias = name, "Saved alias");
        Ok(())
    }

    /// Resolve an alias to its resource ID.
    ///
    /// Unknown names are an error rather than passed through; echoing the
    /// input back would hide typos from the user.
    pub fn resolve(&self, name: &str) -> Result<String> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id FROM aliases WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| StoreError::AliasNotFound(name.to_string()))
    }

    /// List all aliases, sorted by name.
    pub fn list(&self) -> Result<Vec<Alias>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT name, id, updated_at FROM aliases ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| {
            let updated_at: String = row.get(2)?;
            Ok(Alias {
                name: row.get(0)?,
                id: row.get(1)?,
                updated_at: DateTime::parse_from_rfc3339(&updated_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    /// Remove an alias. Removing a name that does not exist is an error.
    pub fn remove(&self, name: &str) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM aliases WHERE name = ?1", params![name])?;
        if changed == 0 {
            return Err(StoreError::AliasNotFound(name.to_string()));
        }
        tracing::debug!(alias = name, "Removed alias");
        Ok(())
    }

    /// Number of stored aliases.
    pub fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM aliases", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Whether the store has no aliases.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_save_and_resolve() {
        let store = AliasStore::in_memory().unwrap();
        store.save("revenue_sheet", "sheet-abc123").unwrap();

        assert_eq!(store.resolve("revenue_sheet").unwrap(), "sheet-abc123");
    }

    #[test]
    fn test_resolve_unknown_is_error() {
        let store = AliasStore::in_memory().unwrap();
        let err = store.resolve("nope").unwrap_err();
        assert!(matches!(err, StoreError::AliasNotFound(name) if name == "nope"));
    }

    #[test]
    fn test_save_is_upsert_last_write_wins() {
        let store = AliasStore::in_memory().unwrap();
        store.save("report", "id-1").unwrap();
        store.save("report", "id-2").unwrap();

        assert_eq!(store.resolve("report").unwrap(), "id-2");
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_list_sorted_by_name() {
        let store = AliasStore::in_memory().unwrap();
        store.save("zeta", "z").unwrap();
        store.save("alpha", "a").unwrap();
        store.save("mid", "m").unwrap();

        let names: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_remove() {
        let store = AliasStore::in_memory().unwrap();
        store.save("gone", "id").unwrap();
        store.remove("gone").unwrap();

        assert!(store.is_empty().unwrap());
        assert!(matches!(
            store.remove("gone"),
            Err(StoreError::AliasNotFound(_))
        ));
    }

    #[test]
    fn test_durability_across_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("aliases.db");

        {
            let store = AliasStore::open(&path).unwrap();
            store.save("kept", "id-kept").unwrap();
        }

        let store = AliasStore::open(&path).unwrap();
        assert_eq!(store.resolve("kept").unwrap(), "id-kept");
    }

    #[test]
    fn test_concurrent_saves_never_corrupt() {
        let store = Arc::new(AliasStore::in_memory().unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        store.save("contended", &format!("id-{}-{}", i, j)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Some write won; the store holds exactly one well-formed entry.
        let id = store.resolve("contended").unwrap();
        assert!(id.starts_with("id-"));
        assert_eq!(store.len().unwrap(), 1);
    }
}
