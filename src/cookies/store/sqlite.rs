//! SQLite-backed remote store.
//!
//! `SqliteRemoteStore` keeps **all partitions** of a collection in a single SQLite
//! database. Each row holds one whole [`PartitionDocument`] serialized as JSON, so a
//! save is a single upsert and a load a single lookup.
//!
//! ## Design
//! - One **table** (`cookie_partitions`) for all collections; primary key is
//!   `(collection, key)`.
//! - Database access is via an `r2d2` pool for safe multi-threaded use.
//! - Every connection is initialised with WAL mode and a busy timeout.
//!
//! ## Example
//! ```no_run
//! use persistent_cookie_jar::cookies::SqliteRemoteStore;
//!
//! let store = SqliteRemoteStore::new("cookies.db", "default").unwrap();
//! ```

use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::rusqlite::{params, OptionalExtension};
use r2d2_sqlite::SqliteConnectionManager;

use crate::cookies::store::RemoteStore;
use crate::cookies::PartitionDocument;
use crate::errors::PersistenceError;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS cookie_partitions (
    collection TEXT NOT NULL,
    key TEXT NOT NULL,
    document TEXT NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s','now')),
    PRIMARY KEY (collection, key)
);";

/// A SQLite-based remote store.
pub struct SqliteRemoteStore {
    /// Connection pool for SQLite database (so it can run multithreaded)
    pool: Pool<SqliteConnectionManager>,
    /// Collection the documents belong to
    collection: String,
    /// Human-readable location for log lines
    location: String,
}

impl SqliteRemoteStore {
    /// Opens (or creates) a SQLite database at `path` and ensures the schema exists.
    pub fn new(path: impl AsRef<Path>, collection: impl Into<String>) -> Result<Self, PersistenceError> {
        let location = path.as_ref().display().to_string();
        let manager = SqliteConnectionManager::file(path).with_init(|c| {
            c.busy_timeout(Duration::from_millis(500))?;
            c.pragma_update(None, "journal_mode", "WAL")?;
            Ok(())
        });
        let builder = Pool::builder().max_size(8);
        Self::with_manager(builder, manager, collection.into(), location)
    }

    /// Opens a private in-memory database (one connection, so all calls see the same data).
    pub fn open_in_memory(collection: impl Into<String>) -> Result<Self, PersistenceError> {
        let manager = SqliteConnectionManager::memory();
        // Recycling the connection would drop the database
        let builder = Pool::builder().max_size(1).idle_timeout(None).max_lifetime(None);
        Self::with_manager(builder, manager, collection.into(), ":memory:".to_string())
    }

    fn with_manager(
        builder: r2d2::Builder<SqliteConnectionManager>,
        manager: SqliteConnectionManager,
        collection: String,
        location: String,
    ) -> Result<Self, PersistenceError> {
        if collection.is_empty() {
            return Err(PersistenceError::Config("collection name must not be empty".to_string()));
        }

        let pool = builder.connection_timeout(Duration::from_secs(5)).build(manager)?;

        pool.get()?.execute_batch(SCHEMA)?;

        Ok(Self {
            pool,
            collection,
            location,
        })
    }

    /// Borrows a pooled SQLite connection.
    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, PersistenceError> {
        Ok(self.pool.get()?)
    }

    /// Number of partitions stored for this collection.
    pub fn partition_count(&self) -> Result<usize, PersistenceError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cookie_partitions WHERE collection = ?1",
            params![self.collection],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

impl RemoteStore for SqliteRemoteStore {
    fn load(&self, key: &str) -> Result<PartitionDocument, PersistenceError> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT document FROM cookie_partitions WHERE collection = ?1 AND key = ?2",
                params![self.collection, key],
                |row| row.get(0),
            )
            .optional()?;

        let raw = raw.ok_or_else(|| PersistenceError::NotFound(key.to_string()))?;

        // A row we cannot read back is a storage fault, not a missing partition.
        serde_json::from_str(&raw).map_err(|e| {
            PersistenceError::StoreUnavailable(format!("corrupt document for {key}: {e}"))
        })
    }

    fn save(&self, key: &str, document: &PartitionDocument) -> Result<(), PersistenceError> {
        let raw = serde_json::to_string(document)
            .map_err(|e| PersistenceError::StoreUnavailable(format!("cannot encode document for {key}: {e}")))?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO cookie_partitions (collection, key, document) VALUES (?1, ?2, ?3)
             ON CONFLICT(collection, key) DO UPDATE
             SET document = excluded.document, updated_at = strftime('%s','now')",
            params![self.collection, key, raw],
        )?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite store {} (collection {})", self.location, self.collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::Cookie;

    fn doc(values: &[(&str, &str)]) -> PartitionDocument {
        values
            .iter()
            .map(|(n, v)| {
                let mut c = Cookie::new(*n, *v);
                c.domain = "example.com".into();
                c.path = "/".into();
                (c.id(), c)
            })
            .collect()
    }

    #[test]
    fn round_trips_through_a_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.db");

        {
            let store = SqliteRemoteStore::new(&path, "jar").unwrap();
            store.save("example.com", &doc(&[("a", "1"), ("b", "2")])).unwrap();
        }

        // Reopen to make sure the data hit the disk
        let store = SqliteRemoteStore::new(&path, "jar").unwrap();
        let got = store.load("example.com").unwrap();
        assert_eq!(got, doc(&[("a", "1"), ("b", "2")]));
        assert_eq!(store.partition_count().unwrap(), 1);
    }

    #[test]
    fn save_overwrites_and_missing_is_not_found() {
        let store = SqliteRemoteStore::open_in_memory("jar").unwrap();
        assert!(store.load("example.com").unwrap_err().is_not_found());

        store.save("example.com", &doc(&[("a", "1")])).unwrap();
        store.save("example.com", &doc(&[("c", "3")])).unwrap();
        assert_eq!(store.load("example.com").unwrap(), doc(&[("c", "3")]));
    }

    #[test]
    fn collections_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let a = SqliteRemoteStore::new(&path, "team-a").unwrap();
        let b = SqliteRemoteStore::new(&path, "team-b").unwrap();

        a.save("example.com", &doc(&[("a", "1")])).unwrap();
        assert!(b.load("example.com").unwrap_err().is_not_found());
        assert_eq!(b.partition_count().unwrap(), 0);
    }

    #[test]
    fn empty_collection_is_rejected() {
        assert!(matches!(
            SqliteRemoteStore::open_in_memory(""),
            Err(PersistenceError::Config(_))
        ));
    }
}
