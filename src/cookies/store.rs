//! Remote store infrastructure.
//!
//! A **remote store** is the durable side of the persistent jar: a key/value document
//! store holding one [`PartitionDocument`] per [`PartitionKey`].
//! - The [`PersistentCookieJar`](crate::cookies::PersistentCookieJar) reads a
//!   partition on an in-memory miss and writes the full partition after every change.
//! - Stores never see individual cookies being added or removed; every `save`
//!   **replaces** the whole document. The last writer wins.
//!
//! This module exports three implementations:
//! - [`InMemoryRemoteStore`]: process-local map (tests, ephemeral setups).
//! - [`SqliteRemoteStore`]: SQLite database behind an `r2d2` pool.
//! - [`HttpDocumentStore`]: network document store addressed by project and collection.
//!
//! ## Design notes
//! - Implementations must be `Send + Sync` and safe for concurrent use; the jar calls
//!   them from whichever thread issued the cookie request.
//! - Stores own their connection resources (pools, HTTP clients) and any timeout
//!   policy. The jar adds none.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use persistent_cookie_jar::cookies::{InMemoryRemoteStore, PartitionDocument, RemoteStore};
//!
//! let store = Arc::new(InMemoryRemoteStore::new());
//! store.save("example.com", &PartitionDocument::new()).unwrap();
//! assert!(store.load("example.com").unwrap().is_empty());
//! assert!(store.load("other.com").unwrap_err().is_not_found());
//! ```
mod http;
mod in_memory;
mod sqlite;

use crate::cookies::PartitionDocument;
use crate::errors::PersistenceError;

/// Network document store (one document per partition).
pub use http::HttpDocumentStore;
/// Process-local store.
pub use in_memory::InMemoryRemoteStore;
/// SQLite-backed store (one table for all partitions).
pub use sqlite::SqliteRemoteStore;

/// A remote store loads and saves whole partition documents.
///
/// Implementations must be `Send + Sync` and safe for concurrent use.
pub trait RemoteStore: Send + Sync {
    /// Loads the document for partition `key`.
    ///
    /// ### Errors
    /// - [`PersistenceError::NotFound`] when no document exists for `key`.
    /// - [`PersistenceError::StoreUnavailable`] on transport, auth or storage failure.
    fn load(&self, key: &str) -> Result<PartitionDocument, PersistenceError>;

    /// Replaces the document for partition `key` with `document`.
    ///
    /// Overwrite is unconditional; there is no version check.
    ///
    /// ### Errors
    /// - [`PersistenceError::StoreUnavailable`] on transport, auth or storage failure.
    fn save(&self, key: &str, document: &PartitionDocument) -> Result<(), PersistenceError>;

    /// Short description used in log lines (never includes credentials).
    fn describe(&self) -> String;
}
