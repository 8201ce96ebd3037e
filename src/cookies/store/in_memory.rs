use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::cookies::store::RemoteStore;
use crate::cookies::PartitionDocument;
use crate::errors::PersistenceError;

/// Process-local remote store. Documents live as long as the store does.
///
/// The store can be taken offline with [`set_available`](Self::set_available), after
/// which every call fails with [`PersistenceError::StoreUnavailable`]. Useful to
/// exercise the jar's degradation paths.
pub struct InMemoryRemoteStore {
    /// Documents per partition key
    documents: RwLock<HashMap<String, PartitionDocument>>,
    available: AtomicBool,
    saves: AtomicUsize,
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            saves: AtomicUsize::new(0),
        }
    }

    /// Creates a store pre-seeded with `documents`.
    pub fn with_documents<I>(documents: I) -> Self
    where
        I: IntoIterator<Item = (String, PartitionDocument)>,
    {
        let store = Self::new();
        store
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(documents);
        store
    }

    /// Switches the store on or off.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of successful saves since creation.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Returns a copy of the stored document for `key` without going through
    /// the availability switch.
    pub fn document(&self, key: &str) -> Option<PartitionDocument> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Sorted list of stored partition keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort_unstable();
        keys
    }

    fn check_available(&self) -> Result<(), PersistenceError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PersistenceError::StoreUnavailable("in-memory store is offline".to_string()))
        }
    }
}

impl RemoteStore for InMemoryRemoteStore {
    fn load(&self, key: &str) -> Result<PartitionDocument, PersistenceError> {
        self.check_available()?;
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound(key.to_string()))
    }

    fn save(&self, key: &str, document: &PartitionDocument) -> Result<(), PersistenceError> {
        self.check_available()?;
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), document.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory store".to_string()
    }
}
