//! A cookie jar that persists partitions to a remote store.
//!
//! [`PersistentCookieJar`] wraps an in-memory [`CookieJar`] and a [`RemoteStore`]:
//! - **Reads** are served from memory. On an empty result the URL's partition is
//!   loaded from the store, merged into memory and matched again (cache-aside).
//! - **Writes** go to memory first; then the partition's *full* entry map is saved to
//!   the store (write-through).
//!
//! Persistence is best-effort. Store failures are logged and absorbed, so the jar
//! behaves exactly like its in-memory jar when the store is unreachable; losing a
//! remote write only costs cookies on the next cold start.
//!
//! Calls block on the caller's thread for at most one store round trip. The jar lock
//! is never held across a round trip.
//!
//! ```rust
//! use std::sync::Arc;
//! use persistent_cookie_jar::cookies::{Cookie, InMemoryRemoteStore, NaiveSuffixList};
//! use persistent_cookie_jar::cookies::{PersistentCookieJar, PersistentJarOptions};
//!
//! let store = Arc::new(InMemoryRemoteStore::new());
//! let jar = PersistentCookieJar::new(PersistentJarOptions {
//!     public_suffix_list: Arc::new(NaiveSuffixList),
//!     store: store.clone(),
//! });
//!
//! let url = "https://www.example.com/".parse().unwrap();
//! jar.set_cookies(&url, &[Cookie::new("sid", "abc")]);
//! assert_eq!(jar.cookies(&url).len(), 1);
//! assert_eq!(store.document("example.com").unwrap().len(), 1);
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLockReadGuard, RwLockWriteGuard};

use reqwest::header::HeaderValue;
use time::OffsetDateTime;
use url::Url;

use crate::config::StoreConfig;
use crate::cookies::cookie_jar::{parse_set_cookie, DefaultCookieJar};
use crate::cookies::legacy;
use crate::cookies::partition::{canonical_host, derive_key, derive_key_from_domain, PublicSuffixList};
use crate::cookies::{Cookie, CookieJar, CookieJarHandle, PartitionDocument, PartitionKey, RemoteStoreHandle};
use crate::errors::PersistenceError;

/// Construction parameters for a [`PersistentCookieJar`].
#[derive(Clone)]
pub struct PersistentJarOptions {
    /// Suffix classification used to compute partition keys.
    pub public_suffix_list: Arc<dyn PublicSuffixList>,
    /// Durable store for partition documents.
    pub store: RemoteStoreHandle,
}

/// Outcome of a bulk [`PersistentCookieJar::save`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushReport {
    /// Partitions written successfully.
    pub saved: usize,
    /// Partitions whose save failed.
    pub failed: Vec<PartitionKey>,
}

impl FlushReport {
    /// True when every partition was saved.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A cache-aside cookie jar backed by a remote store.
pub struct PersistentCookieJar {
    psl: Arc<dyn PublicSuffixList>,
    /// Inner cookie jar that holds the actual cookie state.
    pub inner: CookieJarHandle,
    /// Handle to the store responsible for persistence.
    store_handle: RemoteStoreHandle,
}

impl PersistentCookieJar {
    /// Creates a persistent jar over a fresh, empty [`DefaultCookieJar`].
    pub fn new(options: PersistentJarOptions) -> Self {
        let jar = DefaultCookieJar::new(options.public_suffix_list.clone()).into_handle();
        Self::with_jar(options, jar)
    }

    /// Wraps an existing jar. The jar must partition with the same suffix list.
    pub fn with_jar(options: PersistentJarOptions, jar: CookieJarHandle) -> Self {
        log::debug!("persistent cookie jar using {}", options.store.describe());
        Self {
            psl: options.public_suffix_list,
            inner: jar,
            store_handle: options.store,
        }
    }

    /// Builds the store and suffix list described by `config`.
    pub fn from_config(config: &StoreConfig) -> Result<Self, PersistenceError> {
        Ok(Self::new(PersistentJarOptions {
            public_suffix_list: config.public_suffix_list(),
            store: config.build_store()?,
        }))
    }

    /// Wraps the jar into a shareable [`CookieJarHandle`].
    pub fn into_handle(self) -> CookieJarHandle {
        Arc::new(std::sync::RwLock::new(self))
    }

    /// Partition key for `url`.
    pub fn partition_key(&self, url: &Url) -> Result<PartitionKey, PersistenceError> {
        derive_key(url, self.psl.as_ref())
    }

    fn read_jar(&self) -> RwLockReadGuard<'_, dyn CookieJar + Send + Sync + 'static> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_jar(&self) -> RwLockWriteGuard<'_, dyn CookieJar + Send + Sync + 'static> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cookies for `url`, loading its partition from the store on a miss.
    ///
    /// Never fails: an unreachable store or a missing partition yields an empty list.
    pub fn cookies(&self, url: &Url) -> Vec<Cookie> {
        self.cookies_at(url, OffsetDateTime::now_utc())
    }

    /// [`cookies`](Self::cookies) evaluated at `now`.
    pub fn cookies_at(&self, url: &Url, now: OffsetDateTime) -> Vec<Cookie> {
        let cookies = self.read_jar().cookies(url, now);
        log::debug!("cookies: found {} in memory for {}", cookies.len(), url);
        if !cookies.is_empty() {
            return cookies;
        }

        match self.load_from_storage(url, now) {
            Ok(cookies) => {
                log::debug!("cookies: found {} in persistent storage for {}", cookies.len(), url);
                cookies
            }
            Err(PersistenceError::NotFound(key)) => {
                log::debug!("cookies: no stored partition {key}");
                Vec::new()
            }
            Err(e @ PersistenceError::InvalidHost(_)) => {
                log::debug!("cookies: no partition for {url}: {e}");
                Vec::new()
            }
            Err(e) => {
                log::warn!("failed to load cookies from {}, ignoring: {e}", self.store_handle.describe());
                Vec::new()
            }
        }
    }

    fn load_from_storage(&self, url: &Url, now: OffsetDateTime) -> Result<Vec<Cookie>, PersistenceError> {
        let key = self.partition_key(url)?;
        let document = self.store_handle.load(&key)?;

        let mut jar = self.write_jar();
        let added = jar.backfill(&key, document);
        let expired = jar.remove_expired(now);
        log::debug!("backfilled {added} cookies into partition {key}, dropped {expired} expired");
        Ok(jar.cookies(url, now))
    }

    /// Stores `cookies` received from `url`, then writes the partition to the store.
    ///
    /// Never fails: the in-memory update always happens; store failures are logged.
    pub fn set_cookies(&self, url: &Url, cookies: &[Cookie]) {
        self.set_cookies_at(url, cookies, OffsetDateTime::now_utc());
    }

    /// [`set_cookies`](Self::set_cookies) evaluated at `now`.
    pub fn set_cookies_at(&self, url: &Url, cookies: &[Cookie], now: OffsetDateTime) {
        log::debug!("set_cookies: {} cookies for {}", cookies.len(), url);

        self.write_jar().set_cookies(url, cookies, now);

        if let Err(e) = self.save_to_storage(url) {
            log::warn!("failed to save cookies to {}, ignoring: {e}", self.store_handle.describe());
        }
    }

    fn save_to_storage(&self, url: &Url) -> Result<(), PersistenceError> {
        let key = self.partition_key(url)?;
        // An absent partition is written as an empty document
        let document = self.read_jar().partition(&key).unwrap_or_default();
        log::debug!("saving partition {key} ({} entries)", document.len());
        self.store_handle.save(&key, &document)
    }

    /// Imports cookies from a legacy JSON file into memory.
    ///
    /// A missing file is not an error. Records with an empty or invalid domain are
    /// skipped; for records sharing an identity the last one in the file wins.
    /// Nothing is written to the store; call [`save`](Self::save) for that.
    ///
    /// ### Errors
    /// - [`PersistenceError::Decode`] when the file is not valid JSON.
    /// - [`PersistenceError::Io`] when the file exists but cannot be read.
    pub fn load_from_file(&self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("cookie file {} does not exist, skipping import", path.display());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let records = legacy::decode(&contents)?;
        let total = records.len();
        let mut imported = 0;

        let mut jar = self.write_jar();
        for mut record in records {
            if record.domain.trim().is_empty() {
                log::debug!("skipping legacy cookie {:?} without a domain", record.name);
                continue;
            }

            let keyed = canonical_host(record.domain.trim().trim_start_matches('.'))
                .and_then(|domain| Ok((derive_key_from_domain(&domain, self.psl.as_ref())?, domain)));
            match keyed {
                Ok((key, domain)) => {
                    record.domain = domain;
                    jar.merge_entry(&key, record);
                    imported += 1;
                }
                Err(e) => log::warn!("skipping legacy cookie {:?}: {e}", record.name),
            }
        }

        log::info!("imported {imported} of {total} cookies from {}", path.display());
        Ok(())
    }

    /// Saves every partition held in memory to the store, changed or not.
    ///
    /// Expired entries are dropped first. Partitions are saved independently; one
    /// failure does not stop the rest.
    pub fn save(&self) -> FlushReport {
        self.save_at(OffsetDateTime::now_utc())
    }

    /// [`save`](Self::save) evaluated at `now`.
    pub fn save_at(&self, now: OffsetDateTime) -> FlushReport {
        let partitions = {
            let mut jar = self.write_jar();
            jar.remove_expired(now);
            jar.partitions()
        };
        let mut report = FlushReport::default();

        for (key, document) in partitions {
            match self.store_handle.save(&key, &document) {
                Ok(()) => report.saved += 1,
                Err(e) => {
                    log::warn!("failed to save partition {key}: {e}");
                    report.failed.push(key);
                }
            }
        }

        log::info!(
            "saved {} partitions to {} ({} failed)",
            report.saved,
            self.store_handle.describe(),
            report.failed.len()
        );
        report
    }
}

impl CookieJar for PersistentCookieJar {
    /// Stores cookies, then persists the partition.
    fn set_cookies(&mut self, url: &Url, cookies: &[Cookie], now: OffsetDateTime) {
        self.set_cookies_at(url, cookies, now);
    }

    /// Returns cookies, reading through to the store on a miss.
    fn cookies(&self, url: &Url, now: OffsetDateTime) -> Vec<Cookie> {
        self.cookies_at(url, now)
    }

    fn partition(&self, key: &str) -> Option<PartitionDocument> {
        self.read_jar().partition(key)
    }

    fn partitions(&self) -> Vec<(PartitionKey, PartitionDocument)> {
        self.read_jar().partitions()
    }

    fn merge_entry(&mut self, key: &str, cookie: Cookie) {
        self.write_jar().merge_entry(key, cookie);
    }

    fn backfill(&mut self, key: &str, document: PartitionDocument) -> usize {
        self.write_jar().backfill(key, document)
    }

    fn remove_expired(&mut self, now: OffsetDateTime) -> usize {
        self.write_jar().remove_expired(now)
    }

    /// Clears memory only; stored documents are left alone.
    fn clear(&mut self) {
        self.write_jar().clear();
    }
}

/// Lets the jar serve as a `reqwest` cookie provider.
///
/// ```no_run
/// use std::sync::Arc;
/// use persistent_cookie_jar::config::StoreConfig;
/// use persistent_cookie_jar::cookies::PersistentCookieJar;
///
/// let jar = Arc::new(PersistentCookieJar::from_config(&StoreConfig::default()).unwrap());
/// let client = reqwest::blocking::Client::builder().cookie_provider(jar).build().unwrap();
/// ```
impl reqwest::cookie::CookieStore for PersistentCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let now = OffsetDateTime::now_utc();
        let cookies: Vec<Cookie> = cookie_headers
            .filter_map(|h| h.to_str().ok())
            .filter_map(|h| parse_set_cookie(h, now))
            .collect();
        if cookies.is_empty() {
            return;
        }
        self.set_cookies_at(url, &cookies, now);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self
            .cookies_at(url, OffsetDateTime::now_utc())
            .iter()
            .map(Cookie::pair)
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            None
        } else {
            HeaderValue::from_str(&header).ok()
        }
    }
}
