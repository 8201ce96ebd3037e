//! Store configuration.
//!
//! Loaded with figment in two layers, highest first:
//! 1. Environment variables prefixed with `COOKIEJAR_`
//! 2. Built-in defaults

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Deserializer, Serialize};

use crate::cookies::{
    HttpDocumentStore, InMemoryRemoteStore, NaiveSuffixList, PublicSuffixList, RemoteStoreHandle, SqliteRemoteStore,
    StaticSuffixList,
};
use crate::errors::PersistenceError;

const ENV_PREFIX: &str = "COOKIEJAR_";

/// Which remote store backs the jar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local, nothing survives a restart
    #[default]
    #[serde(rename = "memory", alias = "in-memory", alias = "inmemory")]
    InMemory,
    /// SQLite database file
    Sqlite,
    /// Network document store
    #[serde(alias = "remote")]
    Http,
}

impl FromStr for StoreBackend {
    type Err = PersistenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" | "inmemory" => Ok(StoreBackend::InMemory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            "http" | "remote" => Ok(StoreBackend::Http),
            other => Err(PersistenceError::Config(format!("unknown store backend {other:?}"))),
        }
    }
}

/// Store connection parameters and partitioning rules.
///
/// | Variable                 | Field          |
/// |--------------------------|----------------|
/// | `COOKIEJAR_BACKEND`      | `backend` (`memory`, `sqlite`, `http`) |
/// | `COOKIEJAR_PROJECT`      | `project_id`   |
/// | `COOKIEJAR_COLLECTION`   | `collection`   |
/// | `COOKIEJAR_ENDPOINT`     | `endpoint`     |
/// | `COOKIEJAR_SQLITE_PATH`  | `sqlite_path`  |
/// | `COOKIEJAR_AUTH_TOKEN`   | `auth_token`   |
/// | `COOKIEJAR_TIMEOUT_SECS` | `timeout_secs` |
/// | `COOKIEJAR_SUFFIXES`     | `suffix_rules` (comma separated) |
#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend to build
    #[serde(default)]
    pub backend: StoreBackend,

    /// Project the documents live in (HTTP store)
    #[serde(default = "default_project")]
    pub project_id: String,

    /// Collection holding one document per partition
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Base URL of the document service (HTTP store)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Database file (SQLite store)
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,

    /// Bearer token sent to the document service
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Per-request timeout for the document service. `None` leaves requests unbounded.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Public suffix rules. Empty means "last label is the suffix".
    #[serde(default, deserialize_with = "suffix_rules")]
    pub suffix_rules: Vec<String>,
}

fn default_project() -> String {
    "default".into()
}

fn default_collection() -> String {
    "cookies".into()
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("cookies.db")
}

/// Accepts either a list or a comma separated string.
fn suffix_rules<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Rules {
        List(Vec<String>),
        Csv(String),
    }

    let rules = match Rules::deserialize(deserializer)? {
        Rules::List(rules) => rules,
        Rules::Csv(csv) => csv.split(',').map(String::from).collect(),
    };
    Ok(rules
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .map(String::from)
        .collect())
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            project_id: default_project(),
            collection: default_collection(),
            endpoint: None,
            sqlite_path: default_sqlite_path(),
            auth_token: None,
            timeout_secs: None,
            suffix_rules: Vec::new(),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field("project_id", &self.project_id)
            .field("collection", &self.collection)
            .field("endpoint", &self.endpoint)
            .field("sqlite_path", &self.sqlite_path)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("suffix_rules", &self.suffix_rules.len())
            .finish()
    }
}

impl StoreConfig {
    /// Defaults overlaid with `COOKIEJAR_*` environment variables.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default())).merge(Env::prefixed(ENV_PREFIX).map(|key| {
            match key.as_str().to_ascii_lowercase().as_str() {
                "project" => "project_id".into(),
                "suffixes" => "suffix_rules".into(),
                other => other.to_string().into(),
            }
        }))
    }

    /// Loads the configuration from the environment.
    pub fn from_env() -> Result<Self, PersistenceError> {
        Self::from_figment(Self::figment())
    }

    /// Extracts a configuration from any figment, e.g. [`figment`](Self::figment)
    /// with extra providers merged on top.
    pub fn from_figment(figment: Figment) -> Result<Self, PersistenceError> {
        figment
            .extract()
            .map_err(|e| PersistenceError::Config(e.to_string()))
    }

    /// Request timeout for the document service.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Suffix classification for partition keys.
    pub fn public_suffix_list(&self) -> Arc<dyn PublicSuffixList> {
        if self.suffix_rules.is_empty() {
            Arc::new(NaiveSuffixList)
        } else {
            Arc::new(StaticSuffixList::new(&self.suffix_rules))
        }
    }

    /// Builds the configured remote store.
    pub fn build_store(&self) -> Result<RemoteStoreHandle, PersistenceError> {
        let store: RemoteStoreHandle = match self.backend {
            StoreBackend::InMemory => Arc::new(InMemoryRemoteStore::new()),
            StoreBackend::Sqlite => Arc::new(SqliteRemoteStore::new(&self.sqlite_path, self.collection.as_str())?),
            StoreBackend::Http => {
                let endpoint = self
                    .endpoint
                    .as_deref()
                    .ok_or_else(|| PersistenceError::Config("http backend needs COOKIEJAR_ENDPOINT".to_string()))?;
                Arc::new(HttpDocumentStore::new(
                    endpoint,
                    &self.project_id,
                    &self.collection,
                    self.auth_token.clone(),
                    self.request_timeout(),
                )?)
            }
        };
        log::info!("using {}", store.describe());
        Ok(store)
    }
}
