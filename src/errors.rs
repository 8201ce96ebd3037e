use r2d2_sqlite::rusqlite;

/// Errors raised by the cookie persistence layer.
///
/// Only [`PersistenceError::InvalidHost`], import failures ([`PersistenceError::Decode`],
/// [`PersistenceError::Io`]) and [`PersistenceError::Config`] ever reach the caller of a
/// [`PersistentCookieJar`](crate::cookies::PersistentCookieJar). Everything the remote
/// store produces is logged and absorbed by the jar.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Invalid host: {0:?}")]
    InvalidHost(String),

    #[error("Partition not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PersistenceError {
    /// Returns true when the error means "no document stored under this key".
    pub fn is_not_found(&self) -> bool {
        matches!(self, PersistenceError::NotFound(_))
    }
}

impl From<r2d2::Error> for PersistenceError {
    fn from(err: r2d2::Error) -> Self {
        PersistenceError::StoreUnavailable(err.to_string())
    }
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        PersistenceError::StoreUnavailable(err.to_string())
    }
}

impl From<reqwest::Error> for PersistenceError {
    fn from(err: reqwest::Error) -> Self {
        PersistenceError::StoreUnavailable(err.to_string())
    }
}
