//! Cache-aside persistence for HTTP cookie state.
//!
//! An in-memory [`CookieJar`](cookies::CookieJar) answers cookie lookups; a
//! [`RemoteStore`](cookies::RemoteStore) keeps one document per registrable domain so
//! cookies survive restarts. [`PersistentCookieJar`](cookies::PersistentCookieJar)
//! binds the two.

pub mod config;
pub mod cookies;
pub mod errors;

pub use config::{StoreBackend, StoreConfig};
pub use cookies::{Cookie, PersistentCookieJar, PersistentJarOptions};
pub use errors::PersistenceError;
