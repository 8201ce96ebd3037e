// src/cookies.rs
//! Cookies: [`CookieJar`], [`RemoteStore`], partition keys and the [`PersistentCookieJar`].

mod cookies;
mod cookie_jar;
mod legacy;
pub mod partition;
mod persistent_cookie_jar;
mod store;

pub use cookies::Cookie;
pub use cookies::CookieJarHandle;
pub use cookies::PartitionDocument;
pub use cookies::PartitionKey;
pub use cookies::RemoteStoreHandle;
pub use cookies::SameSite;

pub use cookie_jar::parse_set_cookie;
pub use cookie_jar::CookieJar;
pub use cookie_jar::DefaultCookieJar;
pub use persistent_cookie_jar::FlushReport;
pub use persistent_cookie_jar::PersistentCookieJar;
pub use persistent_cookie_jar::PersistentJarOptions;

pub use partition::{derive_key, NaiveSuffixList, PublicSuffixList, StaticSuffixList};

pub use store::HttpDocumentStore;
pub use store::InMemoryRemoteStore;
pub use store::RemoteStore;
pub use store::SqliteRemoteStore;
