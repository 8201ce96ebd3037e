//! Cookie records and the shared handle types.
//!
//! Cookies live in partitions keyed by registrable domain. A partition is a
//! [`PartitionDocument`]: identity `domain;path;name` mapped to the [`Cookie`]. The
//! same document is what a [`RemoteStore`] loads and saves, and the legacy import
//! file holds a flat array of the same records.
//!
//! The jar sits behind a [`CookieJarHandle`] lock so the persistent wrapper can
//! snapshot a partition and drop the lock before talking to the store. Stores are
//! shared through a [`RemoteStoreHandle`] and synchronize internally.
//!
//! ```rust
//! use persistent_cookie_jar::cookies::{Cookie, SameSite};
//!
//! let c = Cookie {
//!     name: "session".into(),
//!     value: "abc123".into(),
//!     domain: "example.com".into(),
//!     path: "/".into(),
//!     expires: None,
//!     secure: true,
//!     http_only: true,
//!     same_site: SameSite::Lax,
//!     persistent: false,
//!     host_only: false,
//! };
//! assert_eq!(c.id(), "example.com;/;session");
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::cookies::store::RemoteStore;
use crate::cookies::CookieJar;

/// Shared, lockable in-memory jar.
pub type CookieJarHandle = Arc<RwLock<dyn CookieJar + Send + Sync>>;

/// Shared remote store. Every store method takes `&self`.
pub type RemoteStoreHandle = Arc<dyn RemoteStore + Send + Sync>;

/// Storage partition key: the registrable domain of a host (e.g. `"example.com"`).
pub type PartitionKey = String;

/// The unit of remote storage: cookie identity -> cookie.
///
/// A `BTreeMap` keeps the serialized document stable between saves.
pub type PartitionDocument = BTreeMap<String, Cookie>;

/// SameSite policy of a cookie.
///
/// Unknown or empty values decode as [`SameSite::Default`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    #[serde(alias = "lax", alias = "SameSite=Lax")]
    Lax,
    #[serde(alias = "strict", alias = "SameSite=Strict")]
    Strict,
    #[serde(alias = "none", alias = "SameSite=None")]
    None,
    #[default]
    #[serde(other)]
    Default,
}

impl SameSite {
    /// Parses a `SameSite` attribute value, case-insensitively.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case("lax") {
            SameSite::Lax
        } else if value.eq_ignore_ascii_case("strict") {
            SameSite::Strict
        } else if value.eq_ignore_ascii_case("none") {
            SameSite::None
        } else {
            SameSite::Default
        }
    }
}

/// A cookie as stored by the in-memory jar and the remote store.
///
/// Field names serialize in camelCase. The capitalised aliases let files written by
/// older Go-based jars (`"HttpOnly"`, `"SameSite"`, ...) decode as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    /// Cookie name (case-sensitive).
    #[serde(alias = "Name")]
    pub name: String,

    /// Raw cookie value (not URL-decoded).
    #[serde(alias = "Value")]
    pub value: String,

    /// Domain the cookie is scoped to, without a leading dot.
    ///
    /// Empty on cookies that have not been admitted by a jar yet; the jar fills in
    /// the request host for host-only cookies.
    #[serde(default, alias = "Domain")]
    pub domain: String,

    /// Path scoping (e.g. `"/"`). Empty means "derive from the request URL".
    #[serde(default, alias = "Path")]
    pub path: String,

    /// Expiration timestamp. `None` marks a session cookie.
    #[serde(default, alias = "Expires", with = "time::serde::rfc3339::option")]
    pub expires: Option<OffsetDateTime>,

    /// If `true`, cookie is sent only over HTTPS.
    #[serde(default, alias = "Secure")]
    pub secure: bool,

    /// If `true`, cookie is hidden from client-side scripts.
    #[serde(default, alias = "HttpOnly")]
    pub http_only: bool,

    /// Cross-site sending policy.
    #[serde(default, alias = "SameSite")]
    pub same_site: SameSite,

    /// If `true`, the cookie outlives the session (it carried an expiry).
    #[serde(default, alias = "Persistent")]
    pub persistent: bool,

    /// If `true`, the cookie only matches its exact domain, never subdomains.
    #[serde(default, alias = "HostOnly")]
    pub host_only: bool,
}

impl Cookie {
    /// Creates a session cookie with only a name and value set.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: String::new(),
            expires: None,
            secure: false,
            http_only: false,
            same_site: SameSite::Default,
            persistent: false,
            host_only: false,
        }
    }

    /// Identity of the cookie within a partition: `(domain, path, name)`.
    pub fn id(&self) -> String {
        format!("{};{};{}", self.domain, self.path, self.name)
    }

    /// Returns true when the cookie has an expiry at or before `now`.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        matches!(self.expires, Some(expires) if expires <= now)
    }

    /// Renders the `name=value` pair used in a `Cookie` request header.
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn identity_is_domain_path_name() {
        let mut c = Cookie::new("sid", "1");
        c.domain = "example.com".into();
        c.path = "/app".into();
        assert_eq!(c.id(), "example.com;/app;sid");

        // Value does not participate in identity
        c.value = "2".into();
        assert_eq!(c.id(), "example.com;/app;sid");
    }

    #[test]
    fn expiry_is_inclusive() {
        let now = datetime!(2025-01-01 12:00 UTC);
        let mut c = Cookie::new("a", "b");
        assert!(!c.is_expired(now));

        c.expires = Some(now);
        assert!(c.is_expired(now));

        c.expires = Some(datetime!(2025-01-02 00:00 UTC));
        assert!(!c.is_expired(now));
    }

    #[test]
    fn serializes_camel_case_with_rfc3339_expiry() {
        let mut c = Cookie::new("sid", "xyz");
        c.domain = "example.com".into();
        c.path = "/".into();
        c.http_only = true;
        c.same_site = SameSite::Strict;
        c.expires = Some(datetime!(2030-05-01 08:30 UTC));

        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["httpOnly"], true);
        assert_eq!(json["sameSite"], "Strict");
        assert_eq!(json["expires"], "2030-05-01T08:30:00Z");
    }

    #[test]
    fn decodes_go_style_field_names() {
        let json = r#"{
            "Name": "sid", "Value": "v", "Domain": "example.com", "Path": "/",
            "Expires": "2031-01-01T00:00:00Z", "HttpOnly": true, "Secure": true,
            "SameSite": "SameSite=Lax", "Persistent": true
        }"#;
        let c: Cookie = serde_json::from_str(json).unwrap();
        assert_eq!(c.name, "sid");
        assert!(c.http_only);
        assert!(c.secure);
        assert!(c.persistent);
        assert_eq!(c.same_site, SameSite::Lax);
        assert!(c.expires.is_some());
    }

    #[test]
    fn unknown_same_site_decodes_as_default() {
        let c: Cookie =
            serde_json::from_str(r#"{"name":"a","value":"b","sameSite":""}"#).unwrap();
        assert_eq!(c.same_site, SameSite::Default);

        let c: Cookie =
            serde_json::from_str(r#"{"name":"a","value":"b","sameSite":"Sometimes"}"#).unwrap();
        assert_eq!(c.same_site, SameSite::Default);
        assert_eq!(serde_json::to_value(SameSite::Default).unwrap(), "Default");
        assert_eq!(SameSite::parse("LAX"), SameSite::Lax);
        assert_eq!(SameSite::parse("bogus"), SameSite::Default);
    }
}
