//! Cookie jar abstraction and a simple in-memory implementation.
//!
//! A **cookie jar** holds cookies in memory and decides which of them apply to a
//! request URL. The persistence layer wraps a jar and never duplicates its matching
//! rules; it only reads and writes whole partitions through this trait.
//!
//! This module defines the [`CookieJar`] trait and a reference implementation,
//! [`DefaultCookieJar`], which stores cookies **in memory only** and implements a
//! subset of RFC 6265 semantics.
//!
//! ## Notes & limitations
//! - Cookies are bucketed by **partition key** (registrable domain, see
//!   [`partition`](crate::cookies::partition)). Within a bucket, cookies are keyed by
//!   their identity `(domain, path, name)`.
//! - Handled attributes: `Domain`, `Path`, `Expires`, `Max-Age`, `Secure`,
//!   `HttpOnly`, `SameSite`. Priorities and size limits are not implemented.
//! - Expired entries are dropped from a partition whenever it is written, and from
//!   the whole jar by [`CookieJar::remove_expired`].
//! - This module is **not** internally synchronized. Use it via a
//!   `CookieJarHandle = Arc<RwLock<dyn CookieJar + Send + Sync>>`.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, RwLock};

use time::format_description::well_known::Rfc2822;
use time::{Duration, OffsetDateTime};
use url::Url;

use crate::cookies::partition::{canonical_host, derive_key, PublicSuffixList};
use crate::cookies::{Cookie, CookieJarHandle, PartitionDocument, PartitionKey, SameSite};

/// An in-memory cookie jar with per-partition entry maps.
pub trait CookieJar: Send + Sync {
    /// Applies `cookies` received from `url`, following the jar's admission policy.
    ///
    /// Cookies that fail admission (foreign domain, public-suffix domain) are dropped.
    /// A cookie that arrives already expired removes the stored cookie with the same
    /// identity.
    fn set_cookies(&mut self, url: &Url, cookies: &[Cookie], now: OffsetDateTime);

    /// Returns the cookies that apply to a request for `url`, most specific path first.
    fn cookies(&self, url: &Url, now: OffsetDateTime) -> Vec<Cookie>;

    /// Returns a copy of the full entry map for partition `key`, if present.
    fn partition(&self, key: &str) -> Option<PartitionDocument>;

    /// Returns copies of every partition currently held.
    fn partitions(&self) -> Vec<(PartitionKey, PartitionDocument)>;

    /// Inserts `cookie` into partition `key` under its identity, replacing any
    /// previous entry. No admission checks are applied.
    fn merge_entry(&mut self, key: &str, cookie: Cookie);

    /// Adds the entries of `document` to partition `key` without replacing entries
    /// already present. Returns the number of entries added.
    fn backfill(&mut self, key: &str, document: PartitionDocument) -> usize;

    /// Drops every entry expired at `now`. Returns the number removed.
    fn remove_expired(&mut self, now: OffsetDateTime) -> usize;

    /// Removes all cookies from the jar.
    fn clear(&mut self);
}

/// Default cookie jar, in memory only.
///
/// ### Admission behavior
/// - Cookies without a domain become **host-only** cookies for the request host.
/// - A `Domain` must domain-match the request host and must not be a public suffix
///   (unless it equals the host).
/// - If `Path` is empty, a default path is derived from the request URL.
/// - `persistent` is set when the cookie carries an expiry.
pub struct DefaultCookieJar {
    psl: Arc<dyn PublicSuffixList>,

    /// Cookie maps bucketed by **partition key**.
    ///
    /// Key: registrable domain. Value: cookie identity -> cookie.
    pub entries: HashMap<PartitionKey, PartitionDocument>,
}

impl DefaultCookieJar {
    /// Creates an empty in-memory cookie jar that partitions with `psl`.
    pub fn new(psl: Arc<dyn PublicSuffixList>) -> Self {
        DefaultCookieJar {
            psl,
            entries: HashMap::new(),
        }
    }

    /// Wraps the jar into a shareable [`CookieJarHandle`].
    pub fn into_handle(self) -> CookieJarHandle {
        Arc::new(RwLock::new(self))
    }

    /// Total number of cookies across all partitions.
    pub fn len(&self) -> usize {
        self.entries.values().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|p| p.is_empty())
    }

    /// Fills in domain, path and flags for a cookie received from `host`/`url`.
    ///
    /// Returns `None` when the cookie must be rejected.
    fn admit(&self, url: &Url, host: &str, mut cookie: Cookie) -> Option<Cookie> {
        if cookie.name.is_empty() {
            return None;
        }

        let domain = cookie.domain.trim().trim_start_matches('.').to_ascii_lowercase();
        if domain.is_empty() {
            cookie.domain = host.to_string();
            cookie.host_only = true;
        } else {
            let domain = canonical_host(&domain).ok()?;
            if domain != host && host.parse::<IpAddr>().is_ok() {
                log::debug!("rejecting cookie {:?}: domain {} set from address {}", cookie.name, domain, host);
                return None;
            }
            if !domain_match(host, &domain) {
                log::debug!("rejecting cookie {:?}: domain {} does not match {}", cookie.name, domain, host);
                return None;
            }
            if domain != host && self.psl.public_suffix(&domain) == domain {
                log::debug!("rejecting cookie {:?}: domain {} is a public suffix", cookie.name, domain);
                return None;
            }
            cookie.domain = domain;
            cookie.host_only = false;
        }

        if cookie.path.is_empty() || !cookie.path.starts_with('/') {
            cookie.path = default_path(url).to_string();
        }

        cookie.persistent = cookie.expires.is_some();
        Some(cookie)
    }
}

impl CookieJar for DefaultCookieJar {
    fn set_cookies(&mut self, url: &Url, cookies: &[Cookie], now: OffsetDateTime) {
        let Ok(key) = derive_key(url, self.psl.as_ref()) else {
            log::debug!("ignoring {} cookies for url without a valid host: {}", cookies.len(), url);
            return;
        };
        let Some(host) = url.host_str().and_then(|h| canonical_host(h).ok()) else {
            return;
        };

        for cookie in cookies {
            let Some(cookie) = self.admit(url, &host, cookie.clone()) else {
                continue;
            };

            let id = cookie.id();
            if cookie.is_expired(now) {
                if let Some(bucket) = self.entries.get_mut(&key) {
                    bucket.remove(&id);
                }
                continue;
            }

            self.entries.entry(key.clone()).or_default().insert(id, cookie);
        }

        if let Some(bucket) = self.entries.get_mut(&key) {
            bucket.retain(|_, cookie| !cookie.is_expired(now));
        }
    }

    fn cookies(&self, url: &Url, now: OffsetDateTime) -> Vec<Cookie> {
        let Ok(key) = derive_key(url, self.psl.as_ref()) else {
            return Vec::new();
        };
        let Some(bucket) = self.entries.get(&key) else {
            return Vec::new();
        };
        let Some(host) = url.host_str().and_then(|h| canonical_host(h).ok()) else {
            return Vec::new();
        };
        let path = url.path();
        let is_https = url.scheme() == "https";

        let mut matched: Vec<Cookie> = bucket
            .values()
            .filter(|cookie| !cookie.is_expired(now))
            .filter(|cookie| {
                // Check domain match
                if cookie.host_only {
                    host == cookie.domain
                } else {
                    domain_match(&host, &cookie.domain)
                }
            })
            .filter(|cookie| path_match(path, &cookie.path))
            .filter(|cookie| !cookie.secure || is_https)
            .cloned()
            .collect();

        // Longer paths first (RFC 6265 5.4 step 2), then by name for a stable order
        matched.sort_by(|a, b| b.path.len().cmp(&a.path.len()).then_with(|| a.name.cmp(&b.name)));
        matched
    }

    fn partition(&self, key: &str) -> Option<PartitionDocument> {
        self.entries.get(key).cloned()
    }

    fn partitions(&self) -> Vec<(PartitionKey, PartitionDocument)> {
        self.entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    fn merge_entry(&mut self, key: &str, cookie: Cookie) {
        self.entries.entry(key.to_string()).or_default().insert(cookie.id(), cookie);
    }

    fn backfill(&mut self, key: &str, document: PartitionDocument) -> usize {
        let bucket = self.entries.entry(key.to_string()).or_default();
        let mut added = 0;
        for (id, cookie) in document {
            bucket.entry(id).or_insert_with(|| {
                added += 1;
                cookie
            });
        }
        added
    }

    fn remove_expired(&mut self, now: OffsetDateTime) -> usize {
        let before = self.len();
        for bucket in self.entries.values_mut() {
            bucket.retain(|_, cookie| !cookie.is_expired(now));
        }
        before - self.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Returns true when `host` equals `domain` or is a subdomain of it.
fn domain_match(host: &str, domain: &str) -> bool {
    host == domain || (host.len() > domain.len() && host.ends_with(domain) && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

/// RFC 6265 5.1.4 path-match.
fn path_match(request_path: &str, cookie_path: &str) -> bool {
    if cookie_path.is_empty() || request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

/// Default cookie path for a request URL (the directory of its path).
fn default_path(url: &Url) -> &str {
    url.path()
        .rsplit_once('/')
        .map_or("/", |(a, _)| if a.is_empty() { "/" } else { a })
}

/// Parses a single `Set-Cookie` header value received at `now` into a [`Cookie`].
///
/// Returns `None` for headers without a `name=value` pair. Unparseable `Expires`
/// and `Max-Age` attributes are ignored. `Max-Age` wins over `Expires`; zero or a
/// negative value yields an already-expired cookie, which deletes the stored one.
pub fn parse_set_cookie(header: &str, now: OffsetDateTime) -> Option<Cookie> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = Cookie::new(name, value.trim().trim_matches('"'));
    let mut max_age = None;

    for part in parts {
        let part = part.trim();
        if let Some((k, v)) = part.split_once('=') {
            let v = v.trim();
            match k.trim().to_ascii_lowercase().as_str() {
                "path" => cookie.path = v.to_string(),
                "domain" => cookie.domain = v.trim_start_matches('.').to_string(),
                "expires" => cookie.expires = parse_expires(v),
                "max-age" => max_age = v.parse::<i64>().ok().or(max_age),
                "samesite" => cookie.same_site = SameSite::parse(v),
                _ => {}
            }
        } else if part.eq_ignore_ascii_case("secure") {
            cookie.secure = true;
        } else if part.eq_ignore_ascii_case("httponly") {
            cookie.http_only = true;
        }
    }

    match max_age {
        Some(secs) if secs <= 0 => cookie.expires = Some(OffsetDateTime::UNIX_EPOCH),
        Some(secs) => cookie.expires = now.checked_add(Duration::seconds(secs)).or(cookie.expires),
        None => {}
    }

    Some(cookie)
}

/// Parses an `Expires` attribute (`Wed, 21 Oct 2015 07:28:00 GMT`).
fn parse_expires(value: &str) -> Option<OffsetDateTime> {
    // RFC 2822 parsing in `time` wants a numeric zone; HTTP dates use "GMT".
    let normalized = match value.strip_suffix("GMT") {
        Some(rest) => format!("{rest}+0000"),
        None => value.to_string(),
    };
    OffsetDateTime::parse(&normalized, &Rfc2822).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::partition::{NaiveSuffixList, StaticSuffixList};
    use time::macros::datetime;

    fn now() -> OffsetDateTime {
        datetime!(2025-06-01 00:00 UTC)
    }

    fn jar() -> DefaultCookieJar {
        DefaultCookieJar::new(Arc::new(NaiveSuffixList))
    }

    fn u(s: &str) -> Url {
        Url::parse(s).expect("valid URL")
    }

    fn names(cookies: &[Cookie]) -> Vec<&str> {
        cookies.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn host_only_cookie_matches_exact_host() {
        let mut jar = jar();
        jar.set_cookies(&u("https://www.example.com/"), &[Cookie::new("a", "1")], now());

        assert_eq!(names(&jar.cookies(&u("https://www.example.com/"), now())), vec!["a"]);
        assert!(jar.cookies(&u("https://api.example.com/"), now()).is_empty());

        let stored = jar.partition("example.com").unwrap();
        let c = stored.values().next().unwrap();
        assert!(c.host_only);
        assert_eq!(c.domain, "www.example.com");
        assert_eq!(c.path, "/");
    }

    #[test]
    fn domain_cookie_is_shared_by_subdomains() {
        let mut jar = jar();
        let mut c = Cookie::new("sid", "x");
        c.domain = ".example.com".into();
        jar.set_cookies(&u("https://login.example.com/"), &[c], now());

        assert_eq!(jar.cookies(&u("https://shop.example.com/cart"), now()).len(), 1);
        assert_eq!(jar.cookies(&u("https://example.com/"), now()).len(), 1);
    }

    #[test]
    fn foreign_and_public_suffix_domains_are_rejected() {
        let mut jar = DefaultCookieJar::new(Arc::new(StaticSuffixList::new(["com", "co.uk"])));

        let mut foreign = Cookie::new("f", "1");
        foreign.domain = "other.com".into();
        let mut suffix = Cookie::new("s", "1");
        suffix.domain = "co.uk".into();

        jar.set_cookies(&u("https://example.com/"), &[foreign], now());
        jar.set_cookies(&u("https://www.example.co.uk/"), &[suffix], now());
        assert!(jar.is_empty());
    }

    #[test]
    fn same_identity_overwrites() {
        let mut jar = jar();
        let url = u("https://example.com/");
        jar.set_cookies(&url, &[Cookie::new("a", "1")], now());
        jar.set_cookies(&url, &[Cookie::new("a", "2")], now());

        let got = jar.cookies(&url, now());
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].value, "2");
        assert_eq!(jar.len(), 1);
    }

    #[test]
    fn expired_cookie_deletes_stored_entry() {
        let mut jar = jar();
        let url = u("https://example.com/");
        jar.set_cookies(&url, &[Cookie::new("a", "1")], now());

        let mut gone = Cookie::new("a", "");
        gone.expires = Some(datetime!(2000-01-01 00:00 UTC));
        jar.set_cookies(&url, &[gone], now());

        assert!(jar.cookies(&url, now()).is_empty());
        assert!(jar.partition("example.com").unwrap().is_empty());
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let mut jar = jar();
        let url = u("https://example.com/");
        let mut c = Cookie::new("a", "1");
        c.expires = Some(datetime!(2025-07-01 00:00 UTC));
        jar.set_cookies(&url, &[c], now());

        assert_eq!(jar.cookies(&url, now()).len(), 1);
        assert!(jar.cookies(&url, datetime!(2025-08-01 00:00 UTC)).is_empty());
        assert!(jar.partition("example.com").unwrap().values().all(|c| c.persistent));
    }

    #[test]
    fn secure_and_path_filters() {
        let mut jar = jar();
        let mut secure = Cookie::new("s", "1");
        secure.secure = true;
        let mut scoped = Cookie::new("p", "1");
        scoped.path = "/admin".into();
        jar.set_cookies(&u("https://example.com/"), &[secure, scoped], now());

        assert!(names(&jar.cookies(&u("http://example.com/"), now())).is_empty());
        assert_eq!(names(&jar.cookies(&u("https://example.com/"), now())), vec!["s"]);
        assert_eq!(names(&jar.cookies(&u("https://example.com/admin/users"), now())), vec!["p", "s"]);
        assert_eq!(names(&jar.cookies(&u("https://example.com/administrator"), now())), vec!["s"]);
    }

    #[test]
    fn default_path_is_request_directory() {
        let mut jar = jar();
        jar.set_cookies(&u("https://example.com/docs/page.html"), &[Cookie::new("d", "1")], now());
        let c = jar.partition("example.com").unwrap().into_values().next().unwrap();
        assert_eq!(c.path, "/docs");
    }

    #[test]
    fn backfill_keeps_existing_entries() {
        let mut jar = jar();
        let url = u("https://example.com/");
        jar.set_cookies(&url, &[Cookie::new("a", "memory")], now());

        let mut doc = PartitionDocument::new();
        let mut remote_a = jar.partition("example.com").unwrap().into_values().next().unwrap();
        remote_a.value = "remote".into();
        let mut remote_b = remote_a.clone();
        remote_b.name = "b".into();
        doc.insert(remote_a.id(), remote_a);
        doc.insert(remote_b.id(), remote_b);

        assert_eq!(jar.backfill("example.com", doc), 1);
        let got = jar.cookies(&url, now());
        assert_eq!(names(&got), vec!["a", "b"]);
        assert_eq!(got[0].value, "memory");
    }

    #[test]
    fn parses_set_cookie_headers() {
        let c = parse_set_cookie(
            "id=a3fWa; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Domain=.example.com; Path=/docs; Secure; HttpOnly; SameSite=strict",
            now(),
        )
        .unwrap();
        assert_eq!(c.name, "id");
        assert_eq!(c.value, "a3fWa");
        assert_eq!(c.domain, "example.com");
        assert_eq!(c.path, "/docs");
        assert_eq!(c.expires, Some(datetime!(2015-10-21 07:28:00 UTC)));
        assert!(c.secure && c.http_only);
        assert_eq!(c.same_site, SameSite::Strict);

        assert!(parse_set_cookie("novalue", now()).is_none());
        assert!(parse_set_cookie("=value", now()).is_none());
        assert_eq!(parse_set_cookie("empty=", now()).unwrap().value, "");
    }

    #[test]
    fn max_age_overrides_expires() {
        let c = parse_set_cookie("a=1; Max-Age=3600; Expires=Wed, 21 Oct 2015 07:28:00 GMT", now()).unwrap();
        assert_eq!(c.expires, Some(datetime!(2025-06-01 01:00 UTC)));

        let gone = parse_set_cookie("a=; Max-Age=0", now()).unwrap();
        assert!(gone.is_expired(now()));
        assert!(parse_set_cookie("a=; max-age=-5", now()).unwrap().is_expired(now()));

        let junk = parse_set_cookie("a=1; Max-Age=soon", now()).unwrap();
        assert_eq!(junk.expires, None);
    }

    #[test]
    fn max_age_zero_deletes_stored_cookie() {
        let mut jar = jar();
        let url = u("https://example.com/");
        jar.set_cookies(&url, &[parse_set_cookie("sid=abc; Path=/", now()).unwrap()], now());
        assert_eq!(jar.len(), 1);

        jar.set_cookies(&url, &[parse_set_cookie("sid=; Path=/; Max-Age=0", now()).unwrap()], now());
        assert!(jar.cookies(&url, now()).is_empty());
        assert!(jar.partition("example.com").unwrap().is_empty());
    }

    #[test]
    fn writes_purge_expired_entries_from_the_partition() {
        let mut jar = jar();
        let url = u("https://example.com/");
        let mut old = Cookie::new("old", "1");
        old.expires = Some(datetime!(2025-06-02 00:00 UTC));
        jar.set_cookies(&url, &[old], now());

        let later = datetime!(2026-06-01 00:00 UTC);
        jar.set_cookies(&url, &[Cookie::new("new", "1")], later);

        let keys: Vec<_> = jar.partition("example.com").unwrap().into_keys().collect();
        assert_eq!(keys, vec!["example.com;/;new".to_string()]);
    }

    #[test]
    fn remove_expired_sweeps_every_partition() {
        let mut jar = jar();
        for host in ["https://a.com/", "https://b.com/"] {
            let mut c = Cookie::new("short", "1");
            c.expires = Some(datetime!(2025-06-02 00:00 UTC));
            jar.set_cookies(&u(host), &[c, Cookie::new("session", "1")], now());
        }
        assert_eq!(jar.len(), 4);

        assert_eq!(jar.remove_expired(datetime!(2025-07-01 00:00 UTC)), 2);
        assert_eq!(jar.len(), 2);
        assert_eq!(jar.remove_expired(datetime!(2025-07-01 00:00 UTC)), 0);
    }

    #[test]
    fn domain_attribute_is_rejected_on_ip_hosts() {
        let mut jar = jar();
        let mut widened = Cookie::new("w", "1");
        widened.domain = "168.1.20".into();
        let mut exact = Cookie::new("e", "1");
        exact.domain = "192.168.1.20".into();

        jar.set_cookies(&u("http://192.168.1.20/"), &[widened, exact, Cookie::new("h", "1")], now());
        assert_eq!(names(&jar.cookies(&u("http://192.168.1.20/"), now())), vec!["e", "h"]);
    }

    #[test]
    fn clear_drops_all_partitions() {
        let mut jar = jar();
        jar.set_cookies(&u("https://a.com/"), &[Cookie::new("a", "1")], now());
        jar.set_cookies(&u("https://b.com/"), &[Cookie::new("b", "1")], now());
        assert_eq!(jar.partitions().len(), 2);

        jar.clear();
        assert!(jar.partitions().is_empty());
    }
}
