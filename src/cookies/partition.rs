//! Partition key derivation.
//!
//! Cookies are stored remotely in one document per **partition**. A partition is the
//! registrable domain (public suffix plus one label) of the request host, so
//! `a.example.com` and `b.example.com` share the `example.com` partition.
//!
//! Every host or cookie-domain to key conversion goes through [`derive_key`] or
//! [`derive_key_from_domain`]. Both are pure and fail with
//! [`PersistenceError::InvalidHost`] instead of producing an empty key.

use std::collections::HashSet;
use std::net::{Ipv4Addr, Ipv6Addr};

use url::{Host, Url};

use crate::cookies::PartitionKey;
use crate::errors::PersistenceError;

/// Public suffix classification (e.g. `"co.uk"` for `"www.example.co.uk"`).
///
/// Implementations must be pure: the same domain always yields the same suffix.
pub trait PublicSuffixList: Send + Sync {
    /// Returns the public suffix of `domain`. The domain is already canonical
    /// (lowercase, ASCII, no trailing dot).
    fn public_suffix(&self, domain: &str) -> String;

    /// Short description used in log lines.
    fn describe(&self) -> String;
}

/// Fallback classification: the last label is the public suffix.
///
/// Good enough for `.com`-style domains; groups `a.example.co.uk` under `co.uk`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NaiveSuffixList;

impl PublicSuffixList for NaiveSuffixList {
    fn public_suffix(&self, domain: &str) -> String {
        match domain.rfind('.') {
            Some(i) => domain[i + 1..].to_string(),
            None => domain.to_string(),
        }
    }

    fn describe(&self) -> String {
        "naive last-label suffix list".to_string()
    }
}

/// A fixed set of suffix rules (`"com"`, `"co.uk"`, `"github.io"`, ...).
///
/// The longest rule matching the end of a domain wins. Domains matching no rule
/// fall back to their last label.
#[derive(Debug, Default, Clone)]
pub struct StaticSuffixList {
    rules: HashSet<String>,
}

impl StaticSuffixList {
    pub fn new<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = rules
            .into_iter()
            .map(|r| r.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|r| !r.is_empty())
            .collect();
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl PublicSuffixList for StaticSuffixList {
    fn public_suffix(&self, domain: &str) -> String {
        // Walk from the full domain towards the last label; the first hit is the longest.
        let mut candidate = domain;
        loop {
            if self.rules.contains(candidate) {
                return candidate.to_string();
            }
            match candidate.find('.') {
                Some(i) => candidate = &candidate[i + 1..],
                None => return candidate.to_string(),
            }
        }
    }

    fn describe(&self) -> String {
        format!("static suffix list ({} rules)", self.rules.len())
    }
}

/// Canonicalizes a host (or `host:port`) into a lowercase ASCII host.
///
/// Strips a port, a trailing dot and IPv6 brackets, and applies IDNA via
/// [`url::Host::parse`]. Empty or malformed hosts are rejected.
pub fn canonical_host(host: &str) -> Result<String, PersistenceError> {
    let invalid = || PersistenceError::InvalidHost(host.to_string());

    let trimmed = strip_port(host.trim()).ok_or_else(invalid)?;
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(invalid());
    }

    // Bare IPv6 literals arrive without brackets from cookie domains.
    if let Ok(ip) = trimmed.parse::<Ipv6Addr>() {
        return Ok(ip.to_string());
    }

    match Host::parse(trimmed).map_err(|_| invalid())? {
        Host::Domain(d) if d.is_empty() => Err(invalid()),
        Host::Domain(d) => Ok(d),
        Host::Ipv4(ip) => Ok(ip.to_string()),
        Host::Ipv6(ip) => Ok(ip.to_string()),
    }
}

/// Removes a `:port` suffix. Returns `None` when the port part is not numeric.
fn strip_port(host: &str) -> Option<&str> {
    if let Some(rest) = host.strip_prefix('[') {
        // [v6]:port or [v6]
        let end = rest.find(']')?;
        let after = &rest[end + 1..];
        if !after.is_empty() && !valid_port(after.strip_prefix(':')?) {
            return None;
        }
        return Some(&rest[..end]);
    }

    match host.rfind(':') {
        // More than one colon without brackets: a bare IPv6 literal
        Some(_) if host.matches(':').count() > 1 => Some(host),
        Some(i) if valid_port(&host[i + 1..]) => Some(&host[..i]),
        Some(_) => None,
        None => Some(host),
    }
}

fn valid_port(port: &str) -> bool {
    !port.is_empty() && port.parse::<u16>().is_ok()
}

fn is_ip(host: &str) -> bool {
    host.parse::<Ipv4Addr>().is_ok() || host.parse::<Ipv6Addr>().is_ok()
}

/// Maps a canonical host to its partition key (the registrable domain).
///
/// IP addresses and hosts that are themselves a public suffix are their own key.
pub fn jar_key(host: &str, psl: &dyn PublicSuffixList) -> String {
    if is_ip(host) {
        return host.to_string();
    }

    let suffix = psl.public_suffix(host);
    if suffix == host || suffix.is_empty() {
        return host.to_string();
    }

    let i = host.len().saturating_sub(suffix.len());
    if i == 0 || !host.ends_with(&suffix) || host.as_bytes()[i - 1] != b'.' {
        return host.to_string();
    }

    match host[..i - 1].rfind('.') {
        Some(prev_dot) => host[prev_dot + 1..].to_string(),
        None => host.to_string(),
    }
}

/// Derives the partition key for a request URL.
pub fn derive_key(url: &Url, psl: &dyn PublicSuffixList) -> Result<PartitionKey, PersistenceError> {
    let host = url
        .host_str()
        .ok_or_else(|| PersistenceError::InvalidHost(url.to_string()))?;
    key_for_host(host, psl)
}

/// Derives the partition key for a cookie domain (a leading dot is ignored).
pub fn derive_key_from_domain(domain: &str, psl: &dyn PublicSuffixList) -> Result<PartitionKey, PersistenceError> {
    key_for_host(domain.trim().trim_start_matches('.'), psl)
}

fn key_for_host(host: &str, psl: &dyn PublicSuffixList) -> Result<PartitionKey, PersistenceError> {
    let host = canonical_host(host)?;
    let key = jar_key(&host, psl);
    if key.is_empty() {
        return Err(PersistenceError::InvalidHost(host));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(s: &str) -> Url {
        Url::parse(s).expect("valid URL")
    }

    fn uk_list() -> StaticSuffixList {
        StaticSuffixList::new(["com", "uk", "co.uk", "github.io"])
    }

    #[test]
    fn sibling_subdomains_share_a_key() {
        let psl = NaiveSuffixList;
        let a = derive_key(&u("https://a.example.com/x"), &psl).unwrap();
        let b = derive_key(&u("http://b.c.example.com:8080/"), &psl).unwrap();
        let c = derive_key(&u("https://example.com"), &psl).unwrap();
        assert_eq!(a, "example.com");
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn static_list_uses_longest_rule() {
        let psl = uk_list();
        assert_eq!(psl.public_suffix("www.example.co.uk"), "co.uk");
        assert_eq!(jar_key("www.example.co.uk", &psl), "example.co.uk");
        assert_eq!(jar_key("alice.github.io", &psl), "alice.github.io");
        assert_eq!(jar_key("pages.alice.github.io", &psl), "alice.github.io");

        // Naive list would group every .co.uk site together
        assert_eq!(jar_key("www.example.co.uk", &NaiveSuffixList), "co.uk");
    }

    #[test]
    fn suffix_only_host_is_its_own_key() {
        let psl = uk_list();
        assert_eq!(jar_key("co.uk", &psl), "co.uk");
        assert_eq!(jar_key("localhost", &NaiveSuffixList), "localhost");
    }

    #[test]
    fn ip_hosts_are_their_own_key() {
        let psl = NaiveSuffixList;
        assert_eq!(derive_key(&u("http://192.168.1.20:3000/"), &psl).unwrap(), "192.168.1.20");
        assert_eq!(derive_key(&u("http://[2001:db8::1]:8080/"), &psl).unwrap(), "2001:db8::1");
    }

    #[test]
    fn canonical_host_normalizes() {
        assert_eq!(canonical_host("WWW.Example.COM").unwrap(), "www.example.com");
        assert_eq!(canonical_host("example.com.").unwrap(), "example.com");
        assert_eq!(canonical_host("example.com:443").unwrap(), "example.com");
        assert_eq!(canonical_host("[::1]:80").unwrap(), "::1");
        assert_eq!(canonical_host("bücher.de").unwrap(), "xn--bcher-kva.de");
    }

    #[test]
    fn invalid_hosts_are_errors() {
        for bad in ["", " ", ".", "example.com:http", "exa mple.com", "[::1"] {
            let err = canonical_host(bad).unwrap_err();
            assert!(matches!(err, PersistenceError::InvalidHost(_)), "{bad:?} should be rejected");
        }

        let psl = NaiveSuffixList;
        assert!(derive_key(&u("data:text/plain,hello"), &psl).is_err());
        assert!(derive_key_from_domain("", &psl).is_err());
    }

    #[test]
    fn cookie_domains_strip_leading_dot() {
        let psl = NaiveSuffixList;
        assert_eq!(derive_key_from_domain(".shop.example.com", &psl).unwrap(), "example.com");
        assert_eq!(derive_key_from_domain("example.com", &psl).unwrap(), "example.com");
    }

    #[test]
    fn static_list_normalizes_rules() {
        let psl = StaticSuffixList::new([".COM", "", "  co.uk "]);
        assert_eq!(psl.len(), 2);
        assert_eq!(psl.public_suffix("example.co.uk"), "co.uk");
        assert!(psl.describe().contains("2 rules"));
    }
}
