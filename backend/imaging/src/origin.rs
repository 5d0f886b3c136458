//! # Origin Classifier
//!
//! Decides where an image reference lives before anyone tries to load it.
//!
//! - `Local`: empty, rooted at `/`, loopback host or one of our own origins
//! - `CorsProneExternal`: host is on the configured list of partners that refuse cross-origin reads
//! - `KnownSafeExternal`: every other well-formed `http`/`https` URL
//! - `Invalid`: anything that does not parse, never a panic
//!
//! The CORS-prone list is built once at startup and shared read-only. Adding a partner
//! is a configuration change.
//!
//! ## Matching
//! A listed domain matches itself and any subdomain, so `travel-assets.com` covers
//! `a.travel-assets.com` but not `nottravel-assets.com`.
use std::collections::HashSet;

use url::Url;

/// Partners whose CDNs reject hotlinked or cross-origin image reads.
pub const DEFAULT_CORS_PRONE_DOMAINS: &[&str] = &[
    "travel-assets.com",
    "tripadvisor.com",
    "bstatic.com",
    "expedia.com",
    "viator.com",
    "getyourguide.com",
    "lonelyplanet.com",
    "mmtcdn.com",
    "agoda.net",
];

const LOOPBACK_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "[::1]"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OriginClass {
    Local,
    KnownSafeExternal,
    CorsProneExternal,
    Invalid,
}

#[derive(Debug, Clone)]
pub struct OriginPolicy {
    cors_prone: HashSet<String>,
    own_origins: Vec<url::Origin>,
}

impl OriginPolicy {
    pub fn new<I, S>(cors_prone: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cors_prone = cors_prone
            .into_iter()
            .filter_map(|domain| normalize_domain(domain.as_ref()))
            .collect();

        Self {
            cors_prone,
            own_origins: Vec::new(),
        }
    }

    /// Treats absolute URLs on `origin` as local, e.g. the site's public origin.
    pub fn with_own_origin(mut self, origin: &Url) -> Self {
        let origin = origin.origin();

        if origin.is_tuple() && !self.own_origins.contains(&origin) {
            self.own_origins.push(origin);
        }

        self
    }

    pub fn classify(&self, reference: &str) -> OriginClass {
        let reference = reference.trim();

        if reference.is_empty() || is_rooted_path(reference) {
            return OriginClass::Local;
        }

        let Some(url) = parse_absolute(reference) else {
            return OriginClass::Invalid;
        };

        let Some(host) = url.host_str() else {
            return OriginClass::Invalid;
        };

        if LOOPBACK_HOSTS.contains(&host) || self.own_origins.contains(&url.origin()) {
            OriginClass::Local
        } else if self.is_cors_prone_host(host) {
            OriginClass::CorsProneExternal
        } else {
            OriginClass::KnownSafeExternal
        }
    }

    pub fn is_cors_prone_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();

        // walk every suffix at a label boundary: a.b.example.com, b.example.com, example.com, com
        let mut candidate = host.as_str();
        loop {
            if self.cors_prone.contains(candidate) {
                return true;
            }

            match candidate.split_once('.') {
                Some((_, rest)) => candidate = rest,
                None => return false,
            }
        }
    }
}

impl Default for OriginPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CORS_PRONE_DOMAINS)
    }
}

/// Parses an absolute `http`/`https` reference. Protocol-relative references are read as https.
pub fn parse_absolute(reference: &str) -> Option<Url> {
    let url = if reference.starts_with("//") {
        Url::parse(&format!("https:{reference}"))
    } else {
        Url::parse(reference)
    }
    .ok()?;

    matches!(url.scheme(), "http" | "https").then_some(url)
}

pub fn is_rooted_path(reference: &str) -> bool {
    reference.starts_with('/') && !reference.starts_with("//")
}

fn normalize_domain(domain: &str) -> Option<String> {
    let domain = domain
        .trim()
        .trim_start_matches("*.")
        .trim_start_matches('.')
        .trim_end_matches('.')
        .to_ascii_lowercase();

    (!domain.is_empty()).then_some(domain)
}
