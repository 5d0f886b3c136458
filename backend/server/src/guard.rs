//! Keeps the proxy from being pointed at our own network.
//!
//! Literal loopback, private, link-local and unspecified addresses are refused, as
//! is `localhost`. The same check runs on every redirect hop, so a public URL
//! cannot bounce the proxy onto an internal service.
//!
//! Hostnames are not resolved here, a public name pointing at a private address
//! still gets through.
use std::net::{Ipv4Addr, Ipv6Addr};

use reqwest::redirect::{Attempt, Policy};
use url::{Host, Url};

pub const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostGuard {
    allow_loopback: bool,
}

impl HostGuard {
    /// Lets loopback through, for local development against upstreams on this machine.
    pub fn allowing_loopback() -> Self {
        Self {
            allow_loopback: true,
        }
    }

    pub fn permits(&self, url: &Url) -> bool {
        match url.host() {
            Some(Host::Domain(domain)) => {
                let domain = domain.trim_end_matches('.').to_ascii_lowercase();
                let loopback = domain == "localhost" || domain.ends_with(".localhost");

                !loopback || self.allow_loopback
            }
            Some(Host::Ipv4(ip)) => self.permits_v4(ip),
            Some(Host::Ipv6(ip)) => match ip.to_ipv4_mapped() {
                Some(mapped) => self.permits_v4(mapped),
                None => self.permits_v6(ip),
            },
            None => false,
        }
    }

    fn permits_v4(&self, ip: Ipv4Addr) -> bool {
        if ip.is_loopback() {
            return self.allow_loopback;
        }

        !(ip.is_private() || ip.is_link_local() || ip.is_unspecified() || ip.is_broadcast())
    }

    fn permits_v6(&self, ip: Ipv6Addr) -> bool {
        if ip.is_loopback() {
            return self.allow_loopback;
        }

        !(ip.is_unspecified() || ip.is_unique_local() || ip.is_unicast_link_local())
    }

    /// Follows at most [`MAX_REDIRECTS`] hops, stopping on the first refused host.
    /// A stopped redirect reaches the caller as a 3xx and falls back like any other status.
    pub fn redirect_policy(self) -> Policy {
        Policy::custom(move |attempt: Attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if self.permits(attempt.url()) {
                attempt.follow()
            } else {
                attempt.stop()
            }
        })
    }
}
