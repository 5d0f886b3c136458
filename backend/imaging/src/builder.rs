//! # URL Builder
//!
//! Maps a stored image reference to the path that should be requested. Pure and
//! synchronous, the server and the browser component both call it.
//!
//! - Empty → the generated placeholder asset
//! - Backend upload URL → the upload relay
//! - Local path or own origin → unchanged
//! - Anything external → the image proxy, raw URL percent-encoded into `url`
//! - Unparseable → the placeholder, same as a failed fetch
use url::{Url, form_urlencoded};

use crate::{
    origin::{OriginClass, OriginPolicy, parse_absolute},
    target::ResolvedTarget,
};

pub const PROXY_PATH: &str = "/api/proxy-image";
pub const RELAY_PATH: &str = "/api/uploaded-images";
pub const PLACEHOLDER_PATH: &str = "/placeholder.svg";
pub const UPLOADS_PREFIX: &str = "/uploads/";

#[derive(Debug, Clone)]
pub struct UrlBuilder {
    policy: OriginPolicy,
    backend_origin: Option<url::Origin>,
    placeholder_path: String,
}

impl UrlBuilder {
    pub fn new(policy: OriginPolicy) -> Self {
        Self {
            policy,
            backend_origin: None,
            placeholder_path: PLACEHOLDER_PATH.to_string(),
        }
    }

    /// Absolute references to `backend` under `/uploads/` go through the relay.
    pub fn with_backend_origin(mut self, backend: &Url) -> Self {
        self.backend_origin = Some(backend.origin());
        self
    }

    pub fn classify(&self, reference: &str) -> OriginClass {
        self.policy.classify(reference)
    }

    pub fn resolve(&self, reference: Option<&str>) -> String {
        self.target(reference).into_path()
    }

    pub fn target(&self, reference: Option<&str>) -> ResolvedTarget {
        let reference = reference.map(str::trim).unwrap_or_default();

        if reference.is_empty() {
            return ResolvedTarget::Placeholder(self.placeholder_path.clone());
        }

        if let Some(relay) = self.relay_path(reference) {
            return ResolvedTarget::LocalRelay(relay);
        }

        match self.policy.classify(reference) {
            OriginClass::Local => ResolvedTarget::Direct(reference.to_string()),
            OriginClass::KnownSafeExternal | OriginClass::CorsProneExternal => {
                ResolvedTarget::Proxied(proxy_path(reference))
            }
            OriginClass::Invalid => ResolvedTarget::Placeholder(self.placeholder_path.clone()),
        }
    }

    fn relay_path(&self, reference: &str) -> Option<String> {
        let backend = self.backend_origin.as_ref()?;
        let url = parse_absolute(reference)?;

        if url.origin() != *backend {
            return None;
        }

        let rest = url.path().strip_prefix(UPLOADS_PREFIX)?;
        if rest.is_empty() {
            return None;
        }

        Some(format!("{RELAY_PATH}/{rest}"))
    }
}

impl Default for UrlBuilder {
    fn default() -> Self {
        Self::new(OriginPolicy::default())
    }
}

/// `/api/proxy-image?url=<encoded>` for an absolute external URL.
pub fn proxy_path(url: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("url", url)
        .finish();

    format!("{PROXY_PATH}?{query}")
}
