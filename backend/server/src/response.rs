//! # Image Responses
//!
//! Every image route answers 200. Real bytes get the long immutable cache, a
//! placeholder gets the short one so a backend outage is not remembered by
//! the browser for a year.
use std::time::Duration;

use axum::{
    body::Body,
    http::{
        HeaderName, HeaderValue, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_SECURITY_POLICY, CONTENT_TYPE,
            X_CONTENT_TYPE_OPTIONS,
        },
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::warn;

use crate::{
    config::Config,
    fetch::{DEFAULT_CONTENT_TYPE, FetchOutcome, FetchedImage},
    placeholder::{PLACEHOLDER_CONTENT_TYPE, from_config},
};

pub const X_IMAGE_FALLBACK: HeaderName = HeaderName::from_static("x-image-fallback");

/// Relayed SVGs are served from our origin, opened directly they must not run script.
pub const IMAGE_CSP: &str = "default-src 'none'; style-src 'unsafe-inline'; sandbox";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    Immutable(Duration),
    Short(Duration),
}

impl CachePolicy {
    pub fn header_value(self) -> String {
        match self {
            CachePolicy::Immutable(age) => format!("public, max-age={}, immutable", age.as_secs()),
            CachePolicy::Short(age) => format!("public, max-age={}", age.as_secs()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageResponder {
    placeholder: Bytes,
    long_cache: CachePolicy,
    short_cache: CachePolicy,
}

impl ImageResponder {
    pub fn new(config: &Config) -> Self {
        Self {
            placeholder: from_config(&config.placeholder),
            long_cache: CachePolicy::Immutable(config.long_cache),
            short_cache: CachePolicy::Short(config.short_cache),
        }
    }

    /// `target` only appears in logs.
    pub fn respond(&self, route: &str, target: &str, outcome: FetchOutcome) -> Response {
        match outcome {
            FetchOutcome::Fetched(image) => {
                #[cfg(feature = "verbose")]
                tracing::info!("{route}: served {} bytes for {target}", image.body.len());

                self.image(image)
            }
            FetchOutcome::FallbackRequired(e) => {
                warn!("{route}: placeholder for {target} ({}): {e}", e.code());

                self.fallback(Some(e.code()))
            }
        }
    }

    pub fn image(&self, image: FetchedImage) -> Response {
        let content_type = HeaderValue::from_str(&image.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

        build(content_type, self.long_cache, None, image.body)
    }

    pub fn fallback(&self, code: Option<&'static str>) -> Response {
        build(
            HeaderValue::from_static(PLACEHOLDER_CONTENT_TYPE),
            self.short_cache,
            code,
            self.placeholder.clone(),
        )
    }

    /// The placeholder as a regular asset, it never changes for a given configuration.
    pub fn placeholder_asset(&self) -> Response {
        build(
            HeaderValue::from_static(PLACEHOLDER_CONTENT_TYPE),
            self.long_cache,
            None,
            self.placeholder.clone(),
        )
    }
}

fn build(
    content_type: HeaderValue,
    cache: CachePolicy,
    fallback: Option<&'static str>,
    body: Bytes,
) -> Response {
    let mut response = (StatusCode::OK, Body::from(body)).into_response();
    let headers = response.headers_mut();

    headers.insert(CONTENT_TYPE, content_type);
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(CONTENT_SECURITY_POLICY, HeaderValue::from_static(IMAGE_CSP));

    if let Ok(value) = HeaderValue::from_str(&cache.header_value()) {
        headers.insert(CACHE_CONTROL, value);
    }

    if let Some(code) = fallback {
        headers.insert(X_IMAGE_FALLBACK, HeaderValue::from_static(code));
    }

    response
}
