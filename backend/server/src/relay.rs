//! # Upload Relay
//!
//! Forwards `/api/uploaded-images/<path...>` to the backend's static upload area.
//!
//! The path comes straight from the browser's URL, so every segment is checked
//! before an upstream URL is built:
//! - `..` anywhere in a segment is rejected
//! - `.`, backslashes and NUL bytes are rejected
//! - empty segments (`a//b`) are skipped
//!
//! Rejected paths never reach the backend.
use tracing::warn;
use url::Url;

use crate::{
    error::FetchError,
    fetch::{FetchOutcome, ImageFetcher},
};

#[derive(Debug, Clone)]
pub struct UploadRelay {
    fetcher: ImageFetcher,
    root: Url,
}

impl UploadRelay {
    /// `upload_root` is the backend directory relayed paths are resolved under, e.g. `uploads`.
    pub fn new(fetcher: ImageFetcher, backend_origin: &Url, upload_root: &str) -> Self {
        let mut root = backend_origin.clone();
        root.set_query(None);
        root.set_fragment(None);

        if let Ok(mut segments) = root.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(upload_root.split('/').filter(|s| !s.is_empty()));
        }

        Self { fetcher, root }
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    pub fn upstream_url(&self, path: &str) -> Result<Url, FetchError> {
        let segments = relay_segments(path)?;

        let mut url = self.root.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidPath(path.to_string()))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    pub async fn relay(&self, path: &str) -> FetchOutcome {
        let url = match self.upstream_url(path) {
            Ok(url) => url,
            Err(e) => {
                warn!("Refusing to relay {path:?}: {e}");
                return FetchOutcome::FallbackRequired(e);
            }
        };

        self.fetcher.fetch(url).await.into()
    }
}

fn relay_segments(path: &str) -> Result<Vec<&str>, FetchError> {
    let mut segments = Vec::new();

    for segment in path.split('/') {
        if segment.is_empty() {
            continue;
        }

        if segment == "."
            || segment.contains("..")
            || segment.contains('\\')
            || segment.contains('\0')
        {
            return Err(FetchError::InvalidPath(path.to_string()));
        }

        segments.push(segment);
    }

    if segments.is_empty() {
        return Err(FetchError::InvalidPath(path.to_string()));
    }

    Ok(segments)
}
