use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use reqwest::StatusCode as UpstreamStatus;
use serde_json::json;
use thiserror::Error;

/// Why an image could not be delivered. Always recovered into a placeholder.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Upstream did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Upstream answered {0}")]
    UpstreamNon2xx(UpstreamStatus),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Malformed reference: {0}")]
    MalformedReference(String),

    #[error("Refusing to fetch from {0}")]
    ForbiddenHost(String),

    #[error("Upstream sent {0} instead of an image")]
    NotAnImage(String),

    #[error("Upstream body exceeds {0} bytes")]
    TooLarge(usize),
}

impl FetchError {
    /// Short stable code for logs and the `x-image-fallback` header.
    pub fn code(&self) -> &'static str {
        match self {
            FetchError::Timeout(_) => "timeout",
            FetchError::UpstreamNon2xx(_) => "upstream-status",
            FetchError::Network(_) => "network",
            FetchError::InvalidPath(_) => "invalid-path",
            FetchError::MalformedReference(_) => "malformed-reference",
            FetchError::ForbiddenHost(_) => "forbidden-host",
            FetchError::NotAnImage(_) => "not-an-image",
            FetchError::TooLarge(_) => "too-large",
        }
    }

    pub(crate) fn from_reqwest(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            FetchError::Timeout(timeout)
        } else {
            // strip the url, it is already logged by the caller
            FetchError::Network(error.without_url().to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing required {0} parameter")]
    MissingParameter(&'static str),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MissingParameter { .. } => StatusCode::BAD_REQUEST,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
