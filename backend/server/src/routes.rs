use std::sync::Arc;

use axum::{
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    error::{AppError, FetchError},
    fetch::FetchOutcome,
    state::AppState,
};

#[derive(Deserialize)]
pub struct ProxyQuery {
    url: Option<String>,
}

pub async fn proxy_image_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ProxyQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    // a query that is present but unreadable, e.g. `url` given twice
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            let outcome = FetchOutcome::FallbackRequired(FetchError::MalformedReference(
                rejection.body_text(),
            ));

            return Ok(state.responder.respond("proxy-image", "<query>", outcome));
        }
    };

    let url = query
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or(AppError::MissingParameter("url"))?;

    let outcome = state.proxy.fetch_external(&url).await;

    Ok(state.responder.respond("proxy-image", &url, outcome))
}

pub async fn uploaded_image_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Response {
    let path = match path {
        Ok(Path(path)) => path,
        Err(rejection) => {
            let outcome =
                FetchOutcome::FallbackRequired(FetchError::InvalidPath(rejection.body_text()));

            return state.responder.respond("uploaded-images", "<path>", outcome);
        }
    };

    let outcome = state.relay.relay(&path).await;

    state.responder.respond("uploaded-images", &path, outcome)
}

pub async fn uploaded_image_root_handler() -> AppError {
    AppError::MissingParameter("path")
}

pub async fn placeholder_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.responder.placeholder_asset()
}
