//! Image delivery service for the Wayfare travel site.
//!
//! The site's pages and admin CMS store image references as plain strings. Those
//! point at our own uploads, at well-behaved CDNs, or at partner CDNs that refuse
//! cross-origin reads. This service is the part that makes every one of them render.
//!
//!
//!
//! # Endpoints
//! - `GET /api/proxy-image?url=<encoded>`: fetch an external image server-side and re-serve it with `Access-Control-Allow-Origin: *`
//! - `GET /api/uploaded-images/<path...>`: relay an uploaded asset from the backend's static area
//! - `GET /placeholder.svg`: the generated "Image not available" graphic
//!
//!
//!
//! # Always 200
//! Image routes never answer 4xx/5xx for upstream trouble. Timeouts, upstream
//! errors, network failures, traversal attempts and malformed references all
//! become the placeholder with a one hour cache, so an `<img>` tag never shows a
//! broken icon and never retries in a loop. The reason is exposed in the
//! `x-image-fallback` header for diagnostics.
//!
//! The proxy only reaches public hosts, internal addresses answer with the
//! `forbidden-host` placeholder.
//!
//! The only non-200 is a request missing its parameter entirely, which answers
//! 400 with a JSON error and fetches nothing.
//!
//!
//!
//! # Caching
//! - Real image bytes: `public, max-age=31536000, immutable`, the bytes behind a URL are treated as immutable
//! - Placeholders on failure: `public, max-age=3600`
//!
//!
//!
//! # Concurrency
//! Requests share nothing mutable. The only suspension point is the upstream
//! fetch, bounded by `UPSTREAM_TIMEOUT_SECS`. No de-duplication, no server cache,
//! browsers and CDNs cache via the headers above.
//!
//!
//!
//! # Setup
//!
//! Run locally.
//! ```sh
//! RUST_LOG=info BACKEND_ORIGIN=http://localhost:5000 cargo run -p backend
//! ```
//!
//! With per-request success logs.
//! ```sh
//! RUST_LOG=info cargo run -p backend --features server/verbose
//! ```
use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::get,
};
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod fetch;
pub mod guard;
pub mod placeholder;
pub mod relay;
pub mod response;
pub mod routes;
pub mod state;

use config::Config;
use imaging::{PLACEHOLDER_PATH, PROXY_PATH, RELAY_PATH};
use routes::{
    placeholder_handler, proxy_image_handler, uploaded_image_handler, uploaded_image_root_handler,
};
use state::AppState;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!(
        "Relaying uploads from {}, {} CORS-prone domains",
        config.backend_origin,
        config.cors_prone_domains.len()
    );

    info!("Initializing state...");
    let state = AppState::new(config).context("Failed to build upstream HTTP client")?;

    info!("Starting server...");
    let app = build_router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");

    Ok(())
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route(PROXY_PATH, get(proxy_image_handler))
        .route(RELAY_PATH, get(uploaded_image_root_handler))
        .route(&format!("{RELAY_PATH}/{{*path}}"), get(uploaded_image_handler))
        .route(PLACEHOLDER_PATH, get(placeholder_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
