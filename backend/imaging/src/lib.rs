//! # Imaging
//!
//! Shared image reference logic for the server and the browser component.
//!
//! Nothing in here performs I/O. Every function is a pure mapping from a stored
//! reference to a decision, so the same code answers "where should this image
//! come from" on both sides.
//!
//! ## Modules
//! - [`origin`]: classifies a reference as local, safe external, CORS-prone external or invalid
//! - [`builder`]: turns a reference into the concrete request path
//! - [`target`]: the resolved request target
//! - [`resolver`]: load/error state machine driving a single rendered image
pub mod builder;
pub mod origin;
pub mod resolver;
pub mod target;

pub use builder::{PLACEHOLDER_PATH, PROXY_PATH, RELAY_PATH, UrlBuilder, proxy_path};
pub use origin::{DEFAULT_CORS_PRONE_DOMAINS, OriginClass, OriginPolicy};
pub use resolver::{
    FALLBACK_IMAGE_PATH, ImageDisplay, ImageResolver, ImageSources, LoadEvent, LoadState,
};
pub use target::ResolvedTarget;
