//! # Frontend Image Component
//!
//! How pages render a stored image reference.
//!
//! ## Resolution
//! - Every `<SafeImage>` builds an `ImageResolver` from its `src` prop
//! - CORS-prone partner URL: starts on `/api/proxy-image?url=...`
//! - Other external URL: loads directly, no proxy hop
//! - Local path: loads as-is, backend upload URLs go through `/api/uploaded-images/...`
//! - Empty: `/placeholder.svg`
//! - Unparseable: straight to the fallback stock image
//!
//! ## Events
//! - `onLoad` → `LoadEvent::Load`
//! - `onError` → `LoadEvent::Error`, if the resolver hands back a new source the `<img>` `src` is swapped
//! - Only one swap ever happens, to `/images/fallback-destination.jpg`
//! - If the fallback also fails, state is `ErroredFinal` and the component renders the skeleton with no `<img>`
//!
//! ## Prop changes
//! - A different `src` prop resets the resolver to `Loading`
//! - Same `src` keeps the current state, including a terminal error
//!
//! ## Skeleton
//! - Shown while `Loading` or `Errored`
//! - Stays forever in `ErroredFinal` so the layout never collapses
//!
//! ## Admin forms
//! - Upload preview uses the same component
//! - After an upload the form stores `/uploads/<folder>/<file>` and the preview re-resolves
