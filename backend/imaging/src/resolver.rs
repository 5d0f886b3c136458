//! # Client Image Resolver
//!
//! Per-image load state for the browser component, kept free of any rendering
//! framework. The component forwards `load`/`error` events and re-renders from
//! [`ImageResolver::display`].
//!
//! ```text
//! Loading ──load──▶ Loaded
//!    │
//!  error (not on fallback)
//!    ▼
//! Errored ──load──▶ Loaded        (fallback stock image worked)
//!    │
//!  error
//!    ▼
//! ErroredFinal                    (terminal, no more requests)
//! ```
//!
//! Only one retry is ever made, against the fallback stock image. A new
//! reference resets everything to `Loading`.
use crate::{
    builder::{UrlBuilder, proxy_path},
    origin::OriginClass,
};

pub const FALLBACK_IMAGE_PATH: &str = "/images/fallback-destination.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Loaded,
    Errored,
    ErroredFinal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadEvent {
    Load,
    Error,
}

impl LoadState {
    /// `on_fallback` is whether the source that produced `event` is already the fallback image.
    pub fn next(self, event: LoadEvent, on_fallback: bool) -> Self {
        match (self, event) {
            (Self::ErroredFinal, _) => Self::ErroredFinal,
            (_, LoadEvent::Load) => Self::Loaded,
            (Self::Errored, LoadEvent::Error) => Self::ErroredFinal,
            (_, LoadEvent::Error) if on_fallback => Self::ErroredFinal,
            (_, LoadEvent::Error) => Self::Errored,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::ErroredFinal
    }
}

/// What the component should draw right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDisplay<'a> {
    /// Source for the `<img>` element, `None` once no more loads should be attempted.
    pub src: Option<&'a str>,
    /// Whether the loading skeleton stays visible.
    pub show_loading: bool,
}

/// Static inputs shared by every resolver on a page.
#[derive(Debug, Clone)]
pub struct ImageSources {
    pub builder: UrlBuilder,
    pub fallback_image: String,
}

impl ImageSources {
    pub fn new(builder: UrlBuilder) -> Self {
        Self {
            builder,
            fallback_image: FALLBACK_IMAGE_PATH.to_string(),
        }
    }

    pub fn with_fallback_image(mut self, path: impl Into<String>) -> Self {
        self.fallback_image = path.into();
        self
    }

    /// First source to try for `reference` and the state it starts in.
    ///
    /// CORS-prone hosts go straight to the proxy, other externals are tried directly.
    pub fn initial(&self, reference: Option<&str>) -> (LoadState, String) {
        let trimmed = reference.map(str::trim).unwrap_or_default();

        match self.builder.classify(trimmed) {
            OriginClass::CorsProneExternal => (LoadState::Loading, proxy_path(trimmed)),
            OriginClass::KnownSafeExternal => (LoadState::Loading, trimmed.to_string()),
            OriginClass::Local => (LoadState::Loading, self.builder.resolve(Some(trimmed))),
            OriginClass::Invalid => (LoadState::Errored, self.fallback_image.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResolver {
    reference: Option<String>,
    source: String,
    state: LoadState,
}

impl ImageResolver {
    pub fn new(sources: &ImageSources, reference: Option<&str>) -> Self {
        let (state, source) = sources.initial(reference);

        Self {
            reference: normalize(reference).map(str::to_string),
            source,
            state,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns `true` when the reference changed and the resolver was reset.
    /// Surrounding whitespace and blank-vs-absent do not count as a change.
    pub fn set_reference(&mut self, sources: &ImageSources, reference: Option<&str>) -> bool {
        if self.reference.as_deref() == normalize(reference) {
            return false;
        }

        *self = Self::new(sources, reference);
        true
    }

    /// Applies a browser event. Returns the new source when another request must be made.
    pub fn handle(&mut self, sources: &ImageSources, event: LoadEvent) -> Option<&str> {
        let on_fallback = self.source == sources.fallback_image;
        let next = self.state.next(event, on_fallback);
        let switch = next == LoadState::Errored && !on_fallback;

        self.state = next;

        if switch {
            self.source = sources.fallback_image.clone();
            Some(self.source.as_str())
        } else {
            None
        }
    }

    pub fn on_load(&mut self, sources: &ImageSources) {
        self.handle(sources, LoadEvent::Load);
    }

    pub fn on_error(&mut self, sources: &ImageSources) -> Option<&str> {
        self.handle(sources, LoadEvent::Error)
    }

    pub fn display(&self) -> ImageDisplay<'_> {
        match self.state {
            LoadState::Loaded => ImageDisplay {
                src: Some(self.source.as_str()),
                show_loading: false,
            },
            LoadState::Loading | LoadState::Errored => ImageDisplay {
                src: Some(self.source.as_str()),
                show_loading: true,
            },
            LoadState::ErroredFinal => ImageDisplay {
                src: None,
                show_loading: true,
            },
        }
    }
}

fn normalize(reference: Option<&str>) -> Option<&str> {
    reference.map(str::trim).filter(|reference| !reference.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{FALLBACK_IMAGE_PATH, ImageResolver, ImageSources, LoadEvent, LoadState};
    use crate::{builder::UrlBuilder, origin::OriginPolicy};

    fn sources() -> ImageSources {
        ImageSources::new(UrlBuilder::new(OriginPolicy::new(["travel-assets.com"])))
    }

    #[test]
    fn test_transition_table() {
        use LoadEvent::{Error, Load};
        use LoadState::*;

        assert_eq!(Loading.next(Load, false), Loaded);
        assert_eq!(Loading.next(Error, false), Errored);
        assert_eq!(Loading.next(Error, true), ErroredFinal);
        assert_eq!(Errored.next(Load, true), Loaded);
        assert_eq!(Errored.next(Error, true), ErroredFinal);
        assert_eq!(Loaded.next(Error, false), Errored);
        assert_eq!(ErroredFinal.next(Load, true), ErroredFinal);
        assert_eq!(ErroredFinal.next(Error, true), ErroredFinal);
    }

    #[test]
    fn test_cors_prone_starts_on_proxy() {
        let resolver = ImageResolver::new(&sources(), Some("https://a.travel-assets.com/photo.jpg"));

        assert_eq!(resolver.state(), LoadState::Loading);
        assert_eq!(
            resolver.source(),
            "/api/proxy-image?url=https%3A%2F%2Fa.travel-assets.com%2Fphoto.jpg"
        );
    }

    #[test]
    fn test_safe_external_and_local_load_directly() {
        let sources = sources();

        let external = ImageResolver::new(&sources, Some("https://images.unsplash.com/p.jpg"));
        assert_eq!(external.source(), "https://images.unsplash.com/p.jpg");

        let local = ImageResolver::new(&sources, Some("/uploads/packages/1.jpg"));
        assert_eq!(local.source(), "/uploads/packages/1.jpg");
    }

    #[test]
    fn test_single_fallback_then_terminal() {
        let sources = sources();
        let mut resolver = ImageResolver::new(&sources, Some("https://images.unsplash.com/gone.jpg"));

        assert_eq!(resolver.on_error(&sources), Some(FALLBACK_IMAGE_PATH));
        assert_eq!(resolver.state(), LoadState::Errored);
        assert!(resolver.display().show_loading);

        assert_eq!(resolver.on_error(&sources), None);
        assert_eq!(resolver.state(), LoadState::ErroredFinal);

        let display = resolver.display();
        assert_eq!(display.src, None);
        assert!(display.show_loading);

        assert_eq!(resolver.on_error(&sources), None);
        resolver.on_load(&sources);
        assert_eq!(resolver.state(), LoadState::ErroredFinal);
    }

    #[test]
    fn test_fallback_can_recover() {
        let sources = sources();
        let mut resolver = ImageResolver::new(&sources, Some("/uploads/missing.jpg"));

        resolver.on_error(&sources);
        resolver.on_load(&sources);

        assert_eq!(resolver.state(), LoadState::Loaded);
        assert_eq!(resolver.display().src, Some(FALLBACK_IMAGE_PATH));
        assert!(!resolver.display().show_loading);
    }

    #[test]
    fn test_reference_change_resets_state() {
        let sources = sources();
        let mut resolver = ImageResolver::new(&sources, Some("/uploads/a.jpg"));

        resolver.on_error(&sources);
        resolver.on_error(&sources);
        assert!(resolver.state().is_terminal());

        assert!(!resolver.set_reference(&sources, Some("/uploads/a.jpg")));
        assert!(resolver.state().is_terminal());

        assert!(resolver.set_reference(&sources, Some("/uploads/b.jpg")));
        assert_eq!(resolver.state(), LoadState::Loading);
        assert_eq!(resolver.source(), "/uploads/b.jpg");
    }

    #[test]
    fn test_whitespace_only_change_keeps_state() {
        let sources = sources();
        let mut resolver = ImageResolver::new(&sources, Some(" /uploads/a.jpg"));

        resolver.on_error(&sources);
        resolver.on_error(&sources);
        assert!(resolver.state().is_terminal());

        assert!(!resolver.set_reference(&sources, Some("/uploads/a.jpg")));
        assert!(!resolver.set_reference(&sources, Some("/uploads/a.jpg\n")));
        assert!(resolver.state().is_terminal());

        let mut empty = ImageResolver::new(&sources, None);
        assert!(!empty.set_reference(&sources, Some("  ")));
    }

    #[test]
    fn test_fallback_as_reference_fails_once() {
        let sources = sources();
        let mut resolver = ImageResolver::new(&sources, Some(FALLBACK_IMAGE_PATH));

        assert_eq!(resolver.on_error(&sources), None);
        assert_eq!(resolver.state(), LoadState::ErroredFinal);
    }

    #[test]
    fn test_invalid_reference_starts_on_fallback() {
        let sources = sources().with_fallback_image("/img/default.jpg");
        let mut resolver = ImageResolver::new(&sources, Some("::not a url::"));

        assert_eq!(resolver.state(), LoadState::Errored);
        assert_eq!(resolver.source(), "/img/default.jpg");

        assert_eq!(resolver.on_error(&sources), None);
        assert_eq!(resolver.state(), LoadState::ErroredFinal);
    }

    #[test]
    fn test_empty_reference_uses_placeholder_asset() {
        let resolver = ImageResolver::new(&sources(), None);

        assert_eq!(resolver.state(), LoadState::Loading);
        assert_eq!(resolver.source(), "/placeholder.svg");
    }
}
