//! # Proxy Fetcher
//!
//! Bounded upstream image fetches shared by the proxy and the upload relay.
//!
//! ## Discipline
//! - One deadline covers connect, headers and body, so a stalled upstream can never hold a request past it
//! - Browser-like `User-Agent` plus `Accept: image/*`, many image CDNs refuse default client identifiers
//! - Non-2xx bodies are dropped unread
//! - Missing or `application/octet-stream` content types are served as `image/jpeg`
//! - Bodies are streamed against a byte cap
//!
//! ## Cancellation
//! Everything here is a plain future. When axum drops a handler because the browser
//! went away, the in-flight upstream request is dropped with it.
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use imaging::{OriginClass, OriginPolicy, origin::parse_absolute};
use reqwest::{
    Client,
    header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue},
    redirect::Policy,
};
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use crate::{
    config::Config,
    error::FetchError,
    guard::{HostGuard, MAX_REDIRECTS},
};

pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(FetchedImage),
    FallbackRequired(FetchError),
}

impl From<Result<FetchedImage, FetchError>> for FetchOutcome {
    fn from(result: Result<FetchedImage, FetchError>) -> Self {
        match result {
            Ok(image) => FetchOutcome::Fetched(image),
            Err(e) => FetchOutcome::FallbackRequired(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: Client,
    timeout: Duration,
    max_bytes: usize,
}

impl ImageFetcher {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Self::with_redirects(config, Policy::limited(MAX_REDIRECTS))
    }

    pub fn with_redirects(config: &Config, redirects: Policy) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("image/*"));

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.upstream_timeout)
            .redirect(redirects)
            .build()?;

        Ok(Self {
            client,
            timeout: config.upstream_timeout,
            max_bytes: config.max_image_bytes,
        })
    }

    pub async fn fetch(&self, url: Url) -> Result<FetchedImage, FetchError> {
        match timeout(self.timeout, self.fetch_unbounded(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        }
    }

    async fn fetch_unbounded(&self, url: Url) -> Result<FetchedImage, FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UpstreamNon2xx(status));
        }

        let content_type = image_content_type(response.headers())?;

        let declared = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok());

        if declared.is_some_and(|length| length > self.max_bytes) {
            return Err(FetchError::TooLarge(self.max_bytes));
        }

        let mut body = BytesMut::with_capacity(declared.unwrap_or_default().min(self.max_bytes));
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::TooLarge(self.max_bytes));
            }

            body.extend_from_slice(&chunk);
        }

        debug!("Fetched {} bytes of {content_type}", body.len());

        Ok(FetchedImage {
            body: body.freeze(),
            content_type,
        })
    }
}

fn image_content_type(headers: &HeaderMap) -> Result<String, FetchError> {
    let Some(value) = headers.get(CONTENT_TYPE) else {
        return Ok(DEFAULT_CONTENT_TYPE.to_string());
    };

    let raw = value
        .to_str()
        .map_err(|_| FetchError::NotAnImage("non-ascii content type".to_string()))?
        .trim();

    let essence = raw
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence.is_empty() || essence == "application/octet-stream" {
        Ok(DEFAULT_CONTENT_TYPE.to_string())
    } else if essence.starts_with("image/") {
        Ok(raw.to_string())
    } else {
        Err(FetchError::NotAnImage(essence))
    }
}

/// Fetches arbitrary external images on behalf of the browser.
#[derive(Debug, Clone)]
pub struct ImageProxy {
    fetcher: ImageFetcher,
    policy: OriginPolicy,
    guard: HostGuard,
}

impl ImageProxy {
    /// The fetcher follows redirects through `guard` as well.
    pub fn new(
        config: &Config,
        policy: OriginPolicy,
        guard: HostGuard,
    ) -> Result<Self, reqwest::Error> {
        let fetcher = ImageFetcher::with_redirects(config, guard.redirect_policy())?;

        Ok(Self {
            fetcher,
            policy,
            guard,
        })
    }

    pub async fn fetch_external(&self, reference: &str) -> FetchOutcome {
        let reference = reference.trim();

        let url = match self.policy.classify(reference) {
            OriginClass::Invalid => None,
            _ => parse_absolute(reference),
        };

        let Some(url) = url else {
            return FetchOutcome::FallbackRequired(FetchError::MalformedReference(
                reference.to_string(),
            ));
        };

        if !self.guard.permits(&url) {
            return FetchOutcome::FallbackRequired(FetchError::ForbiddenHost(
                url.host_str().unwrap_or_default().to_string(),
            ));
        }

        self.fetcher.fetch(url).await.into()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use imaging::OriginPolicy;
    use mockito::{Matcher, Server};
    use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
    use tokio::net::TcpListener;
    use url::Url;

    use super::{FetchOutcome, ImageFetcher, ImageProxy, image_content_type};
    use crate::{config::Config, error::FetchError, guard::HostGuard};

    fn config(timeout: Duration) -> Config {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.upstream_timeout = timeout;
        config.max_image_bytes = 64;
        config
    }

    fn fetcher() -> ImageFetcher {
        ImageFetcher::new(&config(Duration::from_secs(5))).unwrap()
    }

    fn proxy(guard: HostGuard) -> ImageProxy {
        ImageProxy::new(&config(Duration::from_secs(5)), OriginPolicy::default(), guard).unwrap()
    }

    fn url(server: &Server, path: &str) -> Url {
        Url::parse(&format!("{}{path}", server.url())).unwrap()
    }

    #[tokio::test]
    async fn fetch_sends_browser_headers_and_keeps_content_type() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/photo.png")
            .match_header("accept", "image/*")
            .match_header("user-agent", Matcher::Regex("^Mozilla/5.0".to_string()))
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(b"\x89PNG")
            .create_async()
            .await;

        let image = fetcher().fetch(url(&server, "/photo.png")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(image.content_type, "image/png");
        assert_eq!(&image.body[..], b"\x89PNG");
    }

    #[tokio::test]
    async fn fetch_serves_generic_content_type_as_jpeg() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/octet")
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body("jpeg bytes")
            .create_async()
            .await;

        let image = fetcher().fetch(url(&server, "/octet")).await.unwrap();

        assert_eq!(image.content_type, "image/jpeg");
    }

    #[test]
    fn test_content_type_resolution() {
        let mut headers = HeaderMap::new();
        assert_eq!(image_content_type(&headers).unwrap(), "image/jpeg");

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/svg+xml; charset=utf-8"));
        assert_eq!(image_content_type(&headers).unwrap(), "image/svg+xml; charset=utf-8");

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("IMAGE/AVIF"));
        assert_eq!(image_content_type(&headers).unwrap(), "IMAGE/AVIF");

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert!(matches!(
            image_content_type(&headers),
            Err(FetchError::NotAnImage(ref essence)) if essence == "application/json"
        ));
    }

    #[tokio::test]
    async fn fetch_reports_upstream_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.jpg")
            .with_status(404)
            .with_body("<html>not found</html>")
            .create_async()
            .await;

        let error = fetcher().fetch(url(&server, "/missing.jpg")).await.unwrap_err();

        assert!(matches!(error, FetchError::UpstreamNon2xx(status) if status.as_u16() == 404));
    }

    #[tokio::test]
    async fn fetch_rejects_html_challenge_pages() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/photo.jpg")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<html>are you a robot?</html>")
            .create_async()
            .await;

        let error = fetcher().fetch(url(&server, "/photo.jpg")).await.unwrap_err();

        assert!(matches!(error, FetchError::NotAnImage(ref essence) if essence == "text/html"));
    }

    #[tokio::test]
    async fn fetch_caps_body_size() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/huge.jpg")
            .with_status(200)
            .with_header("content-type", "image/jpeg")
            .with_body(vec![0u8; 65])
            .create_async()
            .await;

        let error = fetcher().fetch(url(&server, "/huge.jpg")).await.unwrap_err();

        assert!(matches!(error, FetchError::TooLarge(64)));
    }

    #[tokio::test]
    async fn fetch_times_out_on_silent_upstream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        // accept and hold connections without ever answering
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let timeout = Duration::from_millis(300);
        let fetcher = ImageFetcher::new(&config(timeout)).unwrap();
        let target = Url::parse(&format!("http://{address}/slow.jpg")).unwrap();

        let started = Instant::now();
        let error = fetcher.fetch(target).await.unwrap_err();

        assert!(matches!(error, FetchError::Timeout(_)));
        assert!(started.elapsed() < timeout + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn fetch_reports_network_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let target = Url::parse(&format!("http://{address}/gone.jpg")).unwrap();
        let error = fetcher().fetch(target).await.unwrap_err();

        assert!(matches!(error, FetchError::Network(_)));
    }

    #[tokio::test]
    async fn proxy_rejects_malformed_references_without_fetching() {
        let proxy = proxy(HostGuard::default());

        for reference in ["not a url", "/uploads/a.jpg", "ftp://host/a.jpg", "   "] {
            let outcome = proxy.fetch_external(reference).await;

            assert!(matches!(
                outcome,
                FetchOutcome::FallbackRequired(FetchError::MalformedReference(_))
            ));
        }
    }

    #[tokio::test]
    async fn proxy_fetches_absolute_urls() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/a.webp")
            .with_status(200)
            .with_header("content-type", "image/webp")
            .with_body("webp")
            .create_async()
            .await;

        let outcome = proxy(HostGuard::allowing_loopback())
            .fetch_external(&format!("{}/a.webp", server.url()))
            .await;

        assert!(matches!(
            outcome,
            FetchOutcome::Fetched(ref image) if image.content_type == "image/webp"
        ));
    }

    #[tokio::test]
    async fn proxy_refuses_internal_hosts_without_fetching() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let proxy = proxy(HostGuard::default());

        for reference in [
            format!("{}/admin.png", server.url()),
            "http://169.254.169.254/latest/meta-data/".to_string(),
            "http://localhost:5000/uploads/a.jpg".to_string(),
        ] {
            let outcome = proxy.fetch_external(&reference).await;

            assert!(
                matches!(outcome, FetchOutcome::FallbackRequired(FetchError::ForbiddenHost(_))),
                "{reference}"
            );
        }

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn proxy_stops_redirects_into_internal_hosts() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/bounce.jpg")
            .with_status(302)
            .with_header("location", "http://169.254.169.254/latest/meta-data/")
            .create_async()
            .await;

        let outcome = proxy(HostGuard::allowing_loopback())
            .fetch_external(&format!("{}/bounce.jpg", server.url()))
            .await;

        assert!(matches!(
            outcome,
            FetchOutcome::FallbackRequired(FetchError::UpstreamNon2xx(status))
                if status.as_u16() == 302
        ));
    }
}
