//! Synthetic page rendering for media scans.
//!
//! Each scan builds its own [`RenderContext`] and hands it to the renderer.
//! Nothing about the render is stored in shared state, so concurrent scans
//! cannot observe each other's site or request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT_LANGUAGE;
use tracing::debug;
use url::Url;

use crate::{Error, Result};

/// Per-scan render input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    /// Site the item belongs to.
    pub site: String,
    /// Locale of that site, if any.
    pub locale: Option<String>,
    /// Absolute URL being rendered.
    pub url: String,
    /// Path component of `url`, `/` when empty.
    pub path: String,
}

impl RenderContext {
    /// Build a context for `loc` in `site`.
    pub fn for_loc(site: &str, locale: Option<&str>, loc: &str) -> Result<Self> {
        let parsed = Url::parse(loc).map_err(|e| Error::InvalidUrl(format!("{loc}: {e}")))?;
        let path = match parsed.path() {
            "" => "/".to_string(),
            p => p.to_string(),
        };

        Ok(Self {
            site: site.to_string(),
            locale: locale.map(str::to_string),
            url: loc.to_string(),
            path,
        })
    }
}

/// Output of a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub status: u16,
    pub body: String,
}

impl RenderedPage {
    /// A 200 response with `body`.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// Renders a page to HTML.
///
/// Implementations return non-200 statuses as values; only transport-level
/// problems are errors.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render the page described by `ctx`.
    async fn render(&self, ctx: &RenderContext) -> Result<RenderedPage>;
}

/// Renderer that fetches the page over HTTP.
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    /// Renderer with the default 30 second timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Renderer with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("outfitter-seomap/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(Error::Network)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(&self, ctx: &RenderContext) -> Result<RenderedPage> {
        let mut request = self.client.get(&ctx.url);
        if let Some(locale) = &ctx.locale {
            request = request.header(ACCEPT_LANGUAGE, locale.as_str());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!(url = %ctx.url, status, bytes = body.len(), "rendered page");
        Ok(RenderedPage { status, body })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_context_for_loc() {
        let ctx = RenderContext::for_loc("en", None, "https://example.com/blog/post?x=1").unwrap();
        assert_eq!(ctx.path, "/blog/post");
        assert_eq!(ctx.site, "en");

        let root = RenderContext::for_loc("en", Some("en"), "https://example.com").unwrap();
        assert_eq!(root.path, "/");

        assert!(matches!(
            RenderContext::for_loc("en", None, "not a url"),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_http_renderer_returns_status_and_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("accept-language", "pl"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<img src=\"/a.png\">"))
            .mount(&mock_server)
            .await;

        let renderer = HttpRenderer::new().unwrap();
        let url = format!("{}/page", mock_server.uri());
        let ctx = RenderContext::for_loc("pl", Some("pl"), &url).unwrap();

        let page = renderer.render(&ctx).await.unwrap();
        assert_eq!(page.status, 200);
        assert!(page.body.contains("a.png"));
    }

    #[tokio::test]
    async fn test_http_renderer_passes_through_errors_as_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let renderer = HttpRenderer::new().unwrap();
        let url = format!("{}/missing", mock_server.uri());
        let ctx = RenderContext::for_loc("en", None, &url).unwrap();

        let page = renderer.render(&ctx).await.unwrap();
        assert_eq!(page.status, 404);
    }
}
