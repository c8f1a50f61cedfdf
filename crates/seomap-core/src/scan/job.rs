//! Media scan requests and execution.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::config::{ScanConfig, SitemapConfig};
use crate::scan::extract::{extract_images, extract_videos};
use crate::scan::pending::PendingScanSet;
use crate::scan::queue::ScanQueue;
use crate::scan::render::{PageRenderer, RenderContext};
use crate::store::SitemapStore;
use crate::types::{MediaKind, SiteDefinition};
use crate::{Error, Result};

/// How a scan ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Media was synced onto every item at the location.
    Synced {
        /// Number of items updated.
        items: usize,
        /// Images found, `None` when image sitemaps are disabled.
        images: Option<usize>,
        /// Videos found, `None` when video sitemaps are disabled.
        videos: Option<usize>,
    },
    /// No item is stored at the location any more.
    ItemMissing,
    /// Render failed, timed out or returned a non-200 status. Nothing was changed.
    Abandoned {
        /// Display form of the failure.
        reason: String,
    },
}

/// Discovers media on rendered pages and attaches it to sitemap items.
pub struct MediaScanner {
    store: Arc<SitemapStore>,
    pending: PendingScanSet,
    queue: Arc<dyn ScanQueue>,
    renderer: Arc<dyn PageRenderer>,
    settings: SitemapConfig,
    timeout: Duration,
    locales: HashMap<String, Option<String>>,
}

impl MediaScanner {
    /// Scanner with the default scan settings.
    pub fn new(
        store: Arc<SitemapStore>,
        pending: PendingScanSet,
        queue: Arc<dyn ScanQueue>,
        renderer: Arc<dyn PageRenderer>,
        settings: SitemapConfig,
    ) -> Self {
        Self {
            store,
            pending,
            queue,
            renderer,
            settings,
            timeout: ScanConfig::default().timeout(),
            locales: HashMap::new(),
        }
    }

    /// Override the execution timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register sites so renders carry the right locale.
    #[must_use]
    pub fn with_sites(mut self, sites: &[SiteDefinition]) -> Self {
        self.locales = sites
            .iter()
            .map(|site| (site.code.clone(), site.locale.clone()))
            .collect();
        self
    }

    /// Queue a scan of `loc` unless one is already pending.
    ///
    /// Does nothing when neither image nor video sitemaps are enabled.
    /// Returns whether a scan was queued.
    pub fn request_scan(&self, loc: &str) -> Result<bool> {
        if !self.settings.media_enabled() {
            return Ok(false);
        }

        if !self.pending.try_mark(loc)? {
            debug!(loc, "scan already pending");
            return Ok(false);
        }

        if let Err(e) = self.queue.enqueue(loc) {
            self.pending.unmark(loc)?;
            return Err(e);
        }

        debug!(loc, "queued media scan");
        Ok(true)
    }

    /// Run the scan for `loc`. The pending mark is always released.
    #[instrument(skip(self))]
    pub async fn execute(&self, loc: &str) -> Result<ScanOutcome> {
        let outcome = self.scan(loc).await;

        if let Err(e) = self.pending.unmark(loc) {
            warn!(loc, error = %e, "failed to release pending scan");
        }

        outcome
    }

    async fn scan(&self, loc: &str) -> Result<ScanOutcome> {
        let items = self.store.find_all_by_loc(loc)?;
        let Some(first) = items.first() else {
            debug!(loc, "no sitemap item for scanned location");
            return Ok(ScanOutcome::ItemMissing);
        };

        let locale = self.locales.get(&first.site_id).cloned().flatten();
        let ctx = match RenderContext::for_loc(&first.site_id, locale.as_deref(), loc) {
            Ok(ctx) => ctx,
            Err(e) => return Ok(abandon(loc, &e)),
        };

        let page = match tokio::time::timeout(self.timeout, self.renderer.render(&ctx)).await {
            Err(_) => {
                let err = Error::Timeout(format!(
                    "scan of {loc} exceeded {}s",
                    self.timeout.as_secs_f32()
                ));
                return Ok(abandon(loc, &err));
            },
            Ok(Err(e)) => {
                let err = Error::PageRenderFailure {
                    url: loc.to_string(),
                    reason: e.to_string(),
                };
                return Ok(abandon(loc, &err));
            },
            Ok(Ok(page)) => page,
        };

        if page.status != 200 {
            let err = Error::PageRenderFailure {
                url: loc.to_string(),
                reason: format!("status {}", page.status),
            };
            return Ok(abandon(loc, &err));
        }

        let images = self
            .settings
            .enable_images_sitemap
            .then(|| extract_images(&page.body, loc));
        let videos = self
            .settings
            .enable_videos_sitemap
            .then(|| extract_videos(&page.body));

        for item in &items {
            if let Some(images) = &images {
                self.store.sync_media(item.id, MediaKind::Image, images)?;
            }
            if let Some(videos) = &videos {
                self.store.sync_media(item.id, MediaKind::Video, videos)?;
            }
        }

        let outcome = ScanOutcome::Synced {
            items: items.len(),
            images: images.as_ref().map(Vec::len),
            videos: videos.as_ref().map(Vec::len),
        };
        info!(loc, ?outcome, "media scan finished");
        Ok(outcome)
    }
}

fn abandon(loc: &str, err: &Error) -> ScanOutcome {
    warn!(loc, category = err.category(), error = %err, "abandoning media scan");
    ScanOutcome::Abandoned {
        reason: err.to_string(),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::disallowed_macros,
    clippy::unnecessary_wraps
)]
mod tests {
    use super::*;
    use crate::kv::MemoryKeyValueStore;
    use crate::scan::queue::ChannelScanQueue;
    use crate::scan::render::RenderedPage;
    use crate::types::{ItemAttributes, MediaPayload};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::mpsc::UnboundedReceiver;

    const PAGE: &str = r#"<html><body>
        <img src="/hero.png">
        <div itemscope itemtype="https://schema.org/VideoObject">
            <meta itemprop="name" content="Demo">
        </div>
    </body></html>"#;

    /// Renderer returning canned responses and recording contexts.
    struct StubRenderer {
        status: u16,
        body: String,
        delay: Option<Duration>,
        seen: Mutex<Vec<RenderContext>>,
    }

    impl StubRenderer {
        fn new(status: u16, body: &str) -> Self {
            Self {
                status,
                body: body.to_string(),
                delay: None,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageRenderer for StubRenderer {
        async fn render(&self, ctx: &RenderContext) -> Result<RenderedPage> {
            self.seen.lock().unwrap().push(ctx.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.status == 0 {
                return Err(Error::Other("renderer exploded".to_string()));
            }
            Ok(RenderedPage {
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    struct Fixture {
        store: Arc<SitemapStore>,
        scanner: MediaScanner,
        rx: UnboundedReceiver<String>,
        renderer: Arc<StubRenderer>,
    }

    fn fixture(renderer: StubRenderer, images: bool, videos: bool) -> Fixture {
        let store = Arc::new(SitemapStore::in_memory());
        let (queue, rx) = ChannelScanQueue::new();
        let renderer = Arc::new(renderer);
        let settings = SitemapConfig {
            enable_images_sitemap: images,
            enable_videos_sitemap: videos,
            enable_index_sitemap: false,
        };
        let scanner = MediaScanner::new(
            Arc::clone(&store),
            PendingScanSet::new(Arc::new(MemoryKeyValueStore::new())),
            Arc::new(queue),
            renderer.clone(),
            settings,
        );
        Fixture {
            store,
            scanner,
            rx,
            renderer,
        }
    }

    fn seed(store: &SitemapStore, site: &str, loc: &str) -> u64 {
        store
            .upsert_for_page(site, "page.htm", loc, &ItemAttributes::default())
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_request_scan_deduplicates_until_executed() {
        // Given: Image sitemaps enabled
        let mut fx = fixture(StubRenderer::new(200, PAGE), true, false);
        seed(&fx.store, "en", "https://e.com/a");

        // When: Requesting twice before execution
        assert!(fx.scanner.request_scan("https://e.com/a").unwrap());
        assert!(!fx.scanner.request_scan("https://e.com/a").unwrap());

        // Then: Exactly one task was enqueued
        assert_eq!(fx.rx.recv().await.as_deref(), Some("https://e.com/a"));
        assert!(fx.rx.try_recv().is_err());

        // After execution the loc can be requested again
        fx.scanner.execute("https://e.com/a").await.unwrap();
        assert!(fx.scanner.request_scan("https://e.com/a").unwrap());
    }

    #[tokio::test]
    async fn test_request_scan_is_noop_without_media_sitemaps() {
        let mut fx = fixture(StubRenderer::new(200, PAGE), false, false);

        assert!(!fx.scanner.request_scan("https://e.com/a").unwrap());
        assert!(fx.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_execute_syncs_enabled_media_only() {
        let fx = fixture(StubRenderer::new(200, PAGE), true, false);
        let id = seed(&fx.store, "en", "https://e.com/blog");

        let outcome = fx.scanner.execute("https://e.com/blog").await.unwrap();

        assert_eq!(
            outcome,
            ScanOutcome::Synced {
                items: 1,
                images: Some(1),
                videos: None
            }
        );
        let images = fx.store.media_for(id, MediaKind::Image).unwrap();
        assert_eq!(images[0].payload, MediaPayload::image("https://e.com/hero.png"));
        assert!(fx.store.media_for(id, MediaKind::Video).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_execute_syncs_every_site_sharing_the_loc() {
        let fx = fixture(StubRenderer::new(200, PAGE), true, true);
        let en = seed(&fx.store, "en", "https://e.com/");
        let pl = seed(&fx.store, "pl", "https://e.com/");

        fx.scanner.execute("https://e.com/").await.unwrap();

        for id in [en, pl] {
            assert_eq!(fx.store.media_for(id, MediaKind::Image).unwrap().len(), 1);
            assert_eq!(fx.store.media_for(id, MediaKind::Video).unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_non_200_abandons_without_mutation() {
        let fx = fixture(StubRenderer::new(500, PAGE), true, true);
        let id = seed(&fx.store, "en", "https://e.com/a");
        fx.store
            .sync_media(id, MediaKind::Image, &[MediaPayload::image("https://e.com/old.png")])
            .unwrap();
        fx.scanner.request_scan("https://e.com/a").unwrap();

        let outcome = fx.scanner.execute("https://e.com/a").await.unwrap();

        assert!(matches!(outcome, ScanOutcome::Abandoned { reason } if reason.contains("500")));
        let images = fx.store.media_for(id, MediaKind::Image).unwrap();
        assert_eq!(images[0].payload, MediaPayload::image("https://e.com/old.png"));
        // The pending mark is released even on failure
        assert!(fx.scanner.request_scan("https://e.com/a").unwrap());
    }

    #[tokio::test]
    async fn test_render_error_abandons() {
        let fx = fixture(StubRenderer::new(0, ""), true, false);
        seed(&fx.store, "en", "https://e.com/a");

        let outcome = fx.scanner.execute("https://e.com/a").await.unwrap();
        assert!(
            matches!(outcome, ScanOutcome::Abandoned { reason } if reason.contains("renderer exploded"))
        );
    }

    #[tokio::test]
    async fn test_timeout_abandons() {
        let mut renderer = StubRenderer::new(200, PAGE);
        renderer.delay = Some(Duration::from_millis(200));
        let mut fx = fixture(renderer, true, false);
        fx.scanner = fx.scanner.with_timeout(Duration::from_millis(20));
        let id = seed(&fx.store, "en", "https://e.com/slow");

        let outcome = fx.scanner.execute("https://e.com/slow").await.unwrap();

        assert!(matches!(outcome, ScanOutcome::Abandoned { reason } if reason.contains("Timeout")));
        assert!(fx.store.media_for(id, MediaKind::Image).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_item_is_skipped() {
        let fx = fixture(StubRenderer::new(200, PAGE), true, false);

        let outcome = fx.scanner.execute("https://e.com/gone").await.unwrap();

        assert_eq!(outcome, ScanOutcome::ItemMissing);
        assert!(fx.renderer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_render_context_carries_site_locale() {
        let mut fx = fixture(StubRenderer::new(200, PAGE), true, false);
        let mut site = SiteDefinition::new("pl");
        site.locale = Some("pl".to_string());
        fx.scanner = fx.scanner.with_sites(&[site]);
        seed(&fx.store, "pl", "https://e.com/pl/blog");

        fx.scanner.execute("https://e.com/pl/blog").await.unwrap();

        let seen = fx.renderer.seen.lock().unwrap();
        assert_eq!(seen[0].locale.as_deref(), Some("pl"));
        assert_eq!(seen[0].path, "/pl/blog");
    }

    #[tokio::test]
    async fn test_empty_scan_clears_previous_media() {
        let fx = fixture(StubRenderer::new(200, "<p>no media</p>"), true, false);
        let id = seed(&fx.store, "en", "https://e.com/a");
        fx.store
            .sync_media(id, MediaKind::Image, &[MediaPayload::image("https://e.com/old.png")])
            .unwrap();

        fx.scanner.execute("https://e.com/a").await.unwrap();

        assert!(fx.store.media_for(id, MediaKind::Image).unwrap().is_empty());
    }
}
