//! Entry points exposed to the host application.
//!
//! [`SitemapService`] wires the generator, the item store, the change cache
//! and the media scanner together and serves the XML documents.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::catalog::{Catalog, ModelSource, PageCatalog, StaticPageCatalog};
use crate::change::ChangeDetector;
use crate::config::Config;
use crate::generator::{PagesGenerator, RegenerationReport, SitemapHooks};
use crate::kv::{KeyValueStore, MemoryKeyValueStore};
use crate::scan::{
    MediaScanner, PageRenderer, PendingScanSet, ScanOutcome, ScanQueue, ScanWorker,
};
use crate::store::SitemapStore;
use crate::types::{MediaKind, SiteDefinition};
use crate::{Error, Result, xml};

/// The sitemap documents a site can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SitemapKind {
    /// `sitemap.xml`
    Sitemap,
    /// `sitemap_images.xml`
    Images,
    /// `sitemap_videos.xml`
    Videos,
    /// `sitemap_index.xml`
    Index,
}

impl SitemapKind {
    /// Conventional file name of the document.
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Sitemap => "sitemap.xml",
            Self::Images => "sitemap_images.xml",
            Self::Videos => "sitemap_videos.xml",
            Self::Index => "sitemap_index.xml",
        }
    }
}

impl fmt::Display for SitemapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Content collaborators the service reads pages and records from.
#[derive(Clone)]
pub struct ContentSources {
    /// Sites the media scanner may render for.
    pub sites: Vec<SiteDefinition>,
    /// Dynamic-route pages.
    pub pages: Arc<dyn PageCatalog>,
    /// Static pages, when the host has any.
    pub static_pages: Option<Arc<dyn StaticPageCatalog>>,
    /// Records that expand listing pages.
    pub models: Arc<dyn ModelSource>,
}

impl ContentSources {
    /// Every source backed by one catalog.
    pub fn from_catalog(catalog: Arc<Catalog>) -> Self {
        Self {
            sites: catalog.sites.clone(),
            pages: catalog.clone(),
            static_pages: Some(catalog.clone()),
            models: catalog,
        }
    }
}

/// Sitemap generation and media scanning for one deployment.
pub struct SitemapService {
    config: Config,
    store: Arc<SitemapStore>,
    changes: Arc<ChangeDetector>,
    scanner: Arc<MediaScanner>,
    generator: PagesGenerator,
}

impl SitemapService {
    /// Assemble the service from its collaborators.
    ///
    /// Content hashes persist through `cache`. Pending scans are tracked in
    /// memory and die with the service, along with its queue.
    pub fn new(
        config: Config,
        store: Arc<SitemapStore>,
        cache: Arc<dyn KeyValueStore>,
        sources: ContentSources,
        queue: Arc<dyn ScanQueue>,
        renderer: Arc<dyn PageRenderer>,
    ) -> Self {
        let changes = Arc::new(ChangeDetector::new(cache));
        let scanner = Arc::new(
            MediaScanner::new(
                Arc::clone(&store),
                PendingScanSet::new(Arc::new(MemoryKeyValueStore::new())),
                queue,
                renderer,
                config.sitemap.clone(),
            )
            .with_timeout(config.scan.timeout())
            .with_sites(&sources.sites),
        );

        let mut generator = PagesGenerator::new(
            Arc::clone(&store),
            Arc::clone(&changes),
            sources.pages,
            sources.models,
            config.base_url.clone(),
        )
        .with_scanner(Arc::clone(&scanner));
        if let Some(static_pages) = sources.static_pages {
            generator = generator.with_static_pages(static_pages);
        }

        Self {
            config,
            store,
            changes,
            scanner,
            generator,
        }
    }

    /// Install extension hooks on the generator.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn SitemapHooks>) -> Self {
        self.generator = self.generator.with_hooks(hooks);
        self
    }

    /// Active configuration.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Underlying item store.
    pub fn store(&self) -> &Arc<SitemapStore> {
        &self.store
    }

    /// Run a regeneration pass without serializing.
    pub fn regenerate(&self, site: &SiteDefinition) -> Result<RegenerationReport> {
        self.generator.regenerate(site)
    }

    /// Regenerate `site` and serialize its plain sitemap.
    #[instrument(skip(self, site), fields(site = %site.code))]
    pub fn generate_sitemap(&self, site: &SiteDefinition) -> Result<String> {
        let report = self.generator.regenerate(site)?;
        xml::sitemap::render(&report.items)
    }

    /// Serialize the image sitemap from the stored media.
    pub fn generate_image_sitemap(&self, site: &SiteDefinition) -> Result<String> {
        if !self.config.sitemap.enable_images_sitemap {
            return Err(Error::NotFound("image sitemap is disabled".to_string()));
        }
        let entries = self.store.list_enabled_with_media(&site.code, MediaKind::Image)?;
        xml::images::render(&entries)
    }

    /// Serialize the video sitemap from the stored media.
    pub fn generate_video_sitemap(&self, site: &SiteDefinition) -> Result<String> {
        if !self.config.sitemap.enable_videos_sitemap {
            return Err(Error::NotFound("video sitemap is disabled".to_string()));
        }
        let entries = self.store.list_enabled_with_media(&site.code, MediaKind::Video)?;
        xml::videos::render(&entries)
    }

    /// Serialize the sitemap index linking the enabled documents of `site`.
    pub fn generate_sitemap_index(&self, site: &SiteDefinition) -> Result<String> {
        if !self.config.sitemap.enable_index_sitemap {
            return Err(Error::NotFound("sitemap index is disabled".to_string()));
        }

        let mut kinds = vec![SitemapKind::Sitemap];
        if self.config.sitemap.enable_images_sitemap {
            kinds.push(SitemapKind::Images);
        }
        if self.config.sitemap.enable_videos_sitemap {
            kinds.push(SitemapKind::Videos);
        }

        let base = self.config.base_url.trim_end_matches('/');
        let locs: Vec<String> = kinds
            .into_iter()
            .map(|kind| format!("{base}/{}", site.attach_route_prefix(kind.file_name())))
            .collect();
        xml::index::render(&locs)
    }

    /// Produce the document of `kind` for `site`.
    pub fn generate(&self, kind: SitemapKind, site: &SiteDefinition) -> Result<String> {
        match kind {
            SitemapKind::Sitemap => self.generate_sitemap(site),
            SitemapKind::Images => self.generate_image_sitemap(site),
            SitemapKind::Videos => self.generate_video_sitemap(site),
            SitemapKind::Index => self.generate_sitemap_index(site),
        }
    }

    /// Forget every content hash so the next run refreshes all pages.
    pub fn reset_change_cache(&self) -> Result<()> {
        self.changes.reset()?;
        info!("content hash cache cleared");
        Ok(())
    }

    /// Queue a media scan for `loc`. Returns whether one was queued.
    pub fn request_scan(&self, loc: &str) -> Result<bool> {
        self.scanner.request_scan(loc)
    }

    /// Run the media scan for `loc` now.
    pub async fn execute(&self, loc: &str) -> Result<ScanOutcome> {
        self.scanner.execute(loc).await
    }

    /// Worker draining queued scans with the configured concurrency.
    pub fn scan_worker(&self) -> ScanWorker {
        ScanWorker::new(Arc::clone(&self.scanner), self.config.scan.concurrency)
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
    use crate::config::SitemapConfig;
    use crate::scan::{ChannelScanQueue, RenderContext, RenderedPage};
    use crate::types::PageDefinition;
    use crate::xml::test_support::texts_of;
    use async_trait::async_trait;

    struct FixedRenderer;

    #[async_trait]
    impl PageRenderer for FixedRenderer {
        async fn render(&self, _ctx: &RenderContext) -> Result<RenderedPage> {
            Ok(RenderedPage::ok(r#"<img src="/cover.jpg">"#))
        }
    }

    fn service(sitemap: SitemapConfig) -> SitemapService {
        let catalog = Catalog {
            sites: vec![SiteDefinition::new("en")],
            pages: vec![PageDefinition::new("home.htm", "/")],
            ..Catalog::default()
        };
        let config = Config {
            base_url: "https://example.com/".to_string(),
            sitemap,
            ..Config::default()
        };
        let (queue, _rx) = ChannelScanQueue::new();
        SitemapService::new(
            config,
            Arc::new(SitemapStore::in_memory()),
            Arc::new(MemoryKeyValueStore::new()),
            ContentSources::from_catalog(Arc::new(catalog)),
            Arc::new(queue),
            Arc::new(FixedRenderer),
        )
    }

    #[test]
    fn test_kind_file_names() {
        assert_eq!(SitemapKind::Images.to_string(), "sitemap_images.xml");
        assert_eq!(SitemapKind::Index.file_name(), "sitemap_index.xml");
    }

    #[tokio::test]
    async fn test_generate_then_scan_then_image_sitemap() {
        let service = service(SitemapConfig {
            enable_images_sitemap: true,
            ..SitemapConfig::default()
        });
        let site = SiteDefinition::new("en");

        let xml = service.generate_sitemap(&site).unwrap();
        assert_eq!(texts_of(&xml, "loc"), vec!["https://example.com/"]);

        let outcome = service.execute("https://example.com/").await.unwrap();
        assert!(matches!(outcome, ScanOutcome::Synced { .. }));

        let images = service.generate_image_sitemap(&site).unwrap();
        assert_eq!(texts_of(&images, "image:loc"), vec!["https://example.com/cover.jpg"]);
    }

    #[test]
    fn test_disabled_variants_are_not_found() {
        let service = service(SitemapConfig::default());
        let site = SiteDefinition::new("en");

        assert!(matches!(service.generate_image_sitemap(&site), Err(Error::NotFound(_))));
        assert!(matches!(service.generate_video_sitemap(&site), Err(Error::NotFound(_))));
        assert!(matches!(service.generate_sitemap_index(&site), Err(Error::NotFound(_))));
        // No media sitemap means no scans are queued
        assert!(!service.request_scan("https://example.com/").unwrap());
    }

    #[test]
    fn test_sitemap_index_lists_enabled_documents() {
        let service = service(SitemapConfig {
            enable_videos_sitemap: true,
            enable_index_sitemap: true,
            ..SitemapConfig::default()
        });
        let mut site = SiteDefinition::new("de");
        site.route_prefix = Some("de".to_string());

        let xml = service.generate(SitemapKind::Index, &site).unwrap();

        assert_eq!(
            texts_of(&xml, "loc"),
            vec![
                "https://example.com/de/sitemap.xml",
                "https://example.com/de/sitemap_videos.xml"
            ]
        );
    }

    #[test]
    fn test_reset_change_cache_forces_refresh() {
        let service = service(SitemapConfig::default());
        let site = SiteDefinition::new("en");

        assert_eq!(service.regenerate(&site).unwrap().refreshed, 1);
        assert_eq!(service.regenerate(&site).unwrap().unchanged, 1);

        service.reset_change_cache().unwrap();
        assert_eq!(service.regenerate(&site).unwrap().refreshed, 1);
    }
}
