//! Per-site sitemap regeneration.
//!
//! A run walks every eligible page, refreshes the stored items of pages whose
//! content changed, removes items of pages that disappeared and returns the
//! enabled item set for serialization.
//!
//! ## Run order
//!
//! 1. CMS pages enabled for the site (locale overrides win), stable-sorted by
//!    descending priority, then static pages enabled in the sitemap.
//! 2. Unchanged pages are skipped but still count as in use.
//! 3. A changed page is expanded into one location per model record (or a
//!    single location), persisted, and stale items of that page are removed.
//!    A media scan is requested for each location.
//! 4. [`SitemapHooks::before_clearing`] may protect extra base file names,
//!    then every other item of the site is deleted and orphaned media purged.
//! 5. [`SitemapHooks::items`] may adjust the final enabled item set.
//!
//! A failing page is logged and skipped. Locations are resolved before any
//! write, so a resolution failure leaves the page's stored items alone. The
//! content hash of a failed page is forgotten so the next run tries again.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::catalog::{ModelSource, PageCatalog, StaticPageCatalog};
use crate::change::ChangeDetector;
use crate::scan::MediaScanner;
use crate::store::SitemapStore;
use crate::types::{ItemAttributes, ModelScope, PageDefinition, SiteDefinition, SitemapItem};
use crate::url_pattern;
use crate::Result;

/// Extension points fired during a regeneration run.
///
/// Every method defaults to a no-op. Returning an error from
/// [`page_refreshed`](Self::page_refreshed) fails that page only; errors from
/// the other two abort the run.
pub trait SitemapHooks: Send + Sync {
    /// Called before stale items are deleted. Names added here are kept.
    fn before_clearing(
        &self,
        _site: &SiteDefinition,
        _base_file_names: &mut HashSet<String>,
    ) -> Result<()> {
        Ok(())
    }

    /// Called with the final enabled item set before it is returned.
    fn items(&self, _site: &SiteDefinition, _items: &mut Vec<SitemapItem>) -> Result<()> {
        Ok(())
    }

    /// Called after a changed page's items were persisted.
    fn page_refreshed(
        &self,
        _site: &SiteDefinition,
        _page: &PageDefinition,
        _items: &[SitemapItem],
    ) -> Result<()> {
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl SitemapHooks for NoopHooks {}

/// Outcome of one regeneration run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegenerationReport {
    /// Enabled items of the site after the run, as adjusted by hooks.
    pub items: Vec<SitemapItem>,
    /// Changed pages whose items were rewritten.
    pub refreshed: usize,
    /// Pages skipped because their content did not change.
    pub unchanged: usize,
    /// Changed pages that failed and were left untouched.
    pub failed: usize,
    /// Media scans newly queued.
    pub scans_requested: usize,
}

/// Where a page came from; static pages never expand through models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageKind {
    Cms,
    Static,
}

/// Regenerates the sitemap items of a site.
pub struct PagesGenerator {
    store: Arc<SitemapStore>,
    changes: Arc<ChangeDetector>,
    pages: Arc<dyn PageCatalog>,
    static_pages: Option<Arc<dyn StaticPageCatalog>>,
    models: Arc<dyn ModelSource>,
    scanner: Option<Arc<MediaScanner>>,
    hooks: Arc<dyn SitemapHooks>,
    base_url: String,
}

impl PagesGenerator {
    /// Generator without static pages, media scans or hooks.
    pub fn new(
        store: Arc<SitemapStore>,
        changes: Arc<ChangeDetector>,
        pages: Arc<dyn PageCatalog>,
        models: Arc<dyn ModelSource>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            changes,
            pages,
            static_pages: None,
            models,
            scanner: None,
            hooks: Arc::new(NoopHooks),
            base_url: base_url.into(),
        }
    }

    /// Also process static pages from `catalog`.
    #[must_use]
    pub fn with_static_pages(mut self, catalog: Arc<dyn StaticPageCatalog>) -> Self {
        self.static_pages = Some(catalog);
        self
    }

    /// Request media scans for refreshed locations through `scanner`.
    #[must_use]
    pub fn with_scanner(mut self, scanner: Arc<MediaScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    /// Install extension hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn SitemapHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Run a full regeneration pass for `site`.
    #[instrument(skip(self, site), fields(site = %site.code))]
    pub fn regenerate(&self, site: &SiteDefinition) -> Result<RegenerationReport> {
        let mut report = RegenerationReport::default();
        let mut in_use = HashSet::new();

        for (kind, page) in self.eligible_pages(site)? {
            in_use.insert(page.base_file_name.clone());

            if !self
                .changes
                .has_changed(&site.code, &page.base_file_name, &page.content)?
            {
                debug!(page = %page.base_file_name, "page unchanged, skipping");
                report.unchanged += 1;
                continue;
            }

            match self.refresh_page(site, kind, &page) {
                Ok(items) => {
                    report.refreshed += 1;
                    report.scans_requested += self.request_scans(&items);
                },
                Err(e) => {
                    warn!(
                        page = %page.base_file_name,
                        category = e.category(),
                        error = %e,
                        "failed to refresh sitemap items for page"
                    );
                    report.failed += 1;
                    if let Err(e) = self.changes.forget(&site.code, &page.base_file_name) {
                        warn!(page = %page.base_file_name, error = %e, "failed to forget content hash");
                    }
                },
            }
        }

        self.hooks.before_clearing(site, &mut in_use)?;
        let removed = self.store.reconcile(&site.code, &in_use)?;
        let orphaned = self.store.delete_orphaned_media()?;

        let mut items = self.store.list_enabled(&site.code)?;
        self.hooks.items(site, &mut items)?;
        report.items = items;

        info!(
            items = report.items.len(),
            refreshed = report.refreshed,
            unchanged = report.unchanged,
            failed = report.failed,
            removed,
            orphaned,
            scans = report.scans_requested,
            "sitemap regenerated"
        );
        Ok(report)
    }

    /// CMS pages by descending priority, followed by static pages.
    fn eligible_pages(&self, site: &SiteDefinition) -> Result<Vec<(PageKind, PageDefinition)>> {
        let mut cms: Vec<PageDefinition> = self
            .pages
            .pages()?
            .into_iter()
            .filter(|page| page.is_enabled_for(site))
            .collect();
        cms.sort_by(|a, b| b.priority.partial_cmp(&a.priority).unwrap_or(Ordering::Equal));

        let mut pages: Vec<(PageKind, PageDefinition)> =
            cms.into_iter().map(|page| (PageKind::Cms, page)).collect();

        if let Some(catalog) = &self.static_pages {
            pages.extend(
                catalog
                    .static_pages()?
                    .into_iter()
                    .filter(|page| page.enabled_in_sitemap)
                    .map(|page| (PageKind::Static, PageDefinition::from(page))),
            );
        }

        Ok(pages)
    }

    /// Rewrite the items of one changed page.
    ///
    /// Every location is resolved before anything is written, so a
    /// resolution failure leaves the page's stored items as they were.
    fn refresh_page(
        &self,
        site: &SiteDefinition,
        kind: PageKind,
        page: &PageDefinition,
    ) -> Result<Vec<SitemapItem>> {
        let planned = self.plan_items(site, kind, page)?;

        let mut items = Vec::with_capacity(planned.len());
        for (loc, attrs) in &planned {
            let item = self
                .store
                .upsert_for_page(&site.code, &page.base_file_name, loc, attrs)?;
            items.push(item);
        }

        let keep: Vec<u64> = items.iter().map(|item| item.id).collect();
        self.store
            .reconcile_for_single_page(&site.code, &page.base_file_name, &keep)?;

        self.hooks.page_refreshed(site, page, &items)?;
        debug!(page = %page.base_file_name, items = items.len(), "refreshed page");
        Ok(items)
    }

    /// Locations and attributes a page should produce.
    fn plan_items(
        &self,
        site: &SiteDefinition,
        kind: PageKind,
        page: &PageDefinition,
    ) -> Result<Vec<(String, ItemAttributes)>> {
        let pattern = url_pattern::build_pattern(page, site, &self.base_url);
        let page_lastmod = match kind {
            PageKind::Cms => Some(page.modified_at().unwrap_or_else(Utc::now)),
            PageKind::Static => page.modified_at(),
        };
        let attrs = |lastmod: Option<DateTime<Utc>>| ItemAttributes {
            lastmod,
            changefreq: page.changefreq,
            priority: page.priority,
        };

        let binding = match (kind, &page.model) {
            (PageKind::Cms, Some(binding)) if self.models.has_class(&binding.class) => binding,
            _ => return Ok(vec![(url_pattern::fill(&pattern, &[]), attrs(page_lastmod))]),
        };

        let scope = binding.scope.as_deref().and_then(ModelScope::parse);
        let records = self.models.records(&binding.class, scope.as_ref())?;

        records
            .iter()
            .filter(|record| !record.is_disabled())
            .map(|record| {
                let loc = url_pattern::resolve(&pattern, &binding.params, record)?;
                let lastmod = if binding.use_updated_at {
                    record.updated_at.or(page_lastmod)
                } else {
                    page_lastmod
                };
                Ok((loc, attrs(lastmod)))
            })
            .collect()
    }

    fn request_scans(&self, items: &[SitemapItem]) -> usize {
        let Some(scanner) = &self.scanner else {
            return 0;
        };

        items
            .iter()
            .filter(|item| match scanner.request_scan(&item.loc) {
                Ok(queued) => queued,
                Err(e) => {
                    warn!(loc = %item.loc, error = %e, "failed to request media scan");
                    false
                },
            })
            .count()
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
    use crate::catalog::{Catalog, ModelCollection, ScopeFilter};
    use crate::config::SitemapConfig;
    use crate::kv::MemoryKeyValueStore;
    use crate::scan::{ChannelScanQueue, HttpRenderer, PendingScanSet};
    use crate::types::{ModelBinding, ModelRecord, StaticPage};
    use crate::Error;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    const BASE: &str = "https://example.com";

    fn post(slug: &str) -> ModelRecord {
        ModelRecord::default().with_attribute("slug", slug)
    }

    fn blog_page() -> PageDefinition {
        let mut page = PageDefinition::new("blog-post.htm", "/blog/:slug");
        page.content = "v1".to_string();
        page.priority = Some(0.6);
        page.model = Some(ModelBinding {
            class: "Post".to_string(),
            scope: None,
            params: "slug:slug".to_string(),
            use_updated_at: false,
        });
        page
    }

    fn catalog(pages: Vec<PageDefinition>, posts: Vec<ModelRecord>) -> Catalog {
        let mut models = BTreeMap::new();
        models.insert(
            "Post".to_string(),
            ModelCollection {
                records: posts,
                scopes: BTreeMap::new(),
            },
        );
        Catalog {
            sites: vec![SiteDefinition::new("en")],
            pages,
            static_pages: Vec::new(),
            models,
        }
    }

    struct Harness {
        store: Arc<SitemapStore>,
        changes: Arc<ChangeDetector>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(SitemapStore::in_memory()),
                changes: Arc::new(ChangeDetector::new(Arc::new(MemoryKeyValueStore::new()))),
            }
        }

        fn generator(&self, catalog: Catalog) -> PagesGenerator {
            let catalog = Arc::new(catalog);
            PagesGenerator::new(
                Arc::clone(&self.store),
                Arc::clone(&self.changes),
                catalog.clone(),
                catalog,
                BASE,
            )
        }
    }

    fn locs(items: &[SitemapItem]) -> Vec<&str> {
        items.iter().map(|item| item.loc.as_str()).collect()
    }

    #[test]
    fn test_model_page_skips_disabled_records() {
        // Given: A listing page bound to 3 enabled and 1 disabled record
        let mut hidden = post("draft");
        hidden.enabled_in_sitemap = Some(false);
        let harness = Harness::new();
        let generator =
            harness.generator(catalog(vec![blog_page()], vec![post("a"), post("b"), post("c"), hidden]));

        // When: Regenerating
        let report = generator.regenerate(&SiteDefinition::new("en")).unwrap();

        // Then: Exactly 3 items with distinct locs and the page's base file name
        assert_eq!(
            locs(&report.items),
            vec![
                "https://example.com/blog/a",
                "https://example.com/blog/b",
                "https://example.com/blog/c"
            ]
        );
        assert!(report.items.iter().all(|item| item.base_file_name == "blog-post.htm"));
        assert_eq!(report.refreshed, 1);
    }

    #[test]
    fn test_unchanged_page_is_not_touched() {
        let harness = Harness::new();
        let site = SiteDefinition::new("en");
        harness
            .generator(catalog(vec![blog_page()], vec![post("a")]))
            .regenerate(&site)
            .unwrap();

        // Same content, but the data set gained a record
        let report = harness
            .generator(catalog(vec![blog_page()], vec![post("a"), post("b")]))
            .regenerate(&site)
            .unwrap();

        assert_eq!(report.unchanged, 1);
        assert_eq!(report.refreshed, 0);
        assert_eq!(locs(&report.items), vec!["https://example.com/blog/a"]);
    }

    #[test]
    fn test_removed_record_is_reconciled_on_change() {
        let harness = Harness::new();
        let site = SiteDefinition::new("en");
        harness
            .generator(catalog(vec![blog_page()], vec![post("a"), post("b")]))
            .regenerate(&site)
            .unwrap();

        let mut changed = blog_page();
        changed.content = "v2".to_string();
        let report = harness
            .generator(catalog(vec![changed], vec![post("b")]))
            .regenerate(&site)
            .unwrap();

        assert_eq!(locs(&report.items), vec!["https://example.com/blog/b"]);
    }

    #[test]
    fn test_removed_page_is_reconciled() {
        let harness = Harness::new();
        let site = SiteDefinition::new("en");
        let mut about = PageDefinition::new("about.htm", "/about");
        about.content = "about".to_string();
        harness
            .generator(catalog(vec![blog_page(), about], vec![post("a")]))
            .regenerate(&site)
            .unwrap();

        let report = harness
            .generator(catalog(vec![blog_page()], vec![post("a")]))
            .regenerate(&site)
            .unwrap();

        assert_eq!(locs(&report.items), vec!["https://example.com/blog/a"]);
        assert!(harness.store.find_by_loc("en", "https://example.com/about").unwrap().is_none());
    }

    #[test]
    fn test_malformed_page_fails_alone() {
        // Given: A stored item for the blog page from a good run
        let harness = Harness::new();
        let site = SiteDefinition::new("en");
        harness
            .generator(catalog(vec![blog_page()], vec![post("a")]))
            .regenerate(&site)
            .unwrap();

        // When: The page changes to a malformed parameter definition
        let mut broken = blog_page();
        broken.content = "v2".to_string();
        broken.model.as_mut().unwrap().params = "slug".to_string();
        let home = PageDefinition::new("home.htm", "/");
        let report = harness
            .generator(catalog(vec![broken.clone(), home], vec![post("a"), post("b")]))
            .regenerate(&site)
            .unwrap();

        // Then: Its prior items stay, the other page is processed
        assert_eq!(report.failed, 1);
        assert_eq!(report.refreshed, 1);
        assert_eq!(
            locs(&report.items),
            vec!["https://example.com/blog/a", "https://example.com/"]
        );
        // And the failed page is retried on the next run
        assert!(harness.changes.has_changed("en", "blog-post.htm", &broken.content).unwrap());
    }

    #[test]
    fn test_pages_without_model_yield_single_item() {
        let harness = Harness::new();
        let mut page = PageDefinition::new("category.htm", "/category/:slug/:page?");
        page.model = Some(ModelBinding {
            class: "Unknown".to_string(),
            scope: None,
            params: "slug:slug".to_string(),
            use_updated_at: false,
        });

        let report = harness
            .generator(catalog(vec![page], vec![]))
            .regenerate(&SiteDefinition::new("en"))
            .unwrap();

        assert_eq!(locs(&report.items), vec!["https://example.com/category/default"]);
    }

    #[test]
    fn test_ordering_and_eligibility() {
        let harness = Harness::new();
        let mut low = PageDefinition::new("low.htm", "/low");
        low.priority = Some(0.1);
        let mut high = PageDefinition::new("high.htm", "/high");
        high.priority = Some(0.9);
        let mut off = PageDefinition::new("off.htm", "/off");
        off.enabled_in_sitemap = false;
        let mut pl_only = PageDefinition::new("pl.htm", "/tylko-pl");
        pl_only.enabled_in_sitemap = false;
        pl_only.locale_enabled.insert("pl".to_string(), true);

        let mut cat = catalog(vec![low, off, high, pl_only], vec![]);
        cat.static_pages.push(StaticPage {
            file_name: "static/contact.htm".to_string(),
            url: "/contact".to_string(),
            content: String::new(),
            enabled_in_sitemap: true,
            priority: Some(1.0),
            changefreq: None,
            lastmod: Some("2024-02-01".to_string()),
            mtime: None,
            locale_urls: BTreeMap::new(),
        });
        let cat = Arc::new(cat);
        let generator = harness.generator((*cat).clone()).with_static_pages(cat);

        let report = generator.regenerate(&SiteDefinition::new("en")).unwrap();

        // Static pages come after CMS pages regardless of priority
        assert_eq!(
            locs(&report.items),
            vec![
                "https://example.com/high",
                "https://example.com/low",
                "https://example.com/contact"
            ]
        );
        let contact = &report.items[2];
        assert_eq!(
            contact.lastmod,
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap())
        );

        let mut pl = SiteDefinition::new("pl");
        pl.locale = Some("pl".to_string());
        let report = harness
            .generator(catalog(vec![PageDefinition::new("x.htm", "/x")], vec![]))
            .regenerate(&pl)
            .unwrap();
        assert_eq!(locs(&report.items), vec!["https://example.com/x"]);
    }

    #[test]
    fn test_scoped_records_and_updated_at() {
        let harness = Harness::new();
        let updated = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();
        let mut published = post("live").with_attribute("status", "published");
        published.updated_at = Some(updated);
        let draft = post("draft").with_attribute("status", "draft");

        let mut page = blog_page();
        page.lastmod = Some("2024-01-01".to_string());
        let binding = page.model.as_mut().unwrap();
        binding.scope = Some("withStatus:published".to_string());
        binding.use_updated_at = true;

        let mut cat = catalog(vec![page], vec![published, draft]);
        cat.models.get_mut("Post").unwrap().scopes.insert(
            "withStatus".to_string(),
            ScopeFilter {
                field: "status".to_string(),
                equals: None,
            },
        );

        let report = harness.generator(cat).regenerate(&SiteDefinition::new("en")).unwrap();

        assert_eq!(locs(&report.items), vec!["https://example.com/blog/live"]);
        assert_eq!(report.items[0].lastmod, Some(updated));
        assert_eq!(report.items[0].priority, Some(0.6));
    }

    #[test]
    fn test_unknown_scope_fails_page() {
        let harness = Harness::new();
        let mut page = blog_page();
        page.model.as_mut().unwrap().scope = Some("missing".to_string());

        let report = harness
            .generator(catalog(vec![page], vec![post("a")]))
            .regenerate(&SiteDefinition::new("en"))
            .unwrap();

        assert_eq!(report.failed, 1);
        assert!(report.items.is_empty());
    }

    #[derive(Default)]
    struct RecordingHooks {
        refreshed: Mutex<Vec<String>>,
    }

    impl SitemapHooks for RecordingHooks {
        fn before_clearing(&self, _site: &SiteDefinition, names: &mut HashSet<String>) -> Result<()> {
            names.insert("legacy.htm".to_string());
            Ok(())
        }

        fn items(&self, _site: &SiteDefinition, items: &mut Vec<SitemapItem>) -> Result<()> {
            items.retain(|item| !item.loc.ends_with("/hidden"));
            Ok(())
        }

        fn page_refreshed(
            &self,
            _site: &SiteDefinition,
            page: &PageDefinition,
            _items: &[SitemapItem],
        ) -> Result<()> {
            if page.base_file_name == "veto.htm" {
                return Err(Error::Hook("vetoed".to_string()));
            }
            self.refreshed.lock().unwrap().push(page.base_file_name.clone());
            Ok(())
        }
    }

    #[test]
    fn test_hooks_protect_filter_and_observe() {
        let harness = Harness::new();
        harness
            .store
            .upsert_for_page("en", "legacy.htm", "https://example.com/legacy", &ItemAttributes::default())
            .unwrap();

        let hooks = Arc::new(RecordingHooks::default());
        let pages = vec![
            PageDefinition::new("home.htm", "/"),
            PageDefinition::new("hidden.htm", "/hidden"),
            PageDefinition::new("veto.htm", "/veto"),
        ];
        let report = harness
            .generator(catalog(pages, vec![]))
            .with_hooks(hooks.clone())
            .regenerate(&SiteDefinition::new("en"))
            .unwrap();

        // The vetoed page was persisted before its hook failed, so its item stays
        assert_eq!(
            locs(&report.items),
            vec![
                "https://example.com/legacy",
                "https://example.com/",
                "https://example.com/veto"
            ]
        );
        assert_eq!(*hooks.refreshed.lock().unwrap(), vec!["home.htm", "hidden.htm"]);
        assert_eq!(report.failed, 1);
        assert!(harness.changes.has_changed("en", "veto.htm", "").unwrap());
    }

    #[test]
    fn test_refresh_requests_scans_once() {
        let harness = Harness::new();
        let (queue, mut rx) = ChannelScanQueue::new();
        let scanner = Arc::new(MediaScanner::new(
            Arc::clone(&harness.store),
            PendingScanSet::new(Arc::new(MemoryKeyValueStore::new())),
            Arc::new(queue),
            Arc::new(HttpRenderer::new().unwrap()),
            SitemapConfig {
                enable_images_sitemap: true,
                ..SitemapConfig::default()
            },
        ));

        let report = harness
            .generator(catalog(vec![blog_page()], vec![post("a"), post("b")]))
            .with_scanner(Arc::clone(&scanner))
            .regenerate(&SiteDefinition::new("en"))
            .unwrap();
        assert_eq!(report.scans_requested, 2);

        // A second changed run while scans are still pending queues nothing new
        let mut changed = blog_page();
        changed.content = "v2".to_string();
        let report = harness
            .generator(catalog(vec![changed], vec![post("a"), post("b")]))
            .with_scanner(scanner)
            .regenerate(&SiteDefinition::new("en"))
            .unwrap();
        assert_eq!(report.scans_requested, 0);

        assert_eq!(rx.try_recv().unwrap(), "https://example.com/blog/a");
        assert_eq!(rx.try_recv().unwrap(), "https://example.com/blog/b");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_route_prefix_and_localized_url() {
        let harness = Harness::new();
        let mut page = PageDefinition::new("about.htm", "/about");
        page.locale_urls.insert("de".to_string(), "/ueber-uns".to_string());
        let mut site = SiteDefinition::new("de");
        site.locale = Some("de".to_string());
        site.route_prefix = Some("/de".to_string());

        let report = harness.generator(catalog(vec![page], vec![])).regenerate(&site).unwrap();

        assert_eq!(locs(&report.items), vec!["https://example.com/de/ueber-uns"]);
        assert_eq!(report.items[0].site_id, "de");
    }
}
