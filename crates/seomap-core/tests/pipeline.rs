//! End-to-end regeneration and media scan tests against on-disk state.

#![allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::disallowed_macros,
    clippy::unnecessary_wraps
)]

use std::sync::Arc;
use std::time::Duration;

use seomap_core::{
    Catalog, ChannelScanQueue, Config, ContentSources, FileKeyValueStore, HttpRenderer, MediaKind,
    ScanOutcome, SiteDefinition, SitemapConfig, SitemapKind, SitemapService, SitemapStore,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CATALOG: &str = r#"
[[sites]]
code = "en"

[[pages]]
base_file_name = "home.htm"
url = "/"
content = "home v1"
enabled_in_sitemap = true
priority = 1.0

[[pages]]
base_file_name = "blog-post.htm"
url = "/blog/:category/:slug?"
content = "post v1"
enabled_in_sitemap = true
priority = 0.5
model = { class = "Post", params = "category:category.slug|slug:slug" }

[[static_pages]]
file_name = "static/about.htm"
url = "/about"
enabled_in_sitemap = true

[[static_pages]]
file_name = "static/hidden.htm"
url = "/hidden"
enabled_in_sitemap = false

[[models.Post.records]]
attributes = { slug = "first" }
relations = { category = [{ attributes = { slug = "news" } }] }

[[models.Post.records]]
attributes = { slug = "second" }
relations = { category = [{ attributes = { slug = "news" } }] }

[[models.Post.records]]
attributes = { slug = "" }

[[models.Post.records]]
attributes = { slug = "secret" }
enabled_in_sitemap = false
"#;

const PAGE_HTML: &str = r#"<html><body>
  <img src="/img/cover.png">
  <div itemscope itemtype="https://schema.org/VideoObject">
    <meta itemprop="name" content="Intro">
    <meta itemprop="thumbnailUrl" content="/img/thumb.jpg">
  </div>
</body></html>"#;

struct Deployment {
    _dir: TempDir,
    service: SitemapService,
    queue: Arc<ChannelScanQueue>,
    rx: Option<tokio::sync::mpsc::UnboundedReceiver<String>>,
}

fn deploy(base_url: &str, dir: TempDir) -> Deployment {
    let catalog = Arc::new(Catalog::from_toml(CATALOG).unwrap());
    let mut config = Config {
        base_url: base_url.to_string(),
        sitemap: SitemapConfig {
            enable_images_sitemap: true,
            enable_videos_sitemap: true,
            enable_index_sitemap: true,
        },
        ..Config::default()
    };
    config.paths.root = dir.path().to_path_buf();
    config.scan.timeout_secs = 5;

    let (queue, rx) = ChannelScanQueue::new();
    let queue = Arc::new(queue);
    let service = SitemapService::new(
        config.clone(),
        Arc::new(SitemapStore::open(config.paths.store_file()).unwrap()),
        Arc::new(FileKeyValueStore::new(config.paths.cache_dir())),
        ContentSources::from_catalog(catalog),
        queue.clone(),
        Arc::new(HttpRenderer::with_timeout(Duration::from_secs(5)).unwrap()),
    );

    Deployment {
        _dir: dir,
        service,
        queue,
        rx: Some(rx),
    }
}

#[tokio::test]
async fn test_full_pipeline_with_media_scans() {
    // Given: A site whose pages all render the same media
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_HTML))
        .mount(&server)
        .await;
    let base = server.uri();
    let mut deployment = deploy(&base, TempDir::new().unwrap());
    let site = SiteDefinition::new("en");

    // When: Regenerating the sitemap
    let report = deployment.service.regenerate(&site).unwrap();

    // Then: Home, three enabled posts and the enabled static page are listed
    let locs: Vec<String> = report.items.iter().map(|item| item.loc.clone()).collect();
    assert_eq!(
        locs,
        vec![
            format!("{base}/"),
            format!("{base}/blog/news/first"),
            format!("{base}/blog/news/second"),
            format!("{base}/blog/default"),
            format!("{base}/about"),
        ]
    );
    assert_eq!(report.scans_requested, 5);

    // When: The worker drains the queued scans
    deployment.queue.close();
    let rx = deployment.rx.take().unwrap();
    let summary = deployment.service.scan_worker().run(rx).await;
    assert_eq!(summary.completed, 5);

    // Then: Media sitemaps reflect what the scans discovered
    let images = deployment.service.generate(SitemapKind::Images, &site).unwrap();
    assert_eq!(images.matches("<image:image>").count(), 5);
    assert!(images.contains(&format!("<image:loc>{base}/img/cover.png</image:loc>")));

    let videos = deployment.service.generate(SitemapKind::Videos, &site).unwrap();
    assert_eq!(videos.matches("<video:video>").count(), 5);
    assert!(videos.contains("<video:title>Intro</video:title>"));

    // Identical assets are shared between items
    assert_eq!(deployment.service.store().asset_count().unwrap(), 2);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_HTML))
        .mount(&server)
        .await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    let site = SiteDefinition::new("en");

    let first = deploy(&base, dir);
    first.service.regenerate(&site).unwrap();
    let outcome = first.service.execute(&format!("{base}/")).await.unwrap();
    assert!(matches!(outcome, ScanOutcome::Synced { .. }));

    // Reopen the persisted state from the same directory
    let store = SitemapStore::open(root.join("items.json")).unwrap();
    let home = store.find_by_loc("en", &format!("{base}/")).unwrap().unwrap();
    assert_eq!(store.media_for(home.id, MediaKind::Image).unwrap().len(), 1);

    // Content hashes persisted too: nothing is refreshed on the next run
    let cache = FileKeyValueStore::new(root.join("cache"));
    let changes = seomap_core::ChangeDetector::new(Arc::new(cache));
    assert!(!changes.has_changed("en", "home.htm", "home v1").unwrap());
    drop(first);
}

#[test]
fn test_undrained_scans_do_not_block_later_runs() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    let site = SiteDefinition::new("en");

    // Given: A run that queues scans and exits without draining them
    let first = deploy("https://example.com", dir);
    assert_eq!(first.service.regenerate(&site).unwrap().scans_requested, 5);
    let Deployment { _dir: dir, .. } = first;
    assert!(!root.join("cache/seomap.waiting_for_scan.json").exists());

    // When: A later run on the same data directory refreshes every page
    let mut second = deploy("https://example.com", dir);
    second.service.reset_change_cache().unwrap();
    let report = second.service.regenerate(&site).unwrap();

    // Then: Every location is queued for scanning again
    assert_eq!(report.refreshed, 3);
    assert_eq!(report.scans_requested, 5);
    let mut rx = second.rx.take().unwrap();
    assert_eq!(rx.try_recv().unwrap(), "https://example.com/");
}

#[tokio::test]
async fn test_failed_render_leaves_media_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let base = server.uri();
    let deployment = deploy(&base, TempDir::new().unwrap());
    let site = SiteDefinition::new("en");
    deployment.service.regenerate(&site).unwrap();

    let outcome = deployment.service.execute(&format!("{base}/about")).await.unwrap();

    assert!(matches!(outcome, ScanOutcome::Abandoned { .. }));
    let images = deployment.service.generate(SitemapKind::Images, &site).unwrap();
    assert_eq!(images.matches("<image:image>").count(), 0);
}

#[test]
fn test_sitemap_document_and_index() {
    let deployment = deploy("https://example.com", TempDir::new().unwrap());
    let site = SiteDefinition::new("en");

    let xml = deployment.service.generate(SitemapKind::Sitemap, &site).unwrap();
    assert!(xml.contains("<loc>https://example.com/blog/news/first</loc>"));
    assert!(xml.contains("<priority>0.5</priority>"));
    assert!(!xml.contains("/hidden"));
    assert!(!xml.contains("secret"));

    let index = deployment.service.generate(SitemapKind::Index, &site).unwrap();
    assert!(index.contains("<loc>https://example.com/sitemap_images.xml</loc>"));
    assert!(index.contains("<loc>https://example.com/sitemap_videos.xml</loc>"));
}
