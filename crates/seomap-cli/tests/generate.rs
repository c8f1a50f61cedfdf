#![allow(missing_docs, clippy::expect_used, clippy::unwrap_used)]

mod common;

use common::Workspace;
use predicates::prelude::*;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE_HTML: &str = r#"<html><body><img src="/img/cover.png"></body></html>"#;

#[test]
fn generate_prints_plain_sitemap() {
    let ws = Workspace::new("https://example.com", "");

    ws.cmd("generate")
        .args(["--site", "en", "--no-scan"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#))
        .stdout(predicate::str::contains("<loc>https://example.com/</loc>"))
        .stdout(predicate::str::contains("<loc>https://example.com/blog/hello</loc>"))
        .stdout(predicate::str::contains("<loc>https://example.com/blog/world</loc>"))
        .stdout(predicate::str::contains("<loc>https://example.com/about</loc>"))
        .stdout(predicate::str::contains("<priority>0.5</priority>"));
}

#[test]
fn generate_writes_output_file() {
    let ws = Workspace::new("https://example.com", "");
    let output = ws.path().join("sitemap.xml");

    ws.cmd("generate")
        .args(["--site", "en", "--output"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.contains("<urlset"));
    assert_eq!(written.matches("<url>").count(), 4);
}

#[tokio::test]
async fn generate_scans_media_for_image_sitemap() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_HTML))
        .mount(&server)
        .await;
    let base = server.uri();
    let ws = Workspace::new(&base, "enable_images_sitemap = true");

    // Regeneration queues a scan per item and drains them before exiting
    ws.cmd("generate")
        .args(["--site", "en"])
        .assert()
        .success()
        .stderr(predicate::str::contains("4 scanned"));

    ws.cmd("generate")
        .args(["--site", "en", "--kind", "images"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "<image:loc>{base}/img/cover.png</image:loc>"
        )));

    Ok(())
}

#[tokio::test]
async fn generate_after_skipped_scans_queues_them_again() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE_HTML))
        .mount(&server)
        .await;
    let ws = Workspace::new(&server.uri(), "enable_images_sitemap = true");

    // A run that skips its scans leaves nothing pending on disk
    ws.cmd("generate")
        .args(["--site", "en", "--no-scan"])
        .assert()
        .success();
    assert!(!ws.path().join("data/cache/seomap.waiting_for_scan.json").exists());

    ws.cmd("reset-cache").assert().success();

    ws.cmd("generate")
        .args(["--site", "en"])
        .assert()
        .success()
        .stderr(predicate::str::contains("4 scanned"));

    Ok(())
}

#[test]
fn generate_disabled_index_fails() {
    let ws = Workspace::new("https://example.com", "");

    ws.cmd("generate")
        .args(["--site", "en", "--kind", "index"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sitemap index is disabled"));
}

#[test]
fn generate_index_links_enabled_documents() {
    let ws = Workspace::new(
        "https://example.com",
        "enable_videos_sitemap = true\nenable_index_sitemap = true",
    );

    ws.cmd("generate")
        .args(["--site", "en", "--kind", "index"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<loc>https://example.com/sitemap.xml</loc>"))
        .stdout(predicate::str::contains("<loc>https://example.com/sitemap_videos.xml</loc>"))
        .stdout(predicate::str::contains("sitemap_images.xml").not());
}

#[test]
fn generate_unknown_site_fails() {
    let ws = Workspace::new("https://example.com", "");

    ws.cmd("generate")
        .args(["--site", "fr"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("site 'fr'"));
}
