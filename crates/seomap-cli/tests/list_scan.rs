#![allow(missing_docs, clippy::expect_used, clippy::unwrap_used)]

mod common;

use common::Workspace;
use predicates::prelude::*;
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn list_before_generate_is_empty() {
    let ws = Workspace::new("https://example.com", "");

    ws.cmd("list")
        .args(["--site", "en"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No sitemap items stored for 'en'"));
}

#[test]
fn list_json_reports_stored_items() {
    let ws = Workspace::new("https://example.com", "");
    ws.cmd("generate")
        .args(["--site", "en", "--no-scan"])
        .assert()
        .success();

    let output = ws
        .cmd("list")
        .args(["--site", "en", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let items: Value = serde_json::from_slice(&output.stdout).unwrap();
    let locs: Vec<&str> = items
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["loc"].as_str().unwrap())
        .collect();
    assert_eq!(
        locs,
        vec![
            "https://example.com/",
            "https://example.com/blog/hello",
            "https://example.com/blog/world",
            "https://example.com/about",
        ]
    );
    assert_eq!(items[1]["base_file_name"], "blog-post.htm");
}

#[test]
fn list_text_shows_item_details() {
    let ws = Workspace::new("https://example.com", "");
    ws.cmd("generate")
        .args(["--site", "en", "--no-scan"])
        .assert()
        .success();

    ws.cmd("list")
        .args(["--site", "en"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://example.com/blog/hello (blog-post.htm)"))
        .stdout(predicate::str::contains("priority 0.5"))
        .stdout(predicate::str::contains("4 items"));
}

#[tokio::test]
async fn scan_syncs_media_for_one_location() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div itemscope itemtype="https://schema.org/VideoObject">
                 <meta itemprop="name" content="Tour">
               </div>"#,
        ))
        .mount(&server)
        .await;
    let base = server.uri();
    let ws = Workspace::new(&base, "enable_videos_sitemap = true");
    ws.cmd("generate")
        .args(["--site", "en", "--no-scan"])
        .assert()
        .success();

    let output = ws
        .cmd("scan")
        .arg(format!("{base}/about"))
        .args(["--format", "json"])
        .output()?;
    assert!(output.status.success());
    let outcome: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(outcome["status"], "synced");
    assert_eq!(outcome["videos"], 1);
    assert!(outcome["images"].is_null());

    ws.cmd("generate")
        .args(["--site", "en", "--kind", "videos"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<video:title>Tour</video:title>"));

    Ok(())
}

#[test]
fn scan_unknown_location_is_skipped() {
    let ws = Workspace::new("https://example.com", "enable_images_sitemap = true");

    ws.cmd("scan")
        .arg("https://example.com/missing")
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipped: no sitemap item"));
}

#[test]
fn reset_cache_clears_content_hashes() {
    let ws = Workspace::new("https://example.com", "");
    ws.cmd("generate")
        .args(["--site", "en", "--no-scan"])
        .assert()
        .success();
    let hashes = ws.path().join("data/cache/seomap.pages_content_hashes.json");
    assert!(hashes.exists());

    ws.cmd("reset-cache")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared content hash cache"));

    assert!(!hashes.exists());
}
