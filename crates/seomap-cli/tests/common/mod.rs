#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use assert_cmd::Command;
use tempfile::TempDir;

#[allow(dead_code)]
pub const CMD_TIMEOUT: Duration = Duration::from_secs(15);

/// Catalog with a home page, a blog listing over two posts and a static page.
#[allow(dead_code)]
pub const CATALOG: &str = r#"
[[sites]]
code = "en"

[[pages]]
base_file_name = "home.htm"
url = "/"
content = "home"
enabled_in_sitemap = true
priority = 1.0

[[pages]]
base_file_name = "blog-post.htm"
url = "/blog/:slug"
content = "post"
enabled_in_sitemap = true
priority = 0.5
model = { class = "Post", params = "slug:slug" }

[[static_pages]]
file_name = "static/about.htm"
url = "/about"
enabled_in_sitemap = true

[[models.Post.records]]
attributes = { slug = "hello" }

[[models.Post.records]]
attributes = { slug = "world" }
"#;

/// Create a configured `seomap` command suitable for integration tests.
#[allow(dead_code)]
pub fn seomap_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("seomap"));
    cmd.timeout(CMD_TIMEOUT);
    cmd.env_remove("SEOMAP_CONFIG");
    cmd.env("NO_COLOR", "1");
    cmd
}

/// Isolated data root, config file and catalog for one test.
#[allow(dead_code)]
pub struct Workspace {
    pub dir: TempDir,
    pub config: PathBuf,
    pub catalog: PathBuf,
}

#[allow(dead_code)]
impl Workspace {
    /// Workspace serving `base_url` with the given `[sitemap]` toggles.
    pub fn new(base_url: &str, sitemap_toggles: &str) -> Self {
        let dir = tempfile::tempdir().expect("failed to create workspace dir");
        let root = dir.path().join("data");
        let config = dir.path().join("seomap.toml");
        let catalog = dir.path().join("content.toml");

        let config_toml = format!(
            "base_url = '{base_url}'\n\n[sitemap]\n{sitemap_toggles}\n\n[scan]\ntimeout_secs = 5\nconcurrency = 2\n\n[paths]\nroot = '{}'\n",
            root.display()
        );
        std::fs::write(&config, config_toml).unwrap();
        std::fs::write(&catalog, CATALOG).unwrap();

        Self {
            dir,
            config,
            catalog,
        }
    }

    /// `seomap` command with `--config` and `--catalog` prefilled for `subcommand`.
    pub fn cmd(&self, subcommand: &str) -> Command {
        let mut cmd = seomap_cmd();
        cmd.arg(subcommand).arg("--config").arg(&self.config);
        if subcommand != "reset-cache" {
            cmd.arg("--catalog").arg(&self.catalog);
        }
        cmd
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
