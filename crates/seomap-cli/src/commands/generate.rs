//! Generate command implementation

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use seomap_core::{Config, SitemapKind};
use tracing::info;

use super::Deployment;

/// Execute the generate command
///
/// The plain sitemap triggers a regeneration pass. Media scans queued by that
/// pass are drained before returning unless `no_scan` is set.
pub async fn execute(
    config: Config,
    catalog: &Path,
    site: &str,
    kind: SitemapKind,
    output: Option<&Path>,
    no_scan: bool,
) -> Result<()> {
    let Deployment {
        catalog,
        service,
        queue,
        scans,
    } = Deployment::open(config, catalog)?;
    let site = catalog.site(site)?;

    let document = service
        .generate(kind, site)
        .with_context(|| format!("Failed to generate {kind} for site '{}'", site.code))?;

    queue.close();
    if no_scan {
        info!("skipping queued media scans");
    } else {
        let summary = service.scan_worker().run(scans).await;
        if summary.total() > 0 {
            eprintln!(
                "{} {} scanned, {} abandoned, {} failed",
                "Media:".bold(),
                summary.completed,
                summary.abandoned,
                summary.failed
            );
        }
    }

    match output {
        Some(path) => {
            fs::write(path, &document)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} {}", "Wrote".green(), path.display());
        },
        None => print!("{document}"),
    }

    Ok(())
}
