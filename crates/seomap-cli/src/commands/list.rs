//! List command implementation

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use seomap_core::{Config, SitemapItem};

use super::Deployment;
use crate::output::{OutputFormat, print_json};

/// Execute the list command
pub fn execute(config: Config, catalog: &Path, site: &str, format: OutputFormat) -> Result<()> {
    let deployment = Deployment::open(config, catalog)?;
    let site = deployment.catalog.site(site)?;
    let items = deployment.service.store().list_enabled(&site.code)?;

    match format {
        OutputFormat::Text => print_text_format(&site.code, &items),
        OutputFormat::Json => print_json(&items)?,
    }

    Ok(())
}

fn print_text_format(site: &str, items: &[SitemapItem]) {
    if items.is_empty() {
        println!("No sitemap items stored for '{site}'. Use 'seomap generate' first.");
        return;
    }

    for item in items {
        println!("{} {}", item.loc.cyan(), format!("({})", item.base_file_name).bright_black());

        let mut details = Vec::new();
        if let Some(lastmod) = item.lastmod {
            details.push(format!("lastmod {}", lastmod.to_rfc3339()));
        }
        if let Some(changefreq) = item.changefreq {
            details.push(format!("changefreq {}", changefreq.as_str()));
        }
        if let Some(priority) = item.priority {
            details.push(format!("priority {priority}"));
        }
        if !details.is_empty() {
            println!("  {}", details.join(", "));
        }
    }

    println!("{} items", items.len());
}
