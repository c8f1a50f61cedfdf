//! Scan command implementation

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use seomap_core::{Config, ScanOutcome};
use serde_json::json;

use super::Deployment;
use crate::output::{OutputFormat, print_json};

/// Execute the scan command
pub async fn execute(config: Config, catalog: &Path, loc: &str, format: OutputFormat) -> Result<()> {
    let deployment = Deployment::open(config, catalog)?;
    let outcome = deployment.service.execute(loc).await?;

    match format {
        OutputFormat::Text => print_text_format(loc, &outcome),
        OutputFormat::Json => print_json(&outcome_json(loc, &outcome))?,
    }

    Ok(())
}

fn print_text_format(loc: &str, outcome: &ScanOutcome) {
    match outcome {
        ScanOutcome::Synced {
            items,
            images,
            videos,
        } => {
            println!("{} {loc}", "Scanned".green());
            println!("  items updated: {items}");
            if let Some(images) = images {
                println!("  images: {images}");
            }
            if let Some(videos) = videos {
                println!("  videos: {videos}");
            }
        },
        ScanOutcome::ItemMissing => {
            println!("{} no sitemap item at {loc}", "Skipped:".yellow());
        },
        ScanOutcome::Abandoned { reason } => {
            println!("{} {reason}", "Abandoned:".red());
        },
    }
}

fn outcome_json(loc: &str, outcome: &ScanOutcome) -> serde_json::Value {
    match outcome {
        ScanOutcome::Synced {
            items,
            images,
            videos,
        } => json!({
            "loc": loc,
            "status": "synced",
            "items": items,
            "images": images,
            "videos": videos,
        }),
        ScanOutcome::ItemMissing => json!({ "loc": loc, "status": "item_missing" }),
        ScanOutcome::Abandoned { reason } => {
            json!({ "loc": loc, "status": "abandoned", "reason": reason })
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_json_shapes() {
        let synced = outcome_json(
            "https://e.com/",
            &ScanOutcome::Synced {
                items: 2,
                images: Some(1),
                videos: None,
            },
        );
        assert_eq!(synced["status"], "synced");
        assert_eq!(synced["images"], 1);
        assert!(synced["videos"].is_null());

        let abandoned = outcome_json(
            "https://e.com/",
            &ScanOutcome::Abandoned {
                reason: "Timeout: render".to_string(),
            },
        );
        assert_eq!(abandoned["reason"], "Timeout: render");
    }
}
