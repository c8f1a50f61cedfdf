//! Reset-cache command implementation

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use seomap_core::{ChangeDetector, Config, FileKeyValueStore};

/// Execute the reset-cache command
pub fn execute(config: &Config) -> Result<()> {
    let cache = FileKeyValueStore::new(config.paths.cache_dir());
    ChangeDetector::new(Arc::new(cache)).reset()?;

    println!("{} content hash cache", "Cleared".green());
    Ok(())
}
