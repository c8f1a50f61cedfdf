//! Command implementations for the seomap CLI
//!
//! Each command lives in its own submodule. [`Deployment`] assembles the
//! on-disk store, the content-hash cache and the scan queue the way every
//! command needs them.

mod generate;
mod list;
mod reset_cache;
mod scan;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use seomap_core::{
    Catalog, ChannelScanQueue, Config, ContentSources, FileKeyValueStore, HttpRenderer,
    SitemapService, SitemapStore,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

pub use generate::execute as generate;
pub use list::execute as list_items;
pub use reset_cache::execute as reset_cache;
pub use scan::execute as scan;

/// Load the configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load()?,
    };
    debug!(root = %config.paths.root.display(), base_url = %config.base_url, "configuration loaded");
    Ok(config)
}

/// A service bound to on-disk state plus the receiving end of its scan queue.
pub struct Deployment {
    pub catalog: Arc<Catalog>,
    pub service: SitemapService,
    pub queue: Arc<ChannelScanQueue>,
    pub scans: UnboundedReceiver<String>,
}

impl Deployment {
    /// Open persisted state under the configured data root and load `catalog`.
    pub fn open(config: Config, catalog: &Path) -> Result<Self> {
        let catalog = Catalog::load(catalog)
            .with_context(|| format!("Failed to load catalog {}", catalog.display()))?;
        let catalog = Arc::new(catalog);

        let store = SitemapStore::open(config.paths.store_file()).with_context(|| {
            format!("Failed to open item store {}", config.paths.store_file().display())
        })?;
        let cache = FileKeyValueStore::new(config.paths.cache_dir());
        let renderer = HttpRenderer::with_timeout(config.scan.timeout())?;
        let (queue, scans) = ChannelScanQueue::new();
        let queue = Arc::new(queue);

        let service = SitemapService::new(
            config,
            Arc::new(store),
            Arc::new(cache),
            ContentSources::from_catalog(Arc::clone(&catalog)),
            queue.clone(),
            Arc::new(renderer),
        );

        Ok(Self {
            catalog,
            service,
            queue,
            scans,
        })
    }
}
