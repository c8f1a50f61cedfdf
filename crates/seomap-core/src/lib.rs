//! # seomap-core
//!
//! Core functionality for seomap - incremental sitemap generation for
//! multi-site content platforms, with image and video discovery.
//!
//! This crate keeps a persistent set of sitemap items in sync with a site's
//! pages, expands listing pages into one URL per model record, and scans the
//! rendered pages in the background to attach images and videos.
//!
//! ## Architecture
//!
//! The crate is organized around several key components:
//!
//! - **URL patterns** ([`url_pattern`]): route templates become absolute
//!   locations filled from model records
//! - **Change detection** ([`change`]): content hashes decide which pages are
//!   regenerated
//! - **Item store** ([`store`]): site-scoped sitemap items and their media
//! - **Generator** ([`generator`]): per-site regeneration with reconciliation
//!   of stale items and extension hooks
//! - **Media scans** ([`scan`]): deduplicated, queued, bounded-concurrency
//!   discovery of `<img>` and `VideoObject` microdata
//! - **Serializers** ([`xml`]): plain, image, video and index sitemaps
//! - **Error Handling**: Comprehensive error types with categorization and recovery hints
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use seomap_core::{
//!     Catalog, ChangeDetector, MemoryKeyValueStore, PageDefinition, PagesGenerator,
//!     SiteDefinition, SitemapStore,
//! };
//!
//! let catalog = Arc::new(Catalog {
//!     pages: vec![PageDefinition::new("home.htm", "/")],
//!     ..Catalog::default()
//! });
//! let generator = PagesGenerator::new(
//!     Arc::new(SitemapStore::in_memory()),
//!     Arc::new(ChangeDetector::new(Arc::new(MemoryKeyValueStore::new()))),
//!     catalog.clone(),
//!     catalog,
//!     "https://example.com",
//! );
//!
//! let report = generator.regenerate(&SiteDefinition::new("en"))?;
//! let xml = seomap_core::xml::sitemap::render(&report.items)?;
//! assert!(xml.contains("<loc>https://example.com/</loc>"));
//! # Ok::<(), seomap_core::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`] with structured error information:
//!
//! ```rust
//! use seomap_core::{Error, ModelRecord, url_pattern};
//!
//! match url_pattern::resolve("https://e.com/:slug", "slug", &ModelRecord::default()) {
//!     Ok(loc) => println!("Resolved {loc}"),
//!     Err(Error::MalformedParamDefinition(def)) => eprintln!("Bad definition: {def}"),
//!     Err(e) if e.is_recoverable() => eprintln!("Recoverable error: {e}"),
//!     Err(e) => eprintln!("Fatal error: {e}"),
//! }
//! ```

/// Content catalog traits and the file-backed catalog
pub mod catalog;
/// Page content change detection
pub mod change;
/// Configuration management
pub mod config;
/// Error types and result aliases
pub mod error;
/// Per-site sitemap regeneration
pub mod generator;
/// Key-value cache backing the change and pending-scan caches
pub mod kv;
/// Background media discovery
pub mod scan;
/// Public entry points for host applications
pub mod service;
/// Persistent sitemap item and media repository
pub mod store;
/// Core data types and structures
pub mod types;
/// Route template materialization
pub mod url_pattern;
/// Sitemap XML serializers
pub mod xml;

// Re-export commonly used types
pub use catalog::{Catalog, ModelSource, PageCatalog, StaticPageCatalog};
pub use change::ChangeDetector;
pub use config::{Config, PathsConfig, ScanConfig, SitemapConfig};
pub use error::{Error, Result};
pub use generator::{NoopHooks, PagesGenerator, RegenerationReport, SitemapHooks};
pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use scan::{
    ChannelScanQueue, HttpRenderer, MediaScanner, PageRenderer, PendingScanSet, ScanOutcome,
    ScanQueue, ScanWorker, WorkerSummary,
};
pub use service::{ContentSources, SitemapKind, SitemapService};
pub use store::SitemapStore;
pub use types::*;
