//! Asynchronous media discovery.
//!
//! A scan is requested for a sitemap `loc` while pages are regenerated. The
//! request is deduplicated through [`PendingScanSet`], pushed onto a
//! [`ScanQueue`] and later executed by a [`ScanWorker`]. Execution renders the
//! page, extracts images and `VideoObject` microdata, and replaces the media
//! attached to every item stored under that `loc`.

pub mod extract;
pub mod job;
pub mod pending;
pub mod queue;
pub mod render;
pub mod worker;

pub use extract::{VIDEO_OBJECT_TYPE, extract_images, extract_videos};
pub use job::{MediaScanner, ScanOutcome};
pub use pending::{PENDING_CACHE_KEY, PendingScanSet};
pub use queue::{ChannelScanQueue, ScanQueue};
pub use render::{HttpRenderer, PageRenderer, RenderContext, RenderedPage};
pub use worker::{ScanWorker, WorkerSummary};
