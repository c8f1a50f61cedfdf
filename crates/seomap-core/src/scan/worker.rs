//! Background worker draining the scan queue.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::Result;
use crate::scan::job::{MediaScanner, ScanOutcome};

/// Counts of scan results seen by a worker.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Scans that synced media.
    pub completed: usize,
    /// Scans whose item no longer existed.
    pub skipped: usize,
    /// Scans abandoned after a failed or timed out render.
    pub abandoned: usize,
    /// Scans that failed with a store or cache error.
    pub failed: usize,
}

impl WorkerSummary {
    fn record(mut self, result: &Result<ScanOutcome>) -> Self {
        match result {
            Ok(ScanOutcome::Synced { .. }) => self.completed += 1,
            Ok(ScanOutcome::ItemMissing) => self.skipped += 1,
            Ok(ScanOutcome::Abandoned { .. }) => self.abandoned += 1,
            Err(_) => self.failed += 1,
        }
        self
    }

    /// Total scans processed.
    pub const fn total(&self) -> usize {
        self.completed + self.skipped + self.abandoned + self.failed
    }
}

/// Executes queued scans with bounded concurrency.
pub struct ScanWorker {
    scanner: Arc<MediaScanner>,
    concurrency: usize,
}

impl ScanWorker {
    /// Worker running at most `concurrency` scans at once (minimum 1).
    pub fn new(scanner: Arc<MediaScanner>, concurrency: usize) -> Self {
        Self {
            scanner,
            concurrency: concurrency.max(1),
        }
    }

    /// Run the worker on the tokio runtime until the queue closes.
    pub fn spawn(self, rx: UnboundedReceiver<String>) -> JoinHandle<WorkerSummary> {
        tokio::spawn(async move { self.run(rx).await })
    }

    /// Drain `rx` until every sender is gone, then return the summary.
    pub async fn run(&self, rx: UnboundedReceiver<String>) -> WorkerSummary {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let locs = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|loc| (loc, rx))
        });

        let summary = locs
            .map(|loc| {
                let semaphore = Arc::clone(&semaphore);
                let scanner = Arc::clone(&self.scanner);
                async move {
                    let _permit = semaphore.acquire().await;
                    let result = scanner.execute(&loc).await;
                    if let Err(e) = &result {
                        warn!(loc, category = e.category(), error = %e, "media scan failed");
                    }
                    result
                }
            })
            .buffer_unordered(self.concurrency)
            .fold(WorkerSummary::default(), |summary, result| async move {
                summary.record(&result)
            })
            .await;

        info!(
            completed = summary.completed,
            skipped = summary.skipped,
            abandoned = summary.abandoned,
            failed = summary.failed,
            "scan worker drained queue"
        );
        summary
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::disallowed_macros,
    clippy::unnecessary_wraps
)]
mod tests {
    use super::*;
    use crate::config::SitemapConfig;
    use crate::kv::MemoryKeyValueStore;
    use crate::scan::pending::PendingScanSet;
    use crate::scan::queue::ChannelScanQueue;
    use crate::scan::render::{PageRenderer, RenderContext, RenderedPage};
    use crate::store::SitemapStore;
    use crate::types::{ItemAttributes, MediaKind};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // Track maximum concurrent renders
    struct ConcurrencyTracker {
        current: AtomicUsize,
        max_seen: AtomicUsize,
    }

    impl ConcurrencyTracker {
        fn new() -> Self {
            Self {
                current: AtomicUsize::new(0),
                max_seen: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageRenderer for ConcurrencyTracker {
        async fn render(&self, ctx: &RenderContext) -> Result<RenderedPage> {
            let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;

            let mut max = self.max_seen.load(Ordering::SeqCst);
            while current > max {
                match self.max_seen.compare_exchange_weak(
                    max,
                    current,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                ) {
                    Ok(_) => break,
                    Err(actual) => max = actual,
                }
            }

            tokio::time::sleep(Duration::from_millis(30)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);

            if ctx.path.ends_with("broken") {
                return Ok(RenderedPage {
                    status: 500,
                    body: String::new(),
                });
            }
            Ok(RenderedPage::ok(r#"<img src="/a.png">"#))
        }
    }

    fn scanner(
        store: &Arc<SitemapStore>,
        renderer: Arc<ConcurrencyTracker>,
    ) -> (Arc<MediaScanner>, Arc<ChannelScanQueue>, UnboundedReceiver<String>) {
        let (queue, rx) = ChannelScanQueue::new();
        let queue = Arc::new(queue);
        let settings = SitemapConfig {
            enable_images_sitemap: true,
            ..SitemapConfig::default()
        };
        let scanner = MediaScanner::new(
            Arc::clone(store),
            PendingScanSet::new(Arc::new(MemoryKeyValueStore::new())),
            queue.clone(),
            renderer,
            settings,
        );
        (Arc::new(scanner), queue, rx)
    }

    #[tokio::test]
    async fn test_worker_respects_concurrency() {
        // Given: More queued scans than the concurrency limit
        let store = Arc::new(SitemapStore::in_memory());
        let tracker = Arc::new(ConcurrencyTracker::new());
        let (scanner, queue, rx) = scanner(&store, Arc::clone(&tracker));

        for i in 0..10 {
            let loc = format!("https://e.com/page{i}");
            store
                .upsert_for_page("en", &format!("p{i}.htm"), &loc, &ItemAttributes::default())
                .unwrap();
            assert!(scanner.request_scan(&loc).unwrap());
        }
        queue.close();

        // When: The worker drains the queue
        let summary = ScanWorker::new(scanner, 3).spawn(rx).await.unwrap();

        // Then: Every scan ran and no more than 3 overlapped
        assert_eq!(summary.completed, 10);
        let max_seen = tracker.max_seen.load(Ordering::SeqCst);
        assert!(max_seen <= 3, "Max concurrent was {max_seen}, should be <= 3");
    }

    #[tokio::test]
    async fn test_worker_counts_outcomes() {
        let store = Arc::new(SitemapStore::in_memory());
        let (scanner, queue, rx) = scanner(&store, Arc::new(ConcurrencyTracker::new()));

        let ok = store
            .upsert_for_page("en", "ok.htm", "https://e.com/ok", &ItemAttributes::default())
            .unwrap();
        store
            .upsert_for_page("en", "b.htm", "https://e.com/broken", &ItemAttributes::default())
            .unwrap();

        scanner.request_scan("https://e.com/ok").unwrap();
        scanner.request_scan("https://e.com/broken").unwrap();
        scanner.request_scan("https://e.com/gone").unwrap();
        queue.close();

        let summary = ScanWorker::new(Arc::clone(&scanner), 2).run(rx).await;

        assert_eq!(summary.completed, 1);
        assert_eq!(summary.abandoned, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total(), 3);
        assert_eq!(store.media_for(ok.id, MediaKind::Image).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_concurrency_still_runs() {
        let store = Arc::new(SitemapStore::in_memory());
        let (scanner, queue, rx) = scanner(&store, Arc::new(ConcurrencyTracker::new()));
        store
            .upsert_for_page("en", "a.htm", "https://e.com/a", &ItemAttributes::default())
            .unwrap();
        scanner.request_scan("https://e.com/a").unwrap();
        queue.close();

        let summary = ScanWorker::new(scanner, 0).run(rx).await;
        assert_eq!(summary.completed, 1);
    }
}
