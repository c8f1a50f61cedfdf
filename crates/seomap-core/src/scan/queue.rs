//! Task queue seam between scan requests and scan execution.

use std::sync::Mutex;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::kv::lock;
use crate::{Error, Result};

/// Asynchronous task queue accepting scan requests.
pub trait ScanQueue: Send + Sync {
    /// Queue a scan of `loc`.
    fn enqueue(&self, loc: &str) -> Result<()>;
}

/// In-process queue backed by an unbounded tokio channel.
///
/// The receiving half is drained by a [`ScanWorker`](super::ScanWorker).
/// Closing the queue lets the worker finish outstanding scans and exit.
pub struct ChannelScanQueue {
    sender: Mutex<Option<UnboundedSender<String>>>,
}

impl ChannelScanQueue {
    /// Create a queue and the receiver its worker should drain.
    pub fn new() -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                sender: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Stop accepting requests. Already queued requests are still delivered.
    pub fn close(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
    }
}

impl ScanQueue for ChannelScanQueue {
    fn enqueue(&self, loc: &str) -> Result<()> {
        let sender = lock(&self.sender, "scan queue")?;
        let tx = sender
            .as_ref()
            .ok_or_else(|| Error::Other("scan queue is closed".to_string()))?;
        tx.send(loc.to_string())
            .map_err(|_| Error::Other("scan worker has stopped".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_and_close() {
        let (queue, mut rx) = ChannelScanQueue::new();

        queue.enqueue("https://e.com/a").unwrap();
        queue.enqueue("https://e.com/b").unwrap();
        queue.close();

        assert!(matches!(queue.enqueue("https://e.com/c"), Err(Error::Other(_))));

        assert_eq!(rx.recv().await.as_deref(), Some("https://e.com/a"));
        assert_eq!(rx.recv().await.as_deref(), Some("https://e.com/b"));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_enqueue_after_receiver_dropped() {
        let (queue, rx) = ChannelScanQueue::new();
        drop(rx);
        assert!(queue.enqueue("https://e.com/a").is_err());
    }
}
