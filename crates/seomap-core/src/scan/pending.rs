//! Deduplication guard for queued scans.

use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::Result;
use crate::kv::{KeyValueStore, lock};

/// Cache key holding the JSON array of pending locations.
pub const PENDING_CACHE_KEY: &str = "seomap.waiting_for_scan";

/// Set of `loc` values with a scan queued or running.
///
/// Marking is a single test-and-set under a mutex, so two concurrent
/// requests for the same `loc` cannot both win.
pub struct PendingScanSet {
    cache: Arc<dyn KeyValueStore>,
    guard: Mutex<()>,
}

impl PendingScanSet {
    /// Pending set persisted through `cache`.
    pub fn new(cache: Arc<dyn KeyValueStore>) -> Self {
        Self {
            cache,
            guard: Mutex::new(()),
        }
    }

    /// Add `loc` unless it is already pending. Returns whether it was added.
    pub fn try_mark(&self, loc: &str) -> Result<bool> {
        let _guard = lock(&self.guard, "pending scan set")?;

        let mut pending = self.load()?;
        if pending.iter().any(|p| p == loc) {
            return Ok(false);
        }

        pending.push(loc.to_string());
        self.store(&pending)?;
        Ok(true)
    }

    /// Remove `loc` so it can be queued again.
    pub fn unmark(&self, loc: &str) -> Result<()> {
        let _guard = lock(&self.guard, "pending scan set")?;

        let mut pending = self.load()?;
        let before = pending.len();
        pending.retain(|p| p != loc);
        if pending.len() != before {
            self.store(&pending)?;
        }
        Ok(())
    }

    /// Whether `loc` is currently pending.
    pub fn is_pending(&self, loc: &str) -> Result<bool> {
        let _guard = lock(&self.guard, "pending scan set")?;
        Ok(self.load()?.iter().any(|p| p == loc))
    }

    /// Snapshot of every pending location.
    pub fn pending(&self) -> Result<Vec<String>> {
        let _guard = lock(&self.guard, "pending scan set")?;
        self.load()
    }

    /// Forget every pending location.
    pub fn clear(&self) -> Result<()> {
        let _guard = lock(&self.guard, "pending scan set")?;
        self.cache.forget(PENDING_CACHE_KEY)
    }

    fn load(&self) -> Result<Vec<String>> {
        let Some(raw) = self.cache.get(PENDING_CACHE_KEY)? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&raw) {
            Ok(pending) => Ok(pending),
            Err(e) => {
                warn!(error = %e, "discarding unreadable pending scan set");
                Ok(Vec::new())
            },
        }
    }

    fn store(&self, pending: &[String]) -> Result<()> {
        if pending.is_empty() {
            return self.cache.forget(PENDING_CACHE_KEY);
        }
        let json = serde_json::to_string(pending)?;
        self.cache.put(PENDING_CACHE_KEY, &json)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::kv::MemoryKeyValueStore;

    fn pending_set() -> PendingScanSet {
        PendingScanSet::new(Arc::new(MemoryKeyValueStore::new()))
    }

    #[test]
    fn test_mark_is_test_and_set() {
        let set = pending_set();

        assert!(set.try_mark("https://e.com/a").unwrap());
        assert!(!set.try_mark("https://e.com/a").unwrap());
        assert!(set.try_mark("https://e.com/b").unwrap());
        assert!(set.is_pending("https://e.com/a").unwrap());
    }

    #[test]
    fn test_unmark_only_removes_one_loc() {
        let set = pending_set();
        set.try_mark("https://e.com/a").unwrap();
        set.try_mark("https://e.com/b").unwrap();

        set.unmark("https://e.com/a").unwrap();

        assert!(!set.is_pending("https://e.com/a").unwrap());
        assert_eq!(set.pending().unwrap(), vec!["https://e.com/b".to_string()]);

        // Unmarking an absent loc is a no-op
        set.unmark("https://e.com/zzz").unwrap();
        assert!(set.try_mark("https://e.com/a").unwrap());
    }

    #[test]
    fn test_clear() {
        let set = pending_set();
        set.try_mark("https://e.com/a").unwrap();
        set.clear().unwrap();
        assert!(set.pending().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_marks_admit_one_winner() {
        let set = Arc::new(pending_set());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let set = Arc::clone(&set);
                std::thread::spawn(move || set.try_mark("https://e.com/race").unwrap())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
