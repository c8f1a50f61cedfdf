//! Page content change detection.
//!
//! Keeps a map from `(site, baseFileName)` to the SHA-256 of the page's
//! source content, serialized as one JSON object in the key-value cache.
//! Map keys join both parts with the U+001F control character.
//! [`ChangeDetector::has_changed`] is a one-shot signal: reporting a change
//! also commits the new hash.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::Result;
use crate::kv::{KeyValueStore, lock};

/// Cache key holding the serialized hash map.
pub const HASH_CACHE_KEY: &str = "seomap.pages_content_hashes";

/// Decides whether a page's sitemap entries need regeneration.
pub struct ChangeDetector {
    cache: Arc<dyn KeyValueStore>,
    guard: Mutex<()>,
}

impl ChangeDetector {
    /// Detector persisting through `cache`.
    pub fn new(cache: Arc<dyn KeyValueStore>) -> Self {
        Self {
            cache,
            guard: Mutex::new(()),
        }
    }

    /// Compare `content` against the last seen hash for `(site, base_file_name)`.
    ///
    /// Returns `true` and stores the new hash when the entry is absent or
    /// differs; returns `false` without writing otherwise.
    pub fn has_changed(&self, site: &str, base_file_name: &str, content: &str) -> Result<bool> {
        let _guard = lock(&self.guard, "change detector")?;

        let key = cache_entry_key(site, base_file_name);
        let hash = content_hash(content);
        let mut hashes = self.load()?;

        if hashes.get(&key) == Some(&hash) {
            return Ok(false);
        }

        debug!(site, page = base_file_name, "page content changed");
        hashes.insert(key, hash);
        self.store(&hashes)?;
        Ok(true)
    }

    /// Drop the stored hash for one page so the next run treats it as changed.
    pub fn forget(&self, site: &str, base_file_name: &str) -> Result<()> {
        let _guard = lock(&self.guard, "change detector")?;

        let mut hashes = self.load()?;
        if hashes.remove(&cache_entry_key(site, base_file_name)).is_some() {
            self.store(&hashes)?;
        }
        Ok(())
    }

    /// Clear every stored hash, forcing a full regeneration on the next run.
    pub fn reset(&self) -> Result<()> {
        let _guard = lock(&self.guard, "change detector")?;
        self.cache.forget(HASH_CACHE_KEY)
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        let Some(raw) = self.cache.get(HASH_CACHE_KEY)? else {
            return Ok(BTreeMap::new());
        };

        match serde_json::from_str(&raw) {
            Ok(hashes) => Ok(hashes),
            Err(e) => {
                warn!(error = %e, "discarding unreadable content hash cache");
                Ok(BTreeMap::new())
            },
        }
    }

    fn store(&self, hashes: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string(hashes)?;
        self.cache.put(HASH_CACHE_KEY, &json)
    }
}

/// Separator between the site and page parts of a map key.
const KEY_SEPARATOR: char = '\u{1f}';

fn cache_entry_key(site: &str, base_file_name: &str) -> String {
    format!("{site}{KEY_SEPARATOR}{base_file_name}")
}

/// Hex-encoded SHA-256 of `content`.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    result.iter().fold(String::with_capacity(64), |mut acc, b| {
        // write! to String is infallible
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;
    use crate::kv::MemoryKeyValueStore;
    use proptest::prelude::*;

    fn detector() -> (ChangeDetector, Arc<MemoryKeyValueStore>) {
        let cache = Arc::new(MemoryKeyValueStore::new());
        (ChangeDetector::new(cache.clone()), cache)
    }

    #[test]
    fn test_reports_change_once_per_content() {
        // Given: A fresh detector
        let (detector, _) = detector();

        // When/Then: The first observation is a change, repeats are not
        assert!(detector.has_changed("en", "home.htm", "v1").unwrap());
        assert!(!detector.has_changed("en", "home.htm", "v1").unwrap());
        assert!(!detector.has_changed("en", "home.htm", "v1").unwrap());

        // When/Then: New content is reported once
        assert!(detector.has_changed("en", "home.htm", "v2").unwrap());
        assert!(!detector.has_changed("en", "home.htm", "v2").unwrap());

        // Reverting is also a change
        assert!(detector.has_changed("en", "home.htm", "v1").unwrap());
    }

    #[test]
    fn test_keys_are_scoped_by_site() {
        let (detector, _) = detector();

        assert!(detector.has_changed("en", "home.htm", "same").unwrap());
        assert!(detector.has_changed("pl", "home.htm", "same").unwrap());
        assert!(detector.has_changed("en", "about.htm", "same").unwrap());
        assert!(!detector.has_changed("pl", "home.htm", "same").unwrap());
    }

    #[test]
    fn test_reset_forces_regeneration() {
        let (detector, cache) = detector();
        detector.has_changed("en", "home.htm", "v1").unwrap();

        detector.reset().unwrap();

        assert_eq!(cache.get(HASH_CACHE_KEY).unwrap(), None);
        assert!(detector.has_changed("en", "home.htm", "v1").unwrap());
    }

    #[test]
    fn test_forget_single_page() {
        let (detector, _) = detector();
        detector.has_changed("en", "home.htm", "v1").unwrap();
        detector.has_changed("en", "blog.htm", "v1").unwrap();

        detector.forget("en", "home.htm").unwrap();

        assert!(detector.has_changed("en", "home.htm", "v1").unwrap());
        assert!(!detector.has_changed("en", "blog.htm", "v1").unwrap());
    }

    #[test]
    fn test_cache_layout_is_json_object() {
        let (detector, cache) = detector();
        detector.has_changed("en", "home.htm", "hello").unwrap();

        let raw = cache.get(HASH_CACHE_KEY).unwrap().unwrap();
        let map: BTreeMap<String, String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(map.get("en\u{1f}home.htm"), Some(&content_hash("hello")));
    }

    #[test]
    fn test_dashed_site_codes_do_not_collide() {
        let (detector, _) = detector();

        // "a-b" + "c" and "a" + "b-c" are distinct pages
        assert!(detector.has_changed("a-b", "c", "same").unwrap());
        assert!(detector.has_changed("a", "b-c", "same").unwrap());
        assert!(!detector.has_changed("a-b", "c", "same").unwrap());
    }

    #[test]
    fn test_corrupted_cache_is_treated_as_empty() {
        let (detector, cache) = detector();
        cache.put(HASH_CACHE_KEY, "not json").unwrap();

        assert!(detector.has_changed("en", "home.htm", "v1").unwrap());
        assert!(!detector.has_changed("en", "home.htm", "v1").unwrap());
    }

    #[test]
    fn test_content_hash_is_hex_sha256() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    proptest! {
        #[test]
        fn test_second_observation_never_changes(content in ".{0,200}") {
            let (detector, _) = detector();
            prop_assert!(detector.has_changed("en", "page", &content).unwrap());
            prop_assert!(!detector.has_changed("en", "page", &content).unwrap());
        }
    }
}
