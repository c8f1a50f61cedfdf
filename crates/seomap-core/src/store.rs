//! Sitemap item repository.
//!
//! Holds sitemap items, media assets and the item-to-asset link table. The
//! store can be purely in-memory or backed by a JSON document that is
//! rewritten atomically after every mutation.
//!
//! ## Invariants
//!
//! - `loc` is unique within a site. Upserts find-or-create on `(site, loc)`;
//!   a duplicate seen on load or upsert is a [`Error::StoreIntegrityViolation`].
//! - Deleting an item drops its media links. Assets without links survive
//!   until [`SitemapStore::delete_orphaned_media`].
//!
//! ## Example
//!
//! ```rust
//! use seomap_core::store::SitemapStore;
//! use seomap_core::ItemAttributes;
//! use std::collections::HashSet;
//!
//! let store = SitemapStore::in_memory();
//! store.upsert_for_page("en", "home.htm", "https://example.com/", &ItemAttributes::default())?;
//! store.upsert_for_page("en", "old.htm", "https://example.com/old", &ItemAttributes::default())?;
//!
//! let in_use: HashSet<String> = ["home.htm".to_string()].into();
//! store.reconcile("en", &in_use)?;
//! assert_eq!(store.list_enabled("en")?.len(), 1);
//! # Ok::<(), seomap_core::Error>(())
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::kv::{lock, write_atomic};
use crate::types::{ItemAttributes, MediaAsset, MediaKind, MediaPayload, SitemapItem};
use crate::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    next_item_id: u64,
    next_asset_id: u64,
    items: Vec<SitemapItem>,
    assets: Vec<MediaAsset>,
    links: Vec<MediaLink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct MediaLink {
    item_id: u64,
    asset_id: u64,
}

impl StoreState {
    fn verify_integrity(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for item in &self.items {
            if !seen.insert((item.site_id.as_str(), item.loc.as_str())) {
                return Err(Error::StoreIntegrityViolation {
                    site: item.site_id.clone(),
                    loc: item.loc.clone(),
                });
            }
        }
        Ok(())
    }

    fn asset_kind(&self, asset_id: u64) -> Option<MediaKind> {
        self.assets
            .iter()
            .find(|asset| asset.id == asset_id)
            .map(|asset| asset.payload.kind())
    }

    fn assets_for(&self, item_id: u64, kind: MediaKind) -> Vec<MediaAsset> {
        self.links
            .iter()
            .filter(|link| link.item_id == item_id)
            .filter_map(|link| self.assets.iter().find(|asset| asset.id == link.asset_id))
            .filter(|asset| asset.payload.kind() == kind)
            .cloned()
            .collect()
    }

    /// Delete items matching `predicate`, together with their links.
    fn delete_items(&mut self, predicate: impl Fn(&SitemapItem) -> bool) -> usize {
        let doomed: HashSet<u64> = self
            .items
            .iter()
            .filter(|item| predicate(item))
            .map(|item| item.id)
            .collect();

        if doomed.is_empty() {
            return 0;
        }

        self.items.retain(|item| !doomed.contains(&item.id));
        self.links.retain(|link| !doomed.contains(&link.item_id));
        doomed.len()
    }
}

/// Persistent repository of sitemap items and their media.
#[derive(Debug)]
pub struct SitemapStore {
    state: Mutex<StoreState>,
    path: Option<PathBuf>,
}

impl SitemapStore {
    /// Store that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            path: None,
        }
    }

    /// Open (or start) a store persisted at `path`.
    ///
    /// A missing file yields an empty store; the file is created on the
    /// first mutation.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let state = if path.exists() {
            let json = fs::read_to_string(&path)
                .map_err(|e| Error::Storage(format!("Failed to read item store: {e}")))?;
            let state: StoreState = serde_json::from_str(&json)
                .map_err(|e| Error::Storage(format!("Failed to parse item store: {e}")))?;
            state.verify_integrity()?;
            debug!(path = %path.display(), items = state.items.len(), "loaded item store");
            state
        } else {
            StoreState::default()
        };

        Ok(Self {
            state: Mutex::new(state),
            path: Some(path),
        })
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>> {
        lock(&self.state, "item store")
    }

    /// Run a mutation on a copy and swap it in once persisted.
    fn mutate<T>(&self, f: impl FnOnce(&mut StoreState) -> Result<T>) -> Result<T> {
        let mut state = self.state()?;
        let mut next = state.clone();
        let value = f(&mut next)?;
        self.persist(&next)?;
        *state = next;
        Ok(value)
    }

    fn persist(&self, state: &StoreState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::Storage(format!("Failed to create store directory: {e}"))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| Error::Storage(format!("Failed to serialize item store: {e}")))?;
        write_atomic(path, &json)
    }

    /// Item at `loc` within `site`.
    pub fn find_by_loc(&self, site: &str, loc: &str) -> Result<Option<SitemapItem>> {
        let state = self.state()?;
        Ok(state
            .items
            .iter()
            .find(|item| item.site_id == site && item.loc == loc)
            .cloned())
    }

    /// Items at `loc` across all sites.
    pub fn find_all_by_loc(&self, loc: &str) -> Result<Vec<SitemapItem>> {
        let state = self.state()?;
        Ok(state
            .items
            .iter()
            .filter(|item| item.loc == loc)
            .cloned()
            .collect())
    }

    /// Find-or-create the item at `(site, loc)` and overwrite its attributes.
    ///
    /// `lastmod`, `priority`, `changefreq`, `base_file_name` and `site_id`
    /// are replaced, never merged. New items start enabled.
    pub fn upsert_for_page(
        &self,
        site: &str,
        base_file_name: &str,
        loc: &str,
        attrs: &ItemAttributes,
    ) -> Result<SitemapItem> {
        self.mutate(|state| {
            let mut matches = state
                .items
                .iter_mut()
                .filter(|item| item.site_id == site && item.loc == loc);

            let existing = matches.next();
            if matches.next().is_some() {
                return Err(Error::StoreIntegrityViolation {
                    site: site.to_string(),
                    loc: loc.to_string(),
                });
            }

            if let Some(item) = existing {
                item.base_file_name = base_file_name.to_string();
                item.site_id = site.to_string();
                item.lastmod = attrs.lastmod;
                item.priority = attrs.priority;
                item.changefreq = attrs.changefreq;
                return Ok(item.clone());
            }

            state.next_item_id += 1;
            let item = SitemapItem {
                id: state.next_item_id,
                site_id: site.to_string(),
                base_file_name: base_file_name.to_string(),
                loc: loc.to_string(),
                lastmod: attrs.lastmod,
                changefreq: attrs.changefreq,
                priority: attrs.priority,
                enabled: true,
            };
            state.items.push(item.clone());
            debug!(site, loc, id = item.id, "created sitemap item");
            Ok(item)
        })
    }

    /// Delete every item of `site` whose page is not in `base_file_names_in_use`.
    #[instrument(skip(self, base_file_names_in_use), fields(keep = base_file_names_in_use.len()))]
    pub fn reconcile(&self, site: &str, base_file_names_in_use: &HashSet<String>) -> Result<usize> {
        let deleted = self.mutate(|state| {
            Ok(state.delete_items(|item| {
                item.site_id == site && !base_file_names_in_use.contains(&item.base_file_name)
            }))
        })?;

        if deleted > 0 {
            info!(site, deleted, "removed sitemap items of vanished pages");
        }
        Ok(deleted)
    }

    /// Delete items of one page that are not in `ids_to_keep`.
    pub fn reconcile_for_single_page(
        &self,
        site: &str,
        base_file_name: &str,
        ids_to_keep: &[u64],
    ) -> Result<usize> {
        let deleted = self.mutate(|state| {
            Ok(state.delete_items(|item| {
                item.site_id == site
                    && item.base_file_name == base_file_name
                    && !ids_to_keep.contains(&item.id)
            }))
        })?;

        if deleted > 0 {
            debug!(site, page = base_file_name, deleted, "removed ghost sitemap items");
        }
        Ok(deleted)
    }

    /// Enabled items of `site`, in insertion order.
    pub fn list_enabled(&self, site: &str) -> Result<Vec<SitemapItem>> {
        let state = self.state()?;
        Ok(state
            .items
            .iter()
            .filter(|item| item.site_id == site && item.enabled)
            .cloned()
            .collect())
    }

    /// All items of `site`, enabled or not.
    pub fn list_for_site(&self, site: &str) -> Result<Vec<SitemapItem>> {
        let state = self.state()?;
        Ok(state
            .items
            .iter()
            .filter(|item| item.site_id == site)
            .cloned()
            .collect())
    }

    /// Enable or disable one item.
    pub fn set_enabled(&self, item_id: u64, enabled: bool) -> Result<SitemapItem> {
        self.mutate(|state| {
            let item = state
                .items
                .iter_mut()
                .find(|item| item.id == item_id)
                .ok_or_else(|| Error::NotFound(format!("sitemap item {item_id}")))?;
            item.enabled = enabled;
            Ok(item.clone())
        })
    }

    /// Replace the item's `kind` media with `payloads`.
    ///
    /// Image and video sets are independent. Identical assets already in
    /// the store are reused rather than duplicated.
    pub fn sync_media(&self, item_id: u64, kind: MediaKind, payloads: &[MediaPayload]) -> Result<()> {
        if let Some(bad) = payloads.iter().find(|p| p.kind() != kind) {
            return Err(Error::Storage(format!(
                "Cannot sync {} asset as {kind} media",
                bad.kind()
            )));
        }

        self.mutate(|state| {
            if !state.items.iter().any(|item| item.id == item_id) {
                return Err(Error::NotFound(format!("sitemap item {item_id}")));
            }

            let stale: Vec<MediaLink> = state
                .links
                .iter()
                .filter(|link| {
                    link.item_id == item_id && state.asset_kind(link.asset_id) == Some(kind)
                })
                .copied()
                .collect();
            state.links.retain(|link| !stale.contains(link));

            for payload in payloads {
                let existing = state
                    .assets
                    .iter()
                    .find(|asset| &asset.payload == payload)
                    .map(|asset| asset.id);

                let asset_id = match existing {
                    Some(id) => id,
                    None => {
                        state.next_asset_id += 1;
                        let id = state.next_asset_id;
                        state.assets.push(MediaAsset {
                            id,
                            payload: payload.clone(),
                        });
                        id
                    },
                };

                let link = MediaLink { item_id, asset_id };
                if !state.links.contains(&link) {
                    state.links.push(link);
                }
            }

            debug!(item_id, %kind, count = payloads.len(), "synced media");
            Ok(())
        })
    }

    /// Assets of `kind` linked to an item, in link order.
    pub fn media_for(&self, item_id: u64, kind: MediaKind) -> Result<Vec<MediaAsset>> {
        Ok(self.state()?.assets_for(item_id, kind))
    }

    /// Enabled items of `site` paired with their `kind` media.
    pub fn list_enabled_with_media(
        &self,
        site: &str,
        kind: MediaKind,
    ) -> Result<Vec<(SitemapItem, Vec<MediaAsset>)>> {
        let state = self.state()?;
        Ok(state
            .items
            .iter()
            .filter(|item| item.site_id == site && item.enabled)
            .map(|item| (item.clone(), state.assets_for(item.id, kind)))
            .collect())
    }

    /// Remove assets that no item links to.
    pub fn delete_orphaned_media(&self) -> Result<usize> {
        self.mutate(|state| {
            let linked: HashSet<u64> = state.links.iter().map(|link| link.asset_id).collect();
            let before = state.assets.len();
            state.assets.retain(|asset| linked.contains(&asset.id));
            let deleted = before - state.assets.len();
            if deleted > 0 {
                debug!(deleted, "removed orphaned media assets");
            }
            Ok(deleted)
        })
    }

    /// Total number of stored assets, linked or not.
    pub fn asset_count(&self) -> Result<usize> {
        Ok(self.state()?.assets.len())
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
    use crate::types::{ChangeFrequency, VideoAsset};
    use tempfile::TempDir;

    fn attrs(priority: f32) -> ItemAttributes {
        ItemAttributes {
            lastmod: None,
            changefreq: Some(ChangeFrequency::Weekly),
            priority: Some(priority),
        }
    }

    fn in_use(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn test_upsert_creates_then_overwrites() {
        let store = SitemapStore::in_memory();

        let created = store
            .upsert_for_page("en", "blog.htm", "https://example.com/blog", &attrs(0.5))
            .unwrap();
        assert!(created.enabled);

        let updated = store
            .upsert_for_page(
                "en",
                "news.htm",
                "https://example.com/blog",
                &ItemAttributes::default(),
            )
            .unwrap();

        // Same row, fully replaced attributes
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.base_file_name, "news.htm");
        assert_eq!(updated.priority, None);
        assert_eq!(updated.changefreq, None);
        assert_eq!(store.list_for_site("en").unwrap().len(), 1);
    }

    #[test]
    fn test_same_loc_in_different_sites() {
        let store = SitemapStore::in_memory();
        let en = store
            .upsert_for_page("en", "home.htm", "https://example.com/", &attrs(1.0))
            .unwrap();
        let pl = store
            .upsert_for_page("pl", "home.htm", "https://example.com/", &attrs(1.0))
            .unwrap();

        assert_ne!(en.id, pl.id);
        assert_eq!(store.find_all_by_loc("https://example.com/").unwrap().len(), 2);
        assert_eq!(
            store.find_by_loc("pl", "https://example.com/").unwrap().unwrap().id,
            pl.id
        );
    }

    #[test]
    fn test_reconcile_deletes_unused_pages_only_for_site() {
        // Given: Items from three pages in two sites
        let store = SitemapStore::in_memory();
        store.upsert_for_page("en", "home.htm", "https://e.com/", &attrs(1.0)).unwrap();
        store.upsert_for_page("en", "blog.htm", "https://e.com/blog/a", &attrs(0.5)).unwrap();
        store.upsert_for_page("en", "blog.htm", "https://e.com/blog/b", &attrs(0.5)).unwrap();
        store.upsert_for_page("pl", "blog.htm", "https://e.com/pl/blog", &attrs(0.5)).unwrap();

        // When: Reconciling "en" with only the home page in use
        let deleted = store.reconcile("en", &in_use(&["home.htm"])).unwrap();

        // Then: Only the "en" blog items are gone
        assert_eq!(deleted, 2);
        let remaining = store.list_for_site("en").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].base_file_name, "home.htm");
        assert_eq!(store.list_for_site("pl").unwrap().len(), 1);
    }

    #[test]
    fn test_reconcile_for_single_page() {
        let store = SitemapStore::in_memory();
        let a = store.upsert_for_page("en", "blog.htm", "https://e.com/a", &attrs(0.5)).unwrap();
        store.upsert_for_page("en", "blog.htm", "https://e.com/b", &attrs(0.5)).unwrap();
        let other = store.upsert_for_page("en", "home.htm", "https://e.com/", &attrs(1.0)).unwrap();

        let deleted = store.reconcile_for_single_page("en", "blog.htm", &[a.id]).unwrap();

        assert_eq!(deleted, 1);
        let ids: Vec<u64> = store.list_for_site("en").unwrap().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![a.id, other.id]);
    }

    #[test]
    fn test_disabled_items_are_not_listed() {
        let store = SitemapStore::in_memory();
        let item = store.upsert_for_page("en", "home.htm", "https://e.com/", &attrs(1.0)).unwrap();

        store.set_enabled(item.id, false).unwrap();
        assert!(store.list_enabled("en").unwrap().is_empty());
        assert_eq!(store.list_for_site("en").unwrap().len(), 1);

        // Upserts do not re-enable
        store.upsert_for_page("en", "home.htm", "https://e.com/", &attrs(1.0)).unwrap();
        assert!(store.list_enabled("en").unwrap().is_empty());

        assert!(matches!(store.set_enabled(999, true), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_sync_media_replaces_per_kind() {
        let store = SitemapStore::in_memory();
        let item = store.upsert_for_page("en", "home.htm", "https://e.com/", &attrs(1.0)).unwrap();
        let video = MediaPayload::Video(VideoAsset {
            title: Some("Intro".to_string()),
            ..VideoAsset::default()
        });

        store
            .sync_media(item.id, MediaKind::Image, &[MediaPayload::image("https://e.com/a.png")])
            .unwrap();
        store.sync_media(item.id, MediaKind::Video, &[video.clone()]).unwrap();

        // Replacing images leaves videos alone
        store
            .sync_media(item.id, MediaKind::Image, &[MediaPayload::image("https://e.com/b.png")])
            .unwrap();

        let images = store.media_for(item.id, MediaKind::Image).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].payload, MediaPayload::image("https://e.com/b.png"));
        assert_eq!(store.media_for(item.id, MediaKind::Video).unwrap()[0].payload, video);

        // The replaced image is orphaned until collected
        assert_eq!(store.asset_count().unwrap(), 3);
        assert_eq!(store.delete_orphaned_media().unwrap(), 1);
        assert_eq!(store.asset_count().unwrap(), 2);
    }

    #[test]
    fn test_sync_media_reuses_shared_assets() {
        let store = SitemapStore::in_memory();
        let a = store.upsert_for_page("en", "a.htm", "https://e.com/a", &attrs(1.0)).unwrap();
        let b = store.upsert_for_page("en", "b.htm", "https://e.com/b", &attrs(1.0)).unwrap();
        let logo = MediaPayload::image("https://e.com/logo.png");

        store.sync_media(a.id, MediaKind::Image, &[logo.clone(), logo.clone()]).unwrap();
        store.sync_media(b.id, MediaKind::Image, &[logo]).unwrap();

        assert_eq!(store.asset_count().unwrap(), 1);
        assert_eq!(store.media_for(a.id, MediaKind::Image).unwrap().len(), 1);

        // Deleting one item keeps the shared asset linked through the other
        store.reconcile("en", &in_use(&["b.htm"])).unwrap();
        assert_eq!(store.delete_orphaned_media().unwrap(), 0);

        store.reconcile("en", &in_use(&[])).unwrap();
        assert_eq!(store.delete_orphaned_media().unwrap(), 1);
    }

    #[test]
    fn test_sync_media_rejects_mismatched_kind() {
        let store = SitemapStore::in_memory();
        let item = store.upsert_for_page("en", "a.htm", "https://e.com/a", &attrs(1.0)).unwrap();

        let result = store.sync_media(
            item.id,
            MediaKind::Video,
            &[MediaPayload::image("https://e.com/a.png")],
        );
        assert!(matches!(result, Err(Error::Storage(_))));

        let missing = store.sync_media(42, MediaKind::Image, &[]);
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_list_enabled_with_media() {
        let store = SitemapStore::in_memory();
        let with = store.upsert_for_page("en", "a.htm", "https://e.com/a", &attrs(1.0)).unwrap();
        store.upsert_for_page("en", "b.htm", "https://e.com/b", &attrs(1.0)).unwrap();
        store
            .sync_media(with.id, MediaKind::Image, &[MediaPayload::image("https://e.com/x.png")])
            .unwrap();

        let listed = store.list_enabled_with_media("en", MediaKind::Image).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].1.len(), 1);
        assert!(listed[1].1.is_empty());
    }

    #[test]
    fn test_file_backed_store_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data").join("items.json");

        {
            let store = SitemapStore::open(&path).unwrap();
            let item = store.upsert_for_page("en", "a.htm", "https://e.com/a", &attrs(0.8)).unwrap();
            store
                .sync_media(item.id, MediaKind::Image, &[MediaPayload::image("https://e.com/x.png")])
                .unwrap();
        }

        let reopened = SitemapStore::open(&path).unwrap();
        let item = reopened.find_by_loc("en", "https://e.com/a").unwrap().unwrap();
        assert_eq!(item.priority, Some(0.8));
        assert_eq!(reopened.media_for(item.id, MediaKind::Image).unwrap().len(), 1);

        // Ids keep increasing after reopen
        let next = reopened.upsert_for_page("en", "b.htm", "https://e.com/b", &attrs(0.1)).unwrap();
        assert!(next.id > item.id);
    }

    #[test]
    fn test_failed_persist_leaves_memory_unchanged() {
        // Given: A store whose data directory cannot be created
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("data");
        fs::write(&blocker, "not a directory").unwrap();
        let store = SitemapStore::open(blocker.join("items.json")).unwrap();

        // When: A mutation fails to persist
        let result = store.upsert_for_page("en", "a.htm", "https://e.com/a", &attrs(0.5));

        // Then: The error surfaces and memory still matches disk
        assert!(matches!(result, Err(Error::Storage(_))));
        assert!(store.find_by_loc("en", "https://e.com/a").unwrap().is_none());
        assert!(store.list_for_site("en").unwrap().is_empty());
    }

    #[test]
    fn test_open_detects_duplicate_locs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("items.json");
        let item = |id: u64| SitemapItem {
            id,
            site_id: "en".to_string(),
            base_file_name: "a.htm".to_string(),
            loc: "https://e.com/a".to_string(),
            lastmod: None,
            changefreq: None,
            priority: None,
            enabled: true,
        };
        let state = StoreState {
            next_item_id: 2,
            items: vec![item(1), item(2)],
            ..StoreState::default()
        };
        fs::write(&path, serde_json::to_string(&state).unwrap()).unwrap();

        match SitemapStore::open(&path) {
            Err(Error::StoreIntegrityViolation { site, loc }) => {
                assert_eq!(site, "en");
                assert_eq!(loc, "https://e.com/a");
            },
            other => panic!("Expected integrity violation, got {other:?}"),
        }
    }

    #[test]
    fn test_open_rejects_corrupted_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("items.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(SitemapStore::open(&path), Err(Error::Storage(_))));
    }
}
