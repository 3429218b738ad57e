//! Shared engine/UI state.
//!
//! One mutex guards every non-atomic field, while progress counters are
//! plain atomics so a polling UI thread never blocks on the download
//! worker.

use crate::model::Game;
use crate::queue::{HistoryEntry, QueueItem};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default, Clone)]
pub struct CatalogState {
    pub platforms: Vec<String>,
    pub visible_roms: Vec<Game>,
    pub all_roms: Vec<Game>,
}

/// Revision counters so a UI renderer can detect when its cached snapshot
/// must be rebuilt without diffing the full state each frame.
#[derive(Debug, Default)]
pub struct Revisions {
    pub roms_rev: AtomicU64,
    pub queue_rev: AtomicU64,
    pub history_rev: AtomicU64,
    pub options_rev: AtomicU64,
}

#[derive(Debug, Default)]
struct Locked {
    catalog: CatalogState,
    queue: Vec<QueueItem>,
    history: Vec<HistoryEntry>,
    cover_cache: CoverCache,
}

/// LRU-bounded cache for fetched cover art, keyed by rom id. Bounded at a
/// concrete 64 entries rather than left to grow for a session.
#[derive(Debug, Default)]
struct CoverCache {
    order: Vec<String>,
    bytes: std::collections::HashMap<String, Vec<u8>>,
}

const COVER_CACHE_CAPACITY: usize = 64;

impl CoverCache {
    fn insert(&mut self, rom_id: String, data: Vec<u8>) {
        if let Some(pos) = self.order.iter().position(|id| id == &rom_id) {
            self.order.remove(pos);
        }
        self.order.push(rom_id.clone());
        self.bytes.insert(rom_id, data);
        while self.order.len() > COVER_CACHE_CAPACITY {
            let evicted = self.order.remove(0);
            self.bytes.remove(&evicted);
        }
    }

    fn get(&self, rom_id: &str) -> Option<&Vec<u8>> {
        self.bytes.get(rom_id)
    }
}

pub struct Status {
    locked: Mutex<Locked>,
    pub revisions: Revisions,

    pub current_download_size: AtomicU64,
    pub current_downloaded_bytes: AtomicU64,
    pub total_download_bytes: AtomicU64,
    pub total_downloaded_bytes: AtomicU64,
    pub download_worker_running: AtomicBool,
    pub download_completed: AtomicBool,
}

impl Default for Status {
    fn default() -> Self {
        Status {
            locked: Mutex::new(Locked::default()),
            revisions: Revisions::default(),
            current_download_size: AtomicU64::new(0),
            current_downloaded_bytes: AtomicU64::new(0),
            total_download_bytes: AtomicU64::new(0),
            total_downloaded_bytes: AtomicU64::new(0),
            download_worker_running: AtomicBool::new(false),
            download_completed: AtomicBool::new(false),
        }
    }
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_platforms(&self, platforms: Vec<String>) {
        let mut locked = self.locked.lock().expect("status lock poisoned");
        locked.catalog.platforms = platforms;
        self.revisions.roms_rev.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_all_roms(&self, roms: Vec<Game>) {
        let mut locked = self.locked.lock().expect("status lock poisoned");
        locked.catalog.all_roms = roms;
        self.revisions.roms_rev.fetch_add(1, Ordering::SeqCst);
    }

    pub fn catalog_snapshot(&self) -> CatalogState {
        self.locked.lock().expect("status lock poisoned").catalog.clone()
    }

    pub fn with_queue_mut<R>(&self, f: impl FnOnce(&mut Vec<QueueItem>) -> R) -> R {
        let mut locked = self.locked.lock().expect("status lock poisoned");
        let r = f(&mut locked.queue);
        self.revisions.queue_rev.fetch_add(1, Ordering::SeqCst);
        r
    }

    pub fn queue_snapshot(&self) -> Vec<QueueItem> {
        self.locked.lock().expect("status lock poisoned").queue.clone()
    }

    pub fn with_history_mut<R>(&self, f: impl FnOnce(&mut Vec<HistoryEntry>) -> R) -> R {
        let mut locked = self.locked.lock().expect("status lock poisoned");
        let r = f(&mut locked.history);
        self.revisions.history_rev.fetch_add(1, Ordering::SeqCst);
        r
    }

    pub fn history_snapshot(&self) -> Vec<HistoryEntry> {
        self.locked.lock().expect("status lock poisoned").history.clone()
    }

    pub fn cache_cover(&self, rom_id: &str, data: Vec<u8>) {
        let mut locked = self.locked.lock().expect("status lock poisoned");
        locked.cover_cache.insert(rom_id.to_string(), data);
    }

    pub fn cached_cover(&self, rom_id: &str) -> Option<Vec<u8>> {
        self.locked.lock().expect("status lock poisoned").cover_cache.get(rom_id).cloned()
    }

    pub fn current_fraction(&self) -> f64 {
        let total = self.current_download_size.load(Ordering::SeqCst);
        if total == 0 {
            return 0.0;
        }
        self.current_downloaded_bytes.load(Ordering::SeqCst) as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_cache_evicts_oldest_past_capacity() {
        let mut cache = CoverCache::default();
        for i in 0..(COVER_CACHE_CAPACITY + 5) {
            cache.insert(format!("rom-{i}"), vec![i as u8]);
        }
        assert_eq!(cache.order.len(), COVER_CACHE_CAPACITY);
        assert!(cache.get("rom-0").is_none());
        assert!(cache.get(&format!("rom-{}", COVER_CACHE_CAPACITY + 4)).is_some());
    }

    #[test]
    fn progress_counters_are_readable_without_locking() {
        let status = Status::new();
        status.current_download_size.store(100, Ordering::SeqCst);
        status.current_downloaded_bytes.store(25, Ordering::SeqCst);
        assert_eq!(status.current_fraction(), 0.25);
    }
}
