//! In-process "L1" storage layer: a `DashMap`-backed TTL map with optional
//! LRU eviction and a pluggable memory-accounting strategy.
//!
//! `DashMap` is already internally sharded, so no extra sharding layer is
//! needed on top.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration as StdDuration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use cachekit_core::{CacheEntry, Key, SharedClock, Tag};

use crate::error::StorageError;
use crate::layer::{LayerHealth, LayerOutcome, LayerStats, StorageLayer};

/// Number of entries sampled when [`MemoryAccounting::Sampling`] resyncs the
/// running byte total.
const SAMPLE_SIZE: usize = 32;

/// How a [`MemoryLayer`] estimates the in-memory footprint of its entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryAccounting {
    /// No accounting; `max_bytes` is ignored and only `max_entries` caps
    /// the map.
    Disabled,
    /// Use each entry's cheap [`CacheEntry::size_estimate`] as-is.
    Fast,
    /// Recompute an accurate size for a random sample of entries on every
    /// write, extrapolating the total from the sample.
    Sampling {
        /// Percentage (0-100) of writes that trigger a resize measurement.
        percent: u8,
    },
    /// Recompute the accurate total on a fixed interval rather than per
    /// write.
    Accurate {
        /// How often to recompute the accurate total.
        recalc_interval: StdDuration,
    },
}

impl Default for MemoryAccounting {
    fn default() -> Self {
        MemoryAccounting::Fast
    }
}

#[derive(Debug)]
struct Slot {
    entry: CacheEntry,
    last_access_seq: AtomicU64,
    byte_len: u64,
}

fn estimate_entry_bytes(entry: &CacheEntry) -> u64 {
    entry.size_estimate().unwrap_or_else(|| entry.value().len()) as u64
}

/// In-memory storage layer. The fastest tier; holds no entries across
/// process restarts.
#[derive(Debug)]
pub struct MemoryLayer {
    id: String,
    priority: u32,
    entries: DashMap<Key, Slot>,
    max_entries: Option<usize>,
    max_bytes: Option<u64>,
    accounting: MemoryAccounting,
    clock: SharedClock,
    access_counter: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    total_bytes: AtomicU64,
    last_accurate_recalc: Mutex<Instant>,
}

impl MemoryLayer {
    /// Builds an unbounded memory layer with [`MemoryAccounting::Fast`].
    pub fn new(id: impl Into<String>, priority: u32, clock: SharedClock) -> Self {
        let now = clock.now_instant();
        MemoryLayer {
            id: id.into(),
            priority,
            entries: DashMap::new(),
            max_entries: None,
            max_bytes: None,
            accounting: MemoryAccounting::default(),
            clock,
            access_counter: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            last_accurate_recalc: Mutex::new(now),
        }
    }

    /// Caps the number of entries; the least-recently-used entry is evicted
    /// once a write would exceed the cap.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    /// Caps the estimated byte footprint; ignored when `accounting` is
    /// [`MemoryAccounting::Disabled`].
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Overrides the memory-accounting strategy.
    pub fn with_accounting(mut self, accounting: MemoryAccounting) -> Self {
        self.accounting = accounting;
        self
    }

    fn touch(&self, slot: &Slot) {
        let seq = self.access_counter.fetch_add(1, Ordering::Relaxed);
        slot.last_access_seq.store(seq, Ordering::Relaxed);
    }

    fn untrack_bytes(&self, slot: &Slot) {
        if self.accounting != MemoryAccounting::Disabled {
            self.total_bytes.fetch_sub(slot.byte_len, Ordering::Relaxed);
        }
    }

    /// Resyncs the running byte total per the configured accounting mode.
    /// `Fast` keeps the incrementally maintained total as-is; `Sampling`
    /// extrapolates from a random subset on a `percent` chance per write;
    /// `Accurate` walks every entry once `recalc_interval` has elapsed.
    fn resync_accounting(&self) {
        match self.accounting {
            MemoryAccounting::Disabled | MemoryAccounting::Fast => {}
            MemoryAccounting::Sampling { percent } => {
                if rand::random::<u8>() % 100 < percent.min(100) {
                    self.resync_from_sample();
                }
            }
            MemoryAccounting::Accurate { recalc_interval } => {
                let mut last = self.last_accurate_recalc.lock().unwrap();
                let now = self.clock.now_instant();
                if now.duration_since(*last) >= recalc_interval {
                    self.resync_exact();
                    *last = now;
                }
            }
        }
    }

    fn resync_from_sample(&self) {
        let total_entries = self.entries.len();
        if total_entries == 0 {
            self.total_bytes.store(0, Ordering::Relaxed);
            return;
        }
        let sample: Vec<u64> = self.entries.iter().take(SAMPLE_SIZE).map(|e| e.value().byte_len).collect();
        if sample.is_empty() {
            return;
        }
        let avg = sample.iter().sum::<u64>() / sample.len() as u64;
        self.total_bytes.store(avg * total_entries as u64, Ordering::Relaxed);
    }

    fn resync_exact(&self) {
        let exact: u64 = self.entries.iter().map(|e| e.value().byte_len).sum();
        self.total_bytes.store(exact, Ordering::Relaxed);
    }

    /// Evicts entries beyond `max_entries` and/or `max_bytes`, oldest-accessed
    /// first.
    ///
    /// Collects the victim list up front, then removes in a second pass, so
    /// no shard's write lock is held while choosing victims.
    fn enforce_caps(&self) {
        let over_entries = self.max_entries.is_some_and(|max| self.entries.len() > max);
        let over_bytes = self.accounting != MemoryAccounting::Disabled
            && self
                .max_bytes
                .is_some_and(|max| self.total_bytes.load(Ordering::Relaxed) > max);
        if !over_entries && !over_bytes {
            return;
        }

        let mut candidates: Vec<(Key, u64, u64)> = self
            .entries
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.value().last_access_seq.load(Ordering::Relaxed),
                    entry.value().byte_len,
                )
            })
            .collect();
        candidates.sort_by_key(|(_, seq, _)| *seq);

        let min_entries = self.max_entries.unwrap_or(usize::MAX);
        let max_bytes = self.max_bytes.unwrap_or(u64::MAX);
        for (key, _, byte_len) in candidates {
            let still_over_entries = self.entries.len() > min_entries;
            let still_over_bytes =
                self.accounting != MemoryAccounting::Disabled && self.total_bytes.load(Ordering::Relaxed) > max_bytes;
            if !still_over_entries && !still_over_bytes {
                break;
            }
            if self.entries.remove(&key).is_some() {
                self.total_bytes.fetch_sub(byte_len, Ordering::Relaxed);
            }
        }
    }
}

#[async_trait]
impl StorageLayer for MemoryLayer {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn get(&self, key: &Key) -> Result<LayerOutcome, StorageError> {
        let now = self.clock.now_utc();
        match self.entries.get(key) {
            Some(slot) => {
                if slot.entry.is_expired_at(now) {
                    drop(slot);
                    if let Some((_, slot)) = self.entries.remove(key) {
                        self.untrack_bytes(&slot);
                    }
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    #[cfg(feature = "metrics")]
                    crate::metrics::record_miss(&self.id);
                    Ok(LayerOutcome::Miss)
                } else {
                    self.touch(&slot);
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    #[cfg(feature = "metrics")]
                    crate::metrics::record_hit(&self.id);
                    Ok(LayerOutcome::Hit(slot.entry.clone()))
                }
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "metrics")]
                crate::metrics::record_miss(&self.id);
                Ok(LayerOutcome::Miss)
            }
        }
    }

    async fn set(&self, key: &Key, entry: CacheEntry) -> Result<(), StorageError> {
        let seq = self.access_counter.fetch_add(1, Ordering::Relaxed);
        let byte_len = estimate_entry_bytes(&entry);
        let previous = self.entries.insert(
            key.clone(),
            Slot {
                entry,
                last_access_seq: AtomicU64::new(seq),
                byte_len,
            },
        );
        if self.accounting != MemoryAccounting::Disabled {
            if let Some(previous) = previous {
                self.total_bytes.fetch_sub(previous.byte_len, Ordering::Relaxed);
            }
            self.total_bytes.fetch_add(byte_len, Ordering::Relaxed);
        }
        self.resync_accounting();
        self.enforce_caps();
        Ok(())
    }

    async fn remove(&self, key: &Key) -> Result<(), StorageError> {
        if let Some((_, slot)) = self.entries.remove(key) {
            self.untrack_bytes(&slot);
        }
        Ok(())
    }

    async fn remove_by_tag(&self, tag: &Tag) -> Result<(), StorageError> {
        let victims: Vec<Key> = self
            .entries
            .iter()
            .filter(|entry| entry.value().entry.tags().contains(tag))
            .map(|entry| entry.key().clone())
            .collect();
        for key in victims {
            if let Some((_, slot)) = self.entries.remove(&key) {
                self.untrack_bytes(&slot);
            }
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.entries.clear();
        self.total_bytes.store(0, Ordering::Relaxed);
        Ok(())
    }

    async fn health(&self) -> LayerHealth {
        LayerHealth::Healthy
    }

    fn stats(&self) -> LayerStats {
        LayerStats {
            entry_count: Some(self.entries.len() as u64),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bytes_estimate: (self.accounting != MemoryAccounting::Disabled)
                .then(|| self.total_bytes.load(Ordering::Relaxed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use cachekit_core::system_clock;

    fn entry(value: &'static str, tags: Vec<Tag>) -> CacheEntry {
        CacheEntry::new(Bytes::from_static(value.as_bytes()), tags, chrono::Utc::now(), None)
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let layer = MemoryLayer::new("l1", 0, system_clock());
        let key = Key::new("k1");
        layer.set(&key, entry("v1", vec![])).await.unwrap();
        match layer.get(&key).await.unwrap() {
            LayerOutcome::Hit(e) => assert_eq!(e.value(), &Bytes::from_static(b"v1")),
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn expired_entry_is_evicted_on_read() {
        let clock = system_clock();
        let layer = MemoryLayer::new("l1", 0, clock.clone());
        let key = Key::new("k1");
        let past_entry = CacheEntry::new(
            Bytes::from_static(b"v1"),
            vec![],
            clock.now_utc() - chrono::Duration::seconds(10),
            Some(clock.now_utc() - chrono::Duration::seconds(1)),
        );
        layer.set(&key, past_entry).await.unwrap();
        assert_eq!(layer.get(&key).await.unwrap(), LayerOutcome::Miss);
    }

    #[tokio::test]
    async fn eviction_drops_least_recently_used_entry() {
        let layer = MemoryLayer::new("l1", 0, system_clock()).with_max_entries(2);
        let (k1, k2, k3) = (Key::new("k1"), Key::new("k2"), Key::new("k3"));
        layer.set(&k1, entry("v1", vec![])).await.unwrap();
        layer.set(&k2, entry("v2", vec![])).await.unwrap();
        layer.get(&k1).await.unwrap();
        layer.set(&k3, entry("v3", vec![])).await.unwrap();

        assert_eq!(layer.get(&k2).await.unwrap(), LayerOutcome::Miss);
        assert!(matches!(layer.get(&k1).await.unwrap(), LayerOutcome::Hit(_)));
        assert!(matches!(layer.get(&k3).await.unwrap(), LayerOutcome::Hit(_)));
    }

    #[tokio::test]
    async fn remove_by_tag_only_removes_tagged_keys() {
        let layer = MemoryLayer::new("l1", 0, system_clock());
        let (k1, k2) = (Key::new("k1"), Key::new("k2"));
        layer.set(&k1, entry("v1", vec![Tag::new("a")])).await.unwrap();
        layer.set(&k2, entry("v2", vec![Tag::new("b")])).await.unwrap();
        layer.remove_by_tag(&Tag::new("a")).await.unwrap();
        assert_eq!(layer.get(&k1).await.unwrap(), LayerOutcome::Miss);
        assert!(matches!(layer.get(&k2).await.unwrap(), LayerOutcome::Hit(_)));
    }

    #[tokio::test]
    async fn disabled_accounting_reports_no_byte_estimate_and_ignores_max_bytes() {
        let layer = MemoryLayer::new("l1", 0, system_clock())
            .with_accounting(MemoryAccounting::Disabled)
            .with_max_bytes(1);
        let (k1, k2) = (Key::new("k1"), Key::new("k2"));
        layer.set(&k1, entry("v1", vec![])).await.unwrap();
        layer.set(&k2, entry("v2", vec![])).await.unwrap();

        assert_eq!(layer.stats().bytes_estimate, None);
        assert!(matches!(layer.get(&k1).await.unwrap(), LayerOutcome::Hit(_)));
        assert!(matches!(layer.get(&k2).await.unwrap(), LayerOutcome::Hit(_)));
    }

    #[tokio::test]
    async fn fast_accounting_tracks_running_byte_total() {
        let layer = MemoryLayer::new("l1", 0, system_clock());
        let (k1, k2) = (Key::new("k1"), Key::new("k2"));
        layer.set(&k1, entry("v1", vec![])).await.unwrap();
        layer.set(&k2, entry("v2", vec![])).await.unwrap();

        assert_eq!(layer.stats().bytes_estimate, Some(4));
        layer.remove(&k1).await.unwrap();
        assert_eq!(layer.stats().bytes_estimate, Some(2));
    }

    #[tokio::test]
    async fn max_bytes_evicts_oldest_accessed_entry_once_over_budget() {
        let layer = MemoryLayer::new("l1", 0, system_clock()).with_max_bytes(4);
        let (k1, k2, k3) = (Key::new("k1"), Key::new("k2"), Key::new("k3"));
        layer.set(&k1, entry("v1", vec![])).await.unwrap();
        layer.set(&k2, entry("v2", vec![])).await.unwrap();
        layer.get(&k1).await.unwrap();
        layer.set(&k3, entry("v3", vec![])).await.unwrap();

        assert_eq!(layer.get(&k2).await.unwrap(), LayerOutcome::Miss);
        assert!(matches!(layer.get(&k1).await.unwrap(), LayerOutcome::Hit(_)));
        assert!(matches!(layer.get(&k3).await.unwrap(), LayerOutcome::Hit(_)));
        assert!(layer.stats().bytes_estimate.unwrap() <= 4);
    }

    #[tokio::test]
    async fn clear_drops_every_entry_and_resets_byte_total() {
        let layer = MemoryLayer::new("l1", 0, system_clock());
        let (k1, k2) = (Key::new("k1"), Key::new("k2"));
        layer.set(&k1, entry("v1", vec![])).await.unwrap();
        layer.set(&k2, entry("v2", vec![])).await.unwrap();

        layer.clear().await.unwrap();

        assert_eq!(layer.get(&k1).await.unwrap(), LayerOutcome::Miss);
        assert_eq!(layer.get(&k2).await.unwrap(), LayerOutcome::Miss);
        assert_eq!(layer.stats().bytes_estimate, Some(0));
    }

    #[tokio::test]
    async fn accurate_accounting_recomputes_exact_total_after_interval() {
        let layer = MemoryLayer::new("l1", 0, system_clock()).with_accounting(MemoryAccounting::Accurate {
            recalc_interval: StdDuration::from_secs(0),
        });
        let key = Key::new("k1");
        layer.set(&key, entry("v1", vec![])).await.unwrap();
        assert_eq!(layer.stats().bytes_estimate, Some(2));
    }
}
