//! The storage layer contract every cache tier implements.
//!
//! One async trait, default methods for the optional bits (`health`,
//! `stats`, lifecycle hooks), and blanket implementations over `&dyn`,
//! `Box<dyn>`, and both `Arc<dyn ... + Send>`/`Arc<dyn ... + Send + Sync>` so
//! a coordinator can hold a homogeneous `Vec<Arc<dyn StorageLayer + Send + Sync>>`
//! regardless of which concrete layer sits where.

use std::sync::Arc;

use async_trait::async_trait;

use cachekit_core::{CacheEntry, Key, Tag};

use crate::error::StorageError;

/// The result of a layer-level read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayerOutcome {
    /// The layer holds a live entry for the key.
    Hit(CacheEntry),
    /// The layer was consulted and does not have the key.
    Miss,
    /// The layer declined to handle this request at all (e.g. a distributed
    /// layer that is present but disabled). Distinguished from `Miss` so the
    /// coordinator can skip promotion bookkeeping for layers that never
    /// actually looked.
    NotHandled,
}

/// Point-in-time health of a storage layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerHealth {
    /// The layer is reachable and serving requests.
    Healthy,
    /// The layer is reachable but degraded (e.g. elevated latency).
    Degraded,
    /// The layer could not be reached.
    Unavailable,
}

/// Coarse layer statistics, exposed for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayerStats {
    /// Number of entries currently tracked by the layer, if known.
    pub entry_count: Option<u64>,
    /// Total hits served since the layer started.
    pub hits: u64,
    /// Total misses served since the layer started.
    pub misses: u64,
    /// Estimated total in-memory footprint, in bytes, for layers that track
    /// it. `None` when the layer has no byte-level accounting (e.g. a
    /// [`MemoryLayer`](crate::memory::MemoryLayer) with
    /// [`MemoryAccounting::Disabled`](crate::memory::MemoryAccounting::Disabled)).
    pub bytes_estimate: Option<u64>,
}

/// One tier of the storage stack (L1 memory, L2 distributed, L3 persistent,
/// or an auxiliary layer such as the tag index).
///
/// # Dyn-compatibility
///
/// This trait is dyn-compatible. Blanket implementations are provided for
/// `&dyn StorageLayer`, `Box<dyn StorageLayer>`, `Arc<dyn StorageLayer + Send>`,
/// and `Arc<dyn StorageLayer + Send + Sync>`.
#[async_trait]
pub trait StorageLayer: Send + Sync {
    /// Stable identifier used in logs, metrics labels, and diagnostics.
    fn id(&self) -> &str;

    /// Ascending read/write order among enabled layers — lower runs first.
    fn priority(&self) -> u32;

    /// Whether this layer currently participates in coordinator operations.
    fn enabled(&self) -> bool {
        true
    }

    /// Reads an entry by key.
    async fn get(&self, key: &Key) -> Result<LayerOutcome, StorageError>;

    /// Writes an entry, overwriting any existing value for the key.
    async fn set(&self, key: &Key, entry: CacheEntry) -> Result<(), StorageError>;

    /// Removes an entry by key. Idempotent: removing an absent key succeeds.
    async fn remove(&self, key: &Key) -> Result<(), StorageError>;

    /// Removes every entry carrying `tag`. Layers that do not track tags
    /// locally (e.g. a thin L2 adapter) may delegate this to the tag index
    /// and simply remove the resolved keys.
    async fn remove_by_tag(&self, tag: &Tag) -> Result<(), StorageError>;

    /// Removes every entry the layer holds. Layers with no bulk-clear
    /// primitive may leave this a no-op; the default does nothing.
    async fn clear(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Whether the layer currently holds a value for `key`, without
    /// fetching it.
    async fn exists(&self, key: &Key) -> Result<bool, StorageError> {
        Ok(matches!(self.get(key).await?, LayerOutcome::Hit(_)))
    }

    /// Current health of the layer.
    async fn health(&self) -> LayerHealth {
        LayerHealth::Healthy
    }

    /// Coarse statistics for diagnostics.
    fn stats(&self) -> LayerStats {
        LayerStats::default()
    }

    /// Runs once before the layer is added to a coordinator.
    async fn initialize(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Runs once when the coordinator is torn down; best-effort.
    async fn dispose(&self) {}
}

#[async_trait]
impl StorageLayer for &dyn StorageLayer {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn priority(&self) -> u32 {
        (**self).priority()
    }

    fn enabled(&self) -> bool {
        (**self).enabled()
    }

    async fn get(&self, key: &Key) -> Result<LayerOutcome, StorageError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &Key, entry: CacheEntry) -> Result<(), StorageError> {
        (**self).set(key, entry).await
    }

    async fn remove(&self, key: &Key) -> Result<(), StorageError> {
        (**self).remove(key).await
    }

    async fn remove_by_tag(&self, tag: &Tag) -> Result<(), StorageError> {
        (**self).remove_by_tag(tag).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        (**self).clear().await
    }

    async fn exists(&self, key: &Key) -> Result<bool, StorageError> {
        (**self).exists(key).await
    }

    async fn health(&self) -> LayerHealth {
        (**self).health().await
    }

    fn stats(&self) -> LayerStats {
        (**self).stats()
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        (**self).initialize().await
    }

    async fn dispose(&self) {
        (**self).dispose().await
    }
}

#[async_trait]
impl StorageLayer for Box<dyn StorageLayer> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn priority(&self) -> u32 {
        (**self).priority()
    }

    fn enabled(&self) -> bool {
        (**self).enabled()
    }

    async fn get(&self, key: &Key) -> Result<LayerOutcome, StorageError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &Key, entry: CacheEntry) -> Result<(), StorageError> {
        (**self).set(key, entry).await
    }

    async fn remove(&self, key: &Key) -> Result<(), StorageError> {
        (**self).remove(key).await
    }

    async fn remove_by_tag(&self, tag: &Tag) -> Result<(), StorageError> {
        (**self).remove_by_tag(tag).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        (**self).clear().await
    }

    async fn exists(&self, key: &Key) -> Result<bool, StorageError> {
        (**self).exists(key).await
    }

    async fn health(&self) -> LayerHealth {
        (**self).health().await
    }

    fn stats(&self) -> LayerStats {
        (**self).stats()
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        (**self).initialize().await
    }

    async fn dispose(&self) {
        (**self).dispose().await
    }
}

/// A dynamically dispatched layer that is `Send` but not necessarily `Sync`.
pub type UnsyncLayer = dyn StorageLayer + Send;
/// A dynamically dispatched layer that is `Send + Sync`, the shape the
/// coordinator actually stores.
pub type SyncLayer = dyn StorageLayer + Send + Sync;

#[async_trait]
impl StorageLayer for Arc<UnsyncLayer> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn priority(&self) -> u32 {
        (**self).priority()
    }

    fn enabled(&self) -> bool {
        (**self).enabled()
    }

    async fn get(&self, key: &Key) -> Result<LayerOutcome, StorageError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &Key, entry: CacheEntry) -> Result<(), StorageError> {
        (**self).set(key, entry).await
    }

    async fn remove(&self, key: &Key) -> Result<(), StorageError> {
        (**self).remove(key).await
    }

    async fn remove_by_tag(&self, tag: &Tag) -> Result<(), StorageError> {
        (**self).remove_by_tag(tag).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        (**self).clear().await
    }

    async fn exists(&self, key: &Key) -> Result<bool, StorageError> {
        (**self).exists(key).await
    }

    async fn health(&self) -> LayerHealth {
        (**self).health().await
    }

    fn stats(&self) -> LayerStats {
        (**self).stats()
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        (**self).initialize().await
    }

    async fn dispose(&self) {
        (**self).dispose().await
    }
}

#[async_trait]
impl StorageLayer for Arc<SyncLayer> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn priority(&self) -> u32 {
        (**self).priority()
    }

    fn enabled(&self) -> bool {
        (**self).enabled()
    }

    async fn get(&self, key: &Key) -> Result<LayerOutcome, StorageError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &Key, entry: CacheEntry) -> Result<(), StorageError> {
        (**self).set(key, entry).await
    }

    async fn remove(&self, key: &Key) -> Result<(), StorageError> {
        (**self).remove(key).await
    }

    async fn remove_by_tag(&self, tag: &Tag) -> Result<(), StorageError> {
        (**self).remove_by_tag(tag).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        (**self).clear().await
    }

    async fn exists(&self, key: &Key) -> Result<bool, StorageError> {
        (**self).exists(key).await
    }

    async fn health(&self) -> LayerHealth {
        (**self).health().await
    }

    fn stats(&self) -> LayerStats {
        (**self).stats()
    }

    async fn initialize(&self) -> Result<(), StorageError> {
        (**self).initialize().await
    }

    async fn dispose(&self) {
        (**self).dispose().await
    }
}
