//! Orders enabled layers by ascending priority and drives the read/write/
//! remove/remove-by-tag algorithms across them.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cachekit_core::{CacheEntry, Key, Tag};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::asyncqueue::AsyncWriteQueue;
use crate::backplane::{BackplaneListener, InvalidationMessage};
use crate::error::StorageError;
use crate::layer::{LayerOutcome, StorageLayer, SyncLayer};
use crate::tagindex::TagIndex;

/// Stable id of the L1 tier, used both to cap promoted TTLs and to scope
/// backplane-driven invalidations — peers' invalidations apply to L1 and
/// the tag index only, never to L2/L3.
const L1_LAYER_ID: &str = "l1";

/// Per-layer TTL caps applied on promotion, named after the logical
/// configuration keys in the external-interfaces contract.
#[derive(Clone, Copy, Debug)]
pub struct PromotionCaps {
    /// Maximum TTL written to L1 on promotion.
    pub l1_max_expiration: Option<Duration>,
    /// Default TTL written to L2 when a caller's policy TTL is absent.
    pub l2_default_expiration: Option<Duration>,
    /// Maximum TTL written to L3 on promotion.
    pub l3_max_expiration: Option<Duration>,
}

impl Default for PromotionCaps {
    fn default() -> Self {
        PromotionCaps {
            l1_max_expiration: None,
            l2_default_expiration: None,
            l3_max_expiration: None,
        }
    }
}

/// Which layers write asynchronously through an [`AsyncWriteQueue`] rather
/// than inline on the caller's task.
#[derive(Default)]
pub struct AsyncWritePolicy {
    queues: std::collections::HashMap<String, Arc<AsyncWriteQueue>>,
}

impl AsyncWritePolicy {
    /// Builds an empty policy (every layer writes synchronously).
    pub fn new() -> Self {
        AsyncWritePolicy::default()
    }

    /// Routes writes targeting `layer_id` through `queue` instead of inline.
    pub fn with_async_layer(mut self, layer_id: impl Into<String>, queue: Arc<AsyncWriteQueue>) -> Self {
        self.queues.insert(layer_id.into(), queue);
        self
    }

    fn queue_for(&self, layer_id: &str) -> Option<&Arc<AsyncWriteQueue>> {
        self.queues.get(layer_id)
    }
}

/// Orchestrates a priority-ordered stack of [`StorageLayer`]s plus the
/// auxiliary tag index and backplane.
pub struct Coordinator {
    layers: Vec<Arc<SyncLayer>>,
    tag_index: Arc<TagIndex>,
    backplane: Option<Arc<BackplaneListener>>,
    caps: PromotionCaps,
    async_writes: AsyncWritePolicy,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Builds a coordinator over `layers`, sorted ascending by priority.
    /// Disabled layers are kept (so diagnostics can still see them) but
    /// skipped by every operation.
    ///
    /// When `backplane` is present and at least one L1 layer is registered,
    /// spawns a background task that drains the backplane's foreign stream
    /// and applies peers' invalidations to L1 and the tag index. Must be
    /// called from within a running Tokio runtime.
    pub fn new(
        mut layers: Vec<Arc<SyncLayer>>,
        tag_index: Arc<TagIndex>,
        backplane: Option<Arc<BackplaneListener>>,
        caps: PromotionCaps,
        async_writes: AsyncWritePolicy,
    ) -> Self {
        layers.sort_by_key(|l| l.priority());
        let coordinator = Coordinator {
            layers,
            tag_index,
            backplane,
            caps,
            async_writes,
            tasks: Mutex::new(Vec::new()),
        };
        coordinator.spawn_backplane_consumer();
        coordinator
    }

    fn enabled_layers(&self) -> impl Iterator<Item = &Arc<SyncLayer>> {
        self.layers.iter().filter(|l| l.enabled())
    }

    fn l1_layers(&self) -> Vec<Arc<SyncLayer>> {
        self.layers
            .iter()
            .filter(|l| l.id() == L1_LAYER_ID)
            .cloned()
            .collect()
    }

    fn spawn_backplane_consumer(&self) {
        let Some(backplane) = self.backplane.clone() else {
            return;
        };
        let l1_layers = self.l1_layers();
        if l1_layers.is_empty() {
            return;
        }
        let tag_index = self.tag_index.clone();
        let handle = tokio::spawn(async move {
            let mut foreign = Box::pin(backplane.subscribe_foreign());
            while let Some(message) = foreign.next().await {
                match message {
                    InvalidationMessage::Key { key, .. } => {
                        for layer in &l1_layers {
                            if let Err(err) = layer.remove(&key).await {
                                warn!(layer = layer.id(), error = %err, "backplane-driven remove failed");
                            }
                        }
                        tag_index.forget(&key);
                    }
                    InvalidationMessage::Tag { tag, .. } => {
                        let keys = tag_index.keys_for_tag(&tag);
                        for layer in &l1_layers {
                            if let Err(err) = layer.remove_by_tag(&tag).await {
                                warn!(layer = layer.id(), error = %err, "backplane-driven remove_by_tag failed");
                            }
                        }
                        for key in &keys {
                            tag_index.forget(key);
                        }
                    }
                    InvalidationMessage::ClearAll { .. } => {
                        for layer in &l1_layers {
                            if let Err(err) = layer.clear().await {
                                warn!(layer = layer.id(), error = %err, "backplane-driven clear failed");
                            }
                        }
                        tag_index.clear();
                    }
                }
            }
        });
        self.tasks.lock().unwrap().push(handle);
    }

    /// Stops the backplane consumer task, if one was spawned. The
    /// coordinator keeps serving local reads/writes afterward; it simply
    /// stops applying peers' invalidations.
    pub fn dispose(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        for task in tasks.drain(..) {
            task.abort();
        }
    }

    /// Reads `key` from the first layer (ascending priority) that has it,
    /// promoting the hit to every faster layer that missed or was not
    /// consulted.
    pub async fn get(&self, key: &Key, cancel: &CancellationToken) -> Result<Option<CacheEntry>, StorageError> {
        let mut missed_layers: Vec<&Arc<SyncLayer>> = Vec::new();

        for layer in self.enabled_layers() {
            if cancel.is_cancelled() {
                return Err(StorageError::Cancelled);
            }
            match layer.get(key).await {
                Ok(LayerOutcome::Hit(entry)) => {
                    debug!(layer = layer.id(), %key, "cache hit");
                    self.promote(key, &entry, &missed_layers).await;
                    return Ok(Some(entry));
                }
                Ok(LayerOutcome::Miss) => missed_layers.push(layer),
                Ok(LayerOutcome::NotHandled) => {}
                Err(err) => {
                    warn!(layer = layer.id(), error = %err, "layer read failed, continuing");
                }
            }
        }
        Ok(None)
    }

    async fn promote(&self, key: &Key, entry: &CacheEntry, faster_layers: &[&Arc<SyncLayer>]) {
        for layer in faster_layers {
            let capped = self.cap_entry_for_layer(layer.id(), entry);
            if let Err(err) = layer.set(key, capped).await {
                warn!(layer = layer.id(), error = %err, "promotion write failed");
            }
        }
    }

    fn cap_entry_for_layer(&self, layer_id: &str, entry: &CacheEntry) -> CacheEntry {
        let cap = match layer_id {
            L1_LAYER_ID => self.caps.l1_max_expiration,
            "l2" => self.caps.l2_default_expiration,
            "l3" => self.caps.l3_max_expiration,
            _ => None,
        };
        let Some(cap) = cap else {
            return entry.clone();
        };
        let capped_expiry = chrono::Utc::now() + chrono::Duration::from_std(cap).unwrap_or_default();
        let expires_at = match entry.expires_at() {
            Some(existing) if existing <= capped_expiry => Some(existing),
            _ => Some(capped_expiry),
        };
        CacheEntry::new(entry.value().clone(), entry.tags().to_vec(), entry.created_at(), expires_at)
    }

    /// Writes `entry` through every enabled layer, tag index first. Layers
    /// configured for async writes are scheduled on their queue instead of
    /// written inline; queue rejections are logged and do not fail the call.
    pub async fn set(&self, key: &Key, entry: CacheEntry) -> Result<(), StorageError> {
        self.tag_index.record(key, entry.tags());

        for layer in self.enabled_layers() {
            let capped = self.cap_entry_for_layer(layer.id(), &entry);
            if let Some(queue) = self.async_writes.queue_for(layer.id()) {
                if !queue.try_schedule_set(key.clone(), capped) {
                    warn!(layer = layer.id(), %key, "async write queue rejected set");
                }
            } else if let Err(err) = layer.set(key, capped).await {
                warn!(layer = layer.id(), error = %err, "layer write failed");
            }
        }
        Ok(())
    }

    /// Removes `key` from every enabled layer and the tag index, then fans
    /// the removal out over the backplane.
    pub async fn remove(&self, key: &Key) -> Result<(), StorageError> {
        self.tag_index.forget(key);
        for layer in self.enabled_layers() {
            if let Err(err) = layer.remove(key).await {
                warn!(layer = layer.id(), error = %err, "layer remove failed");
            }
        }
        if let Some(backplane) = &self.backplane {
            backplane.publish_invalidation(key).await;
        }
        Ok(())
    }

    /// Resolves every key carrying `tag` via the tag index, then removes
    /// each one from every enabled layer, and fans the tag invalidation out
    /// over the backplane.
    pub async fn remove_by_tag(&self, tag: &Tag) -> Result<(), StorageError> {
        let keys = self.tag_index.keys_for_tag(tag);
        for layer in self.enabled_layers() {
            if let Err(err) = layer.remove_by_tag(tag).await {
                warn!(layer = layer.id(), error = %err, "layer remove_by_tag failed");
            }
        }
        for key in &keys {
            self.tag_index.forget(key);
        }
        if let Some(backplane) = &self.backplane {
            backplane.publish_tag_invalidation(tag).await;
        }
        Ok(())
    }

    /// Resolves every key matching `pattern` via the tag index and removes
    /// them individually.
    pub async fn remove_by_tag_pattern(&self, pattern: &str) -> Result<(), StorageError> {
        let keys = self.tag_index.keys_for_tag_pattern(pattern);
        for key in keys {
            self.remove(&key).await?;
        }
        Ok(())
    }

    /// Clears every enabled layer and the tag index, then fans the
    /// clear-everything event out over the backplane.
    pub async fn clear_all(&self) -> Result<(), StorageError> {
        for layer in self.enabled_layers() {
            if let Err(err) = layer.clear().await {
                warn!(layer = layer.id(), error = %err, "layer clear failed");
            }
        }
        self.tag_index.clear();
        if let Some(backplane) = &self.backplane {
            backplane.publish_clear_all().await;
        }
        Ok(())
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.dispose();
    }
}
