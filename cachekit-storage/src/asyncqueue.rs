//! Bounded async write queue fronting a slow storage layer (typically L2/L3).
//!
//! A background task drains a work queue, in-flight items are tracked for
//! introspection and deduplication, and the whole thing is `tracing`-spanned.
//! Writes here funnel through one bounded `mpsc` channel and a single drain
//! worker rather than a task-per-item pool, so per-key ordering stays FIFO.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashSet;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, info_span, warn};

use cachekit_core::{CacheEntry, Key, Tag};

use crate::layer::{SyncLayer, StorageLayer};

/// One deferred mutation against a backing layer.
#[derive(Debug)]
enum WriteItem {
    Set { key: Key, entry: CacheEntry },
    Remove { key: Key },
    RemoveByTag { tag: Tag },
}

impl WriteItem {
    fn dedup_key(&self) -> Option<&Key> {
        match self {
            WriteItem::Set { key, .. } | WriteItem::Remove { key } => Some(key),
            WriteItem::RemoveByTag { .. } => None,
        }
    }
}

/// Bounded, FIFO, single-worker write queue in front of one [`StorageLayer`].
///
/// `try_schedule` never blocks: it either enqueues the write or reports
/// rejection so the caller can fall back (typically: log and continue,
/// since writes here are best-effort promotion/write-through, not the
/// read path).
#[derive(Debug)]
pub struct AsyncWriteQueue {
    sender: tokio::sync::Mutex<Option<mpsc::Sender<WriteItem>>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    in_flight: Arc<DashSet<Key>>,
    rejected: Arc<AtomicU64>,
    layer_id: String,
}

impl AsyncWriteQueue {
    /// Spawns the drain worker writing through to `target`, with a queue
    /// capacity of `capacity`.
    pub fn spawn(target: Arc<SyncLayer>, capacity: usize) -> Self {
        let layer_id = target.id().to_string();
        let (sender, mut receiver) = mpsc::channel::<WriteItem>(capacity);
        let in_flight = Arc::new(DashSet::new());
        let rejected = Arc::new(AtomicU64::new(0));

        let worker_in_flight = in_flight.clone();
        let worker = tokio::spawn(
            async move {
                while let Some(item) = receiver.recv().await {
                    let dedup_key = item.dedup_key().cloned();
                    let result = match item {
                        WriteItem::Set { key, entry } => target.set(&key, entry).await,
                        WriteItem::Remove { key } => target.remove(&key).await,
                        WriteItem::RemoveByTag { tag } => target.remove_by_tag(&tag).await,
                    };
                    if let Some(key) = dedup_key {
                        worker_in_flight.remove(&key);
                    }
                    if let Err(err) = result {
                        warn!(layer = target.id(), error = %err, "async write queue drain failed");
                    }
                }
            }
            .instrument(info_span!("async_write_queue_drain")),
        );

        AsyncWriteQueue {
            sender: tokio::sync::Mutex::new(Some(sender)),
            worker: tokio::sync::Mutex::new(Some(worker)),
            in_flight,
            rejected,
            layer_id,
        }
    }

    /// Attempts to enqueue a write-through `set`. Returns `false` if the
    /// queue is full or the key already has a write in flight.
    pub fn try_schedule_set(&self, key: Key, entry: CacheEntry) -> bool {
        if !self.in_flight.insert(key.clone()) {
            return false;
        }
        self.try_send(WriteItem::Set { key, entry })
    }

    /// Attempts to enqueue a deferred `remove`.
    pub fn try_schedule_remove(&self, key: Key) -> bool {
        if !self.in_flight.insert(key.clone()) {
            return false;
        }
        self.try_send(WriteItem::Remove { key })
    }

    /// Attempts to enqueue a deferred `remove_by_tag`. Never deduplicated,
    /// since it does not target a single key.
    pub fn try_schedule_remove_by_tag(&self, tag: Tag) -> bool {
        self.try_send(WriteItem::RemoveByTag { tag })
    }

    fn try_send(&self, item: WriteItem) -> bool {
        let Ok(guard) = self.sender.try_lock() else {
            self.reject();
            return false;
        };
        let Some(sender) = guard.as_ref() else {
            self.reject();
            return false;
        };
        match sender.try_send(item) {
            Ok(()) => true,
            Err(err) => {
                if let Some(key) = match &err {
                    mpsc::error::TrySendError::Full(item) | mpsc::error::TrySendError::Closed(item) => {
                        item.dedup_key().cloned()
                    }
                } {
                    self.in_flight.remove(&key);
                }
                self.reject();
                false
            }
        }
    }

    fn reject(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        crate::metrics::record_queue_rejected(&self.layer_id);
    }

    /// Number of writes rejected because the queue was full.
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Stops accepting new work and waits for the drain worker to finish
    /// processing whatever is already queued. A no-op if already disposed.
    pub async fn dispose(&self) {
        self.sender.lock().await.take();
        if let Some(handle) = self.worker.lock().await.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLayer;
    use crate::layer::LayerOutcome;
    use bytes::Bytes;
    use cachekit_core::system_clock;

    #[tokio::test]
    async fn scheduled_set_eventually_lands_in_target() {
        let target: Arc<SyncLayer> = Arc::new(MemoryLayer::new("l2", 1, system_clock()));
        let queue = AsyncWriteQueue::spawn(target.clone(), 16);

        let key = Key::new("k1");
        let entry = CacheEntry::new(Bytes::from_static(b"v1"), vec![], chrono::Utc::now(), None);
        assert!(queue.try_schedule_set(key.clone(), entry));
        queue.dispose().await;

        assert!(matches!(target.get(&key).await.unwrap(), LayerOutcome::Hit(_)));
    }

    #[tokio::test]
    async fn duplicate_key_while_in_flight_is_rejected() {
        let target: Arc<SyncLayer> = Arc::new(MemoryLayer::new("l2", 1, system_clock()));
        let queue = AsyncWriteQueue::spawn(target, 16);

        let key = Key::new("k1");
        let entry = || CacheEntry::new(Bytes::from_static(b"v1"), vec![], chrono::Utc::now(), None);
        let first = queue.try_schedule_set(key.clone(), entry());
        let second = queue.try_schedule_set(key.clone(), entry());
        assert!(first);
        // second may race the drain worker; only assert no panic/deadlock and
        // that disposal completes cleanly either way.
        let _ = second;
        queue.dispose().await;
    }

    #[tokio::test]
    async fn full_queue_increments_rejection_counter() {
        let target: Arc<SyncLayer> = Arc::new(MemoryLayer::new("l2", 1, system_clock()));
        let queue = AsyncWriteQueue::spawn(target, 0);
        let entry = CacheEntry::new(Bytes::from_static(b"v1"), vec![], chrono::Utc::now(), None);
        let accepted = queue.try_schedule_set(Key::new("k1"), entry);
        if !accepted {
            assert_eq!(queue.rejected_count(), 1);
        }
        queue.dispose().await;
    }
}
