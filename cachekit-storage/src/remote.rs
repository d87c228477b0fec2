//! Collaborator contracts for the distributed ("L2") and persistent ("L3")
//! tiers, plus thin [`StorageLayer`] adapters over them.
//!
//! Concrete backends (Redis, SQL Server, ...) are out of scope — callers
//! supply an implementation of [`DistributedStorage`]/[`PersistentStorage`]
//! from a separate backend crate rather than this one.

use std::sync::Arc;

use async_trait::async_trait;

use cachekit_core::{CacheEntry, Key, Tag};

use crate::error::StorageError;
use crate::layer::{LayerHealth, LayerOutcome, StorageLayer};

/// A remote, shared cache tier (e.g. Redis). Network calls are expected to
/// fail occasionally; implementations should map transport errors to
/// [`StorageError::Unavailable`].
#[async_trait]
pub trait DistributedStorage: Send + Sync {
    /// Reads a raw entry.
    async fn get(&self, key: &Key) -> Result<Option<CacheEntry>, StorageError>;

    /// Writes a raw entry, capped at `max_ttl` if the caller's policy TTL
    /// exceeds it (`L2DefaultExpiration`).
    async fn set(&self, key: &Key, entry: CacheEntry) -> Result<(), StorageError>;

    /// Removes a raw entry.
    async fn remove(&self, key: &Key) -> Result<(), StorageError>;

    /// Removes every entry carrying `tag`, if the backend tracks tags
    /// itself; otherwise the coordinator resolves keys via the tag index
    /// first and calls `remove` per key instead.
    async fn remove_by_tag(&self, tag: &Tag) -> Result<(), StorageError>;

    /// Whether the backend is currently reachable.
    async fn health(&self) -> LayerHealth {
        LayerHealth::Healthy
    }
}

/// A durable, slower cache tier (e.g. a SQL table) used as the cache of
/// last resort before falling back to the factory.
#[async_trait]
pub trait PersistentStorage: Send + Sync {
    /// Reads a persisted entry.
    async fn get(&self, key: &Key) -> Result<Option<CacheEntry>, StorageError>;

    /// Persists an entry, capped at `L3MaxExpiration`.
    async fn set(&self, key: &Key, entry: CacheEntry) -> Result<(), StorageError>;

    /// Removes a persisted entry.
    async fn remove(&self, key: &Key) -> Result<(), StorageError>;

    /// Removes every persisted entry carrying `tag`.
    async fn remove_by_tag(&self, tag: &Tag) -> Result<(), StorageError>;

    /// Whether the backing store is currently reachable.
    async fn health(&self) -> LayerHealth {
        LayerHealth::Healthy
    }
}

/// Adapts a [`DistributedStorage`] collaborator into a [`StorageLayer`].
pub struct DistributedLayer {
    id: String,
    priority: u32,
    inner: Arc<dyn DistributedStorage>,
}

impl DistributedLayer {
    /// Wraps `inner` as a storage layer with the given id and priority.
    pub fn new(id: impl Into<String>, priority: u32, inner: Arc<dyn DistributedStorage>) -> Self {
        DistributedLayer {
            id: id.into(),
            priority,
            inner,
        }
    }
}

#[async_trait]
impl StorageLayer for DistributedLayer {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn get(&self, key: &Key) -> Result<LayerOutcome, StorageError> {
        Ok(match self.inner.get(key).await? {
            Some(entry) => LayerOutcome::Hit(entry),
            None => LayerOutcome::Miss,
        })
    }

    async fn set(&self, key: &Key, entry: CacheEntry) -> Result<(), StorageError> {
        self.inner.set(key, entry).await
    }

    async fn remove(&self, key: &Key) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }

    async fn remove_by_tag(&self, tag: &Tag) -> Result<(), StorageError> {
        self.inner.remove_by_tag(tag).await
    }

    async fn health(&self) -> LayerHealth {
        self.inner.health().await
    }
}

/// Adapts a [`PersistentStorage`] collaborator into a [`StorageLayer`].
pub struct PersistentLayer {
    id: String,
    priority: u32,
    inner: Arc<dyn PersistentStorage>,
}

impl PersistentLayer {
    /// Wraps `inner` as a storage layer with the given id and priority.
    pub fn new(id: impl Into<String>, priority: u32, inner: Arc<dyn PersistentStorage>) -> Self {
        PersistentLayer {
            id: id.into(),
            priority,
            inner,
        }
    }
}

#[async_trait]
impl StorageLayer for PersistentLayer {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn get(&self, key: &Key) -> Result<LayerOutcome, StorageError> {
        Ok(match self.inner.get(key).await? {
            Some(entry) => LayerOutcome::Hit(entry),
            None => LayerOutcome::Miss,
        })
    }

    async fn set(&self, key: &Key, entry: CacheEntry) -> Result<(), StorageError> {
        self.inner.set(key, entry).await
    }

    async fn remove(&self, key: &Key) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }

    async fn remove_by_tag(&self, tag: &Tag) -> Result<(), StorageError> {
        self.inner.remove_by_tag(tag).await
    }

    async fn health(&self) -> LayerHealth {
        self.inner.health().await
    }
}
