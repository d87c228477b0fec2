//! In-memory fakes for the `DistributedStorage`/`PersistentStorage`
//! collaborator traits.

use async_trait::async_trait;
use dashmap::DashMap;

use cachekit_core::{CacheEntry, Key, Tag};
use cachekit_storage::{DistributedStorage, LayerHealth, PersistentStorage, StorageError};

#[derive(Debug, Default)]
struct InMemoryStore {
    entries: DashMap<Key, CacheEntry>,
}

impl InMemoryStore {
    fn get(&self, key: &Key) -> Option<CacheEntry> {
        self.entries.get(key).map(|e| e.clone())
    }

    fn set(&self, key: &Key, entry: CacheEntry) {
        self.entries.insert(key.clone(), entry);
    }

    fn remove(&self, key: &Key) {
        self.entries.remove(key);
    }

    fn remove_by_tag(&self, tag: &Tag) {
        let victims: Vec<Key> = self
            .entries
            .iter()
            .filter(|e| e.value().tags().contains(tag))
            .map(|e| e.key().clone())
            .collect();
        for key in victims {
            self.entries.remove(&key);
        }
    }
}

/// An in-memory stand-in for a distributed ("L2") cache backend.
#[derive(Debug, Default)]
pub struct InMemoryDistributedStorage {
    store: InMemoryStore,
}

impl InMemoryDistributedStorage {
    /// Builds an empty fake.
    pub fn new() -> Self {
        InMemoryDistributedStorage::default()
    }
}

#[async_trait]
impl DistributedStorage for InMemoryDistributedStorage {
    async fn get(&self, key: &Key) -> Result<Option<CacheEntry>, StorageError> {
        Ok(self.store.get(key))
    }

    async fn set(&self, key: &Key, entry: CacheEntry) -> Result<(), StorageError> {
        self.store.set(key, entry);
        Ok(())
    }

    async fn remove(&self, key: &Key) -> Result<(), StorageError> {
        self.store.remove(key);
        Ok(())
    }

    async fn remove_by_tag(&self, tag: &Tag) -> Result<(), StorageError> {
        self.store.remove_by_tag(tag);
        Ok(())
    }

    async fn health(&self) -> LayerHealth {
        LayerHealth::Healthy
    }
}

/// An in-memory stand-in for a persistent ("L3") cache backend.
#[derive(Debug, Default)]
pub struct InMemoryPersistentStorage {
    store: InMemoryStore,
}

impl InMemoryPersistentStorage {
    /// Builds an empty fake.
    pub fn new() -> Self {
        InMemoryPersistentStorage::default()
    }
}

#[async_trait]
impl PersistentStorage for InMemoryPersistentStorage {
    async fn get(&self, key: &Key) -> Result<Option<CacheEntry>, StorageError> {
        Ok(self.store.get(key))
    }

    async fn set(&self, key: &Key, entry: CacheEntry) -> Result<(), StorageError> {
        self.store.set(key, entry);
        Ok(())
    }

    async fn remove(&self, key: &Key) -> Result<(), StorageError> {
        self.store.remove(key);
        Ok(())
    }

    async fn remove_by_tag(&self, tag: &Tag) -> Result<(), StorageError> {
        self.store.remove_by_tag(tag);
        Ok(())
    }

    async fn health(&self) -> LayerHealth {
        LayerHealth::Healthy
    }
}
