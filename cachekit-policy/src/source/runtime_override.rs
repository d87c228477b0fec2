//! Mutable, in-memory policy overrides — highest priority by convention.
//!
//! Backed by a `DashMap`, the same concurrent-state shape the storage crate
//! uses throughout; changes broadcast over a bounded `tokio::sync::broadcast`
//! channel so watchers observe `Added`/`Updated`/`Removed` as they happen.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use cachekit_core::{CachePolicy, ChangeReason, MethodId, PolicyChange, PolicyDelta, PolicySnapshot};

use crate::error::SourceError;
use crate::source::{ChangeStream, PolicySource};

/// Runtime-mutable policy overrides, exposed via `apply`/`remove`/`clear`.
#[derive(Debug)]
pub struct RuntimeOverrideSource {
    entries: DashMap<MethodId, CachePolicy>,
    changes: broadcast::Sender<PolicyChange>,
}

impl RuntimeOverrideSource {
    /// Builds an empty override table with a `capacity`-sized change buffer.
    pub fn new(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity);
        RuntimeOverrideSource {
            entries: DashMap::new(),
            changes,
        }
    }

    /// Applies (inserts or replaces) overrides for the given entries,
    /// broadcasting `Added` for new method ids and `Updated` for existing
    /// ones.
    pub fn apply(&self, entries: Vec<(MethodId, CachePolicy)>) {
        let now = chrono::Utc::now();
        for (method_id, policy) in entries {
            let reason = if self.entries.contains_key(&method_id) {
                ChangeReason::Updated
            } else {
                ChangeReason::Added
            };
            let delta = PolicyDelta::set_all(policy.clone());
            self.entries.insert(method_id.clone(), policy);
            let _ = self.changes.send(PolicyChange {
                source_id: self.source_id().into(),
                method_id,
                delta,
                reason,
                at: now,
            });
        }
    }

    /// Removes the override for `method_id`, if any, broadcasting `Removed`.
    pub fn remove(&self, method_id: &MethodId) {
        if let Some((_, policy)) = self.entries.remove(method_id) {
            let clear_mask = policy.populated_fields();
            let _ = self.changes.send(PolicyChange {
                source_id: self.source_id().into(),
                method_id: method_id.clone(),
                delta: PolicyDelta::clear_fields(clear_mask),
                reason: ChangeReason::Removed,
                at: chrono::Utc::now(),
            });
        }
    }

    /// Removes every override, broadcasting `Removed` for each.
    pub fn clear(&self) {
        let method_ids: Vec<MethodId> = self.entries.iter().map(|e| e.key().clone()).collect();
        for method_id in method_ids {
            self.remove(&method_id);
        }
    }
}

#[async_trait]
impl PolicySource for RuntimeOverrideSource {
    fn source_id(&self) -> &str {
        "runtime-override"
    }

    async fn snapshot(&self) -> Result<Vec<PolicySnapshot>, SourceError> {
        let now = chrono::Utc::now();
        Ok(self
            .entries
            .iter()
            .map(|entry| PolicySnapshot {
                source_id: self.source_id().into(),
                method_id: entry.key().clone(),
                policy: entry.value().clone(),
                produced_at: now,
                metadata: Default::default(),
            })
            .collect())
    }

    fn watch(&self) -> ChangeStream {
        let stream = BroadcastStream::new(self.changes.subscribe()).filter_map(|item| item.ok());
        Box::pin(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn apply_then_remove_round_trips_through_snapshot() {
        let source = RuntimeOverrideSource::new(16);
        let method_id = MethodId::new("Orders", "GetById");
        source.apply(vec![(
            method_id.clone(),
            CachePolicy {
                duration: Some(Duration::from_secs(60)),
                ..CachePolicy::empty()
            },
        )]);
        assert_eq!(source.snapshot().await.unwrap().len(), 1);

        source.remove(&method_id);
        assert!(source.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn watchers_observe_added_and_removed() {
        let source = RuntimeOverrideSource::new(16);
        let mut stream = source.watch();
        let method_id = MethodId::new("Orders", "GetById");

        source.apply(vec![(method_id.clone(), CachePolicy::empty())]);
        let added = stream.next().await.unwrap();
        assert_eq!(added.reason, ChangeReason::Added);

        source.remove(&method_id);
        let removed = stream.next().await.unwrap();
        assert_eq!(removed.reason, ChangeReason::Removed);
    }
}
