//! Externally-managed configuration, read through the [`ConfigProvider`]
//! seam rather than any particular file format.
//!
//! `{defaultDuration, globalTags}` apply to every method at the lowest
//! within-source precedence, a service's `default_duration`/`default_tags`
//! override those for its methods, and a method's own settings override
//! both. Reloads are diffed against the previous snapshot: every entry
//! present in the new snapshot is reported as a coarse `Updated`, and any
//! entry that disappeared is synthesized as `Removed` so watchers never
//! silently miss a deletion.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt as _;

use cachekit_core::{CachePolicy, ChangeReason, MethodId, PolicyChange, PolicyDelta, PolicySnapshot, Tag};

use crate::config::{ConfigProvider, RawConfigSnapshot, RawMethodSettings, RawServiceSettings};
use crate::error::SourceError;
use crate::source::{ChangeStream, PolicySource};

fn merge_tags(base: &[String], overlay: &[String]) -> Vec<Tag> {
    if overlay.is_empty() {
        base.iter().map(Tag::new).collect()
    } else {
        overlay.iter().map(Tag::new).collect()
    }
}

fn method_policy(
    snapshot: &RawConfigSnapshot,
    service: &RawServiceSettings,
    method: &RawMethodSettings,
) -> CachePolicy {
    let mut policy = CachePolicy::empty();

    if let Some(duration) = snapshot.default_duration {
        policy.duration = Some(duration);
    }
    if !snapshot.global_tags.is_empty() {
        policy.tags = merge_tags(&snapshot.global_tags, &[]);
    }

    if let Some(duration) = service.default_duration {
        policy.duration = Some(duration);
    }
    if !service.default_tags.is_empty() {
        policy.tags = merge_tags(&service.default_tags, &[]);
    }
    if let Some(e_tag) = &service.e_tag {
        policy.metadata.insert("e_tag".to_string(), e_tag.clone());
    }

    if let Some(duration) = method.duration {
        policy.duration = Some(duration);
    }
    if !method.tags.is_empty() {
        policy.tags = merge_tags(&method.tags, &[]);
    }
    if let Some(version) = method.version {
        policy.version = Some(version);
    }
    if let Some(enabled) = method.enabled {
        policy.metadata.insert("enabled".to_string(), enabled.to_string());
    }
    if let Some(e_tag) = &method.e_tag {
        policy.metadata.insert("e_tag".to_string(), e_tag.clone());
    }

    policy
}

fn flatten(snapshot: &RawConfigSnapshot) -> BTreeMap<MethodId, CachePolicy> {
    let mut out = BTreeMap::new();
    for (service_name, service) in &snapshot.services {
        for (method_name, method) in &service.methods {
            let method_id = MethodId::new(service_name, method_name);
            out.insert(method_id, method_policy(snapshot, service, method));
        }
    }
    out
}

/// Policies sourced from an externally-managed configuration snapshot.
pub struct ConfigFileSource {
    provider: Arc<dyn ConfigProvider>,
    last: Mutex<BTreeMap<MethodId, CachePolicy>>,
}

impl std::fmt::Debug for ConfigFileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigFileSource")
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}

impl ConfigFileSource {
    /// Builds a source backed by `provider`.
    pub fn new(provider: Arc<dyn ConfigProvider>) -> Self {
        ConfigFileSource {
            provider,
            last: Mutex::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl PolicySource for ConfigFileSource {
    fn source_id(&self) -> &str {
        "config-file"
    }

    async fn snapshot(&self) -> Result<Vec<PolicySnapshot>, SourceError> {
        let raw = self.provider.snapshot()?;
        let entries = flatten(&raw);
        let now = chrono::Utc::now();
        let snapshots = entries
            .iter()
            .map(|(method_id, policy)| PolicySnapshot {
                source_id: self.source_id().into(),
                method_id: method_id.clone(),
                policy: policy.clone(),
                produced_at: now,
                metadata: Default::default(),
            })
            .collect();
        *self.last.lock().unwrap() = entries;
        Ok(snapshots)
    }

    fn watch(&self) -> ChangeStream {
        let provider_stream = self.provider.watch();
        let last = Mutex::new(self.last.lock().unwrap().clone());
        let source_id = self.source_id().to_string();

        let stream = provider_stream.map(move |item| {
            let raw = match item {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::warn!(error = %err, "config provider reload failed");
                    return Vec::new();
                }
            };
            let fresh = flatten(&raw);
            let now = chrono::Utc::now();
            let mut previous = last.lock().unwrap();

            let mut changes = Vec::new();
            for (method_id, policy) in &fresh {
                changes.push(PolicyChange {
                    source_id: source_id.clone().into(),
                    method_id: method_id.clone(),
                    delta: PolicyDelta::set_all(policy.clone()),
                    reason: ChangeReason::Updated,
                    at: now,
                });
            }
            for (method_id, stale_policy) in previous.iter() {
                if !fresh.contains_key(method_id) {
                    changes.push(PolicyChange {
                        source_id: source_id.clone().into(),
                        method_id: method_id.clone(),
                        delta: PolicyDelta::clear_fields(stale_policy.populated_fields()),
                        reason: ChangeReason::Removed,
                        at: now,
                    });
                }
            }

            *previous = fresh;
            changes
        });

        Box::pin(stream.flat_map(tokio_stream::iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio_stream::wrappers::WatchStream;

    struct FakeProvider {
        current: tokio::sync::watch::Sender<RawConfigSnapshot>,
    }

    impl ConfigProvider for FakeProvider {
        fn snapshot(&self) -> Result<RawConfigSnapshot, SourceError> {
            Ok(self.current.borrow().clone())
        }

        fn watch(&self) -> crate::config::ConfigSnapshotStream {
            let receiver = self.current.subscribe();
            Box::pin(WatchStream::new(receiver).map(Ok))
        }
    }

    fn snapshot_with_one_method(duration_secs: u64) -> RawConfigSnapshot {
        let mut methods = BTreeMap::new();
        methods.insert(
            "GetById".to_string(),
            RawMethodSettings {
                duration: Some(Duration::from_secs(duration_secs)),
                ..Default::default()
            },
        );
        let mut services = BTreeMap::new();
        services.insert(
            "Orders".to_string(),
            RawServiceSettings {
                methods,
                ..Default::default()
            },
        );
        RawConfigSnapshot {
            services,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn snapshot_reads_nested_method_settings() {
        let (tx, _rx) = tokio::sync::watch::channel(snapshot_with_one_method(60));
        let source = ConfigFileSource::new(Arc::new(FakeProvider { current: tx }));

        let snapshots = source.snapshot().await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].policy.duration, Some(Duration::from_secs(60)));
        assert_eq!(snapshots[0].method_id, MethodId::new("Orders", "GetById"));
    }

    #[tokio::test]
    async fn removed_method_is_synthesized_on_reload() {
        let (tx, _rx) = tokio::sync::watch::channel(snapshot_with_one_method(60));
        let source = ConfigFileSource::new(Arc::new(FakeProvider { current: tx.clone() }));
        source.snapshot().await.unwrap();

        let mut stream = source.watch();
        tx.send(RawConfigSnapshot::default()).unwrap();

        let change = stream.next().await.unwrap();
        assert_eq!(change.reason, ChangeReason::Removed);
        assert_eq!(change.method_id, MethodId::new("Orders", "GetById"));
    }
}
