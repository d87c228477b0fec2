//! The merge/fold resolver: turns per-source contributions into one
//! effective [`CachePolicy`] per method, and publishes it to watchers.
//!
//! Registered sources are folded left-to-right in ascending priority, with
//! same-priority sources broken by registration order (the later-registered
//! source wins). Each source's contribution is tracked independently, so a
//! source that stops contributing (a `Removed` change, or disappearing from
//! a reload) only removes its own fields from the fold rather than
//! resetting the whole method.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use cachekit_core::{CachePolicy, ChangeReason, Contribution, MethodId, PolicyChange, PolicySnapshot};

/// A stream of resolved policies for one method, boxed for dyn-compatibility.
pub type PolicyStream = Pin<Box<dyn Stream<Item = Arc<CachePolicy>> + Send>>;

struct MethodState {
    per_source: BTreeMap<usize, CachePolicy>,
    current: Arc<RwLock<Arc<CachePolicy>>>,
    watchers: broadcast::Sender<Arc<CachePolicy>>,
}

impl MethodState {
    fn new(watch_capacity: usize) -> Self {
        let (watchers, _) = broadcast::channel(watch_capacity);
        MethodState {
            per_source: BTreeMap::new(),
            current: Arc::new(RwLock::new(Arc::new(CachePolicy::empty()))),
            watchers,
        }
    }
}

fn fold(per_source: &BTreeMap<usize, CachePolicy>, priorities: &[(i64, String)]) -> CachePolicy {
    let mut order: Vec<usize> = per_source.keys().copied().collect();
    order.sort_by_key(|idx| (priorities[*idx].0, *idx));

    let mut effective = CachePolicy::empty();
    let mut provenance = Vec::new();
    let now = chrono::Utc::now();
    for idx in order {
        let contribution = &per_source[&idx];
        let mask = contribution.populated_fields();
        if mask.is_empty() {
            continue;
        }
        effective.overlay(contribution, mask);
        provenance.push(Contribution {
            source_id: priorities[idx].1.as_str().into(),
            fields: mask,
            applied_at: now,
        });
    }
    effective.provenance = provenance;
    effective
}

/// Folds registered sources' contributions into one effective policy per
/// method, tracking contributions by registration index so a same-priority
/// tie is broken by whichever source registered later.
pub struct Resolver {
    priorities: Vec<(i64, String)>,
    methods: DashMap<MethodId, MethodState>,
    watch_capacity: usize,
}

impl Resolver {
    /// Builds a resolver over `priorities`, one `(priority, source_id)` per
    /// registration index — index 0 is the first-registered source.
    pub fn new(priorities: Vec<(i64, String)>, watch_capacity: usize) -> Self {
        Resolver {
            priorities,
            methods: DashMap::new(),
            watch_capacity,
        }
    }

    /// Looks up the registration index for `source_id`, if registered.
    pub fn source_index(&self, source_id: &str) -> Option<usize> {
        self.priorities.iter().position(|(_, id)| id == source_id)
    }

    /// Replaces `source_idx`'s entire contribution set with `snapshots`,
    /// dropping any method that source no longer lists. Used once at
    /// startup to materialize each source's current state.
    pub fn apply_snapshot(&self, source_idx: usize, snapshots: Vec<PolicySnapshot>) {
        for snapshot in snapshots {
            self.set_contribution(source_idx, snapshot.method_id, snapshot.policy);
        }
    }

    /// Applies one incremental [`PolicyChange`] from `source_idx`.
    pub fn apply_change(&self, source_idx: usize, change: PolicyChange) {
        if change.delta.is_invalid() {
            tracing::warn!(
                source_idx,
                method_id = %change.method_id,
                "dropping policy change with overlapping set/clear masks"
            );
            return;
        }

        let mut entry = self
            .methods
            .entry(change.method_id.clone())
            .or_insert_with(|| MethodState::new(self.watch_capacity));

        let contribution = entry
            .per_source
            .entry(source_idx)
            .or_insert_with(CachePolicy::empty);
        contribution.overlay(&change.delta.new_values, change.delta.set_mask);
        contribution.clear(change.delta.clear_mask);

        if change.reason == ChangeReason::Removed && contribution.populated_fields().is_empty() {
            entry.per_source.remove(&source_idx);
        }

        let effective = Arc::new(fold(&entry.per_source, &self.priorities));
        *entry.current.write().unwrap() = effective.clone();
        let _ = entry.watchers.send(effective);
    }

    fn set_contribution(&self, source_idx: usize, method_id: MethodId, policy: CachePolicy) {
        let mut entry = self
            .methods
            .entry(method_id)
            .or_insert_with(|| MethodState::new(self.watch_capacity));
        entry.per_source.insert(source_idx, policy);
        let effective = Arc::new(fold(&entry.per_source, &self.priorities));
        *entry.current.write().unwrap() = effective.clone();
        let _ = entry.watchers.send(effective);
    }

    /// Returns the currently-resolved policy for `method_id`, or the empty
    /// policy if no source has ever contributed to it.
    pub fn resolve(&self, method_id: &MethodId) -> Arc<CachePolicy> {
        self.methods
            .get(method_id)
            .map(|state| state.current.read().unwrap().clone())
            .unwrap_or_else(|| Arc::new(CachePolicy::empty()))
    }

    /// Subscribes to future resolved-policy updates for `method_id`. On a
    /// lagged receiver, resynchronizes by re-emitting the latest policy
    /// rather than silently dropping the gap.
    pub fn watch(&self, method_id: &MethodId) -> PolicyStream {
        let entry = self
            .methods
            .entry(method_id.clone())
            .or_insert_with(|| MethodState::new(self.watch_capacity));
        let receiver = entry.watchers.subscribe();
        let current = entry.current.clone();
        drop(entry);

        let stream = BroadcastStream::new(receiver).filter_map(move |item| match item {
            Ok(policy) => Some(policy),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "policy watch lagged, resynchronizing to latest");
                Some(current.read().unwrap().clone())
            }
        });
        Box::pin(stream)
    }

    /// Method ids that `source_idx` currently contributes to.
    pub fn methods_for_source(&self, source_idx: usize) -> Vec<MethodId> {
        self.methods
            .iter()
            .filter(|entry| entry.value().per_source.contains_key(&source_idx))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// The provenance chain behind `method_id`'s current effective policy.
    pub fn contributions(&self, method_id: &MethodId) -> Vec<Contribution> {
        self.resolve(method_id).provenance.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachekit_core::{FieldMask, PolicyDelta};
    use std::time::Duration;

    fn change(
        source_id: &str,
        method_id: MethodId,
        delta: PolicyDelta,
        reason: ChangeReason,
    ) -> PolicyChange {
        PolicyChange {
            source_id: source_id.into(),
            method_id,
            delta,
            reason,
            at: chrono::Utc::now(),
        }
    }

    #[test]
    fn higher_priority_source_overrides_lower() {
        let resolver = Resolver::new(
            vec![(10, "attributes".to_string()), (100, "runtime-override".to_string())],
            16,
        );
        let method_id = MethodId::new("Orders", "GetById");

        resolver.apply_change(
            0,
            change(
                "attributes",
                method_id.clone(),
                PolicyDelta::set_all(CachePolicy {
                    duration: Some(Duration::from_secs(60)),
                    ..CachePolicy::empty()
                }),
                ChangeReason::Added,
            ),
        );
        resolver.apply_change(
            1,
            change(
                "runtime-override",
                method_id.clone(),
                PolicyDelta::set_all(CachePolicy {
                    duration: Some(Duration::from_secs(5)),
                    ..CachePolicy::empty()
                }),
                ChangeReason::Added,
            ),
        );

        let effective = resolver.resolve(&method_id);
        assert_eq!(effective.duration, Some(Duration::from_secs(5)));
        assert_eq!(effective.provenance.len(), 2);
    }

    #[test]
    fn same_priority_tie_goes_to_later_registered_source() {
        let resolver = Resolver::new(
            vec![(10, "first".to_string()), (10, "second".to_string())],
            16,
        );
        let method_id = MethodId::new("Orders", "GetById");

        resolver.apply_change(
            0,
            change(
                "first",
                method_id.clone(),
                PolicyDelta::set_all(CachePolicy {
                    version: Some(1),
                    ..CachePolicy::empty()
                }),
                ChangeReason::Added,
            ),
        );
        resolver.apply_change(
            1,
            change(
                "second",
                method_id.clone(),
                PolicyDelta::set_all(CachePolicy {
                    version: Some(2),
                    ..CachePolicy::empty()
                }),
                ChangeReason::Added,
            ),
        );

        assert_eq!(resolver.resolve(&method_id).version, Some(2));
    }

    #[test]
    fn removing_a_source_contribution_falls_back_to_the_remaining_ones() {
        let resolver = Resolver::new(vec![(10, "attributes".to_string())], 16);
        let method_id = MethodId::new("Orders", "GetById");

        resolver.apply_change(
            0,
            change(
                "attributes",
                method_id.clone(),
                PolicyDelta::set_all(CachePolicy {
                    duration: Some(Duration::from_secs(60)),
                    ..CachePolicy::empty()
                }),
                ChangeReason::Added,
            ),
        );
        assert_eq!(resolver.resolve(&method_id).duration, Some(Duration::from_secs(60)));

        resolver.apply_change(
            0,
            change(
                "attributes",
                method_id.clone(),
                PolicyDelta::clear_fields(FieldMask::DURATION),
                ChangeReason::Removed,
            ),
        );
        assert_eq!(resolver.resolve(&method_id).duration, None);
    }

    #[tokio::test]
    async fn watchers_observe_resolved_updates() {
        let resolver = Resolver::new(vec![(10, "attributes".to_string())], 16);
        let method_id = MethodId::new("Orders", "GetById");
        let mut stream = resolver.watch(&method_id);

        resolver.apply_change(
            0,
            change(
                "attributes",
                method_id.clone(),
                PolicyDelta::set_all(CachePolicy {
                    version: Some(7),
                    ..CachePolicy::empty()
                }),
                ChangeReason::Added,
            ),
        );

        let observed = stream.next().await.unwrap();
        assert_eq!(observed.version, Some(7));
    }
}
