//! The cache manager: resolves a policy, generates a key, and orchestrates
//! a single-flight read-through/write-through call to the storage
//! coordinator.
//!
//! Dogpile prevention is grounded directly on the broadcast-plus-map
//! single-flight scheme this corpus uses elsewhere: one in-flight factory
//! call per key, late arrivals subscribe and receive the broadcast result,
//! and a lagged or closed receiver falls through to a fresh attempt rather
//! than hanging forever.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use cachekit_core::keygen::{Arg, FastHashKeyGenerator};
use cachekit_core::{CacheEntry, CachePolicy, Key, MethodId, Tag};
use cachekit_policy::PolicyPipeline;
use cachekit_storage::Coordinator;

use crate::error::{CacheError, SharedFactoryError};
use crate::keygen::KeyGeneratorRegistry;
use crate::options::RuntimeOptions;

#[cfg(feature = "metrics")]
use crate::metrics;

type SlotResult<T> = Result<Arc<T>, SharedFactoryError>;

enum FlightDecision<T> {
    Proceed,
    Await(broadcast::Receiver<SlotResult<T>>),
}

/// Ties a [`PolicyPipeline`] and a [`Coordinator`] together behind the
/// single public `get_or_create` read-through/write-through operation.
pub struct CacheManager {
    policies: Arc<PolicyPipeline>,
    coordinator: Arc<Coordinator>,
    key_generators: KeyGeneratorRegistry,
    in_flight: DashMap<Key, Box<dyn Any + Send + Sync>>,
    flight_capacity: usize,
}

impl CacheManager {
    /// Builds a manager over `policies` and `coordinator`, with a
    /// [`FastHashKeyGenerator`] as the only registered generator. Use
    /// [`CacheManager::with_key_generators`] to register more (e.g. an
    /// `Hmac` generator bound to a signing key).
    pub fn new(policies: Arc<PolicyPipeline>, coordinator: Arc<Coordinator>) -> Self {
        CacheManager {
            policies,
            coordinator,
            key_generators: KeyGeneratorRegistry::new(Arc::new(FastHashKeyGenerator)),
            in_flight: DashMap::new(),
            flight_capacity: 16,
        }
    }

    /// Replaces the key generator registry.
    pub fn with_key_generators(mut self, key_generators: KeyGeneratorRegistry) -> Self {
        self.key_generators = key_generators;
        self
    }

    fn generate_key(&self, method_id: &MethodId, args: &[Arg], policy: &CachePolicy) -> Result<Key, CacheError> {
        let kind = policy.key_generator.clone().unwrap_or_default();
        let generator = self.key_generators.resolve(&kind)?;
        let base = generator.generate(method_id, args)?;
        Ok(match policy.version {
            Some(version) => Key::with_version(base.as_str(), version),
            None => base,
        })
    }

    fn is_disabled(policy: &CachePolicy) -> bool {
        policy.metadata.get("enabled").map(String::as_str) == Some("false")
    }

    /// Returns the cached result for `(method_id, args)`, computing and
    /// caching it via `factory` on a miss.
    ///
    /// Concurrent calls for the same resolved key share at most one
    /// in-flight `factory` invocation; late arrivals receive the same
    /// result (or the same error) as the call that actually ran it.
    pub async fn get_or_create<T, F, Fut, E>(
        &self,
        method_id: &MethodId,
        args: &[Arg],
        factory: F,
        runtime_options: RuntimeOptions,
        cancel: &CancellationToken,
    ) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let resolved = self.policies.resolve(method_id);

        if Self::is_disabled(&resolved) {
            return factory()
                .await
                .map_err(|e| CacheError::Factory(SharedFactoryError::new(&e)));
        }

        if resolved.require_idempotent == Some(true) && runtime_options.idempotent == Some(false) {
            return Err(CacheError::NonIdempotentFactory {
                method_id: method_id.clone(),
            });
        }

        let key = self.generate_key(method_id, args, &resolved)?;

        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }

        if let Some(entry) = self.coordinator.get(&key, cancel).await? {
            #[cfg(feature = "metrics")]
            metrics::record_hit(method_id.as_str());
            return decode(entry.value());
        }

        loop {
            match self.check_flight::<T>(&key) {
                FlightDecision::Proceed => break,
                FlightDecision::Await(mut receiver) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(CacheError::Cancelled),
                        received = receiver.recv() => match received {
                            Ok(Ok(value)) => {
                                #[cfg(feature = "metrics")]
                                metrics::record_hit_after_wait(method_id.as_str());
                                return Ok((*value).clone());
                            }
                            Ok(Err(shared_err)) => return Err(CacheError::Factory(shared_err)),
                            Err(_) => continue,
                        },
                    }
                }
            }
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.in_flight.remove(&key);
                return Err(CacheError::Cancelled);
            }
            result = factory() => result,
        };

        match outcome {
            Ok(value) => {
                if let Err(err) = self.write_through(&key, &value, &resolved).await {
                    tracing::warn!(method = method_id.as_str(), error = %err, "write-through failed after factory success");
                }
                #[cfg(feature = "metrics")]
                metrics::record_miss(method_id.as_str());
                self.resolve_flight::<T>(&key, Ok(Arc::new(value.clone())));
                Ok(value)
            }
            Err(err) => {
                #[cfg(feature = "metrics")]
                metrics::record_error(method_id.as_str());
                let shared = SharedFactoryError::new(&err);
                self.resolve_flight::<T>(&key, Err(shared.clone()));
                Err(CacheError::Factory(shared))
            }
        }
    }

    fn check_flight<T: Send + Sync + 'static>(&self, key: &Key) -> FlightDecision<T> {
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let sender = entry
                    .get()
                    .downcast_ref::<broadcast::Sender<SlotResult<T>>>()
                    .expect("single-flight slot type mismatch for key");
                FlightDecision::Await(sender.subscribe())
            }
            Entry::Vacant(entry) => {
                let (sender, _receiver) = broadcast::channel::<SlotResult<T>>(self.flight_capacity);
                entry.insert(Box::new(sender));
                FlightDecision::Proceed
            }
        }
    }

    fn resolve_flight<T: Send + Sync + 'static>(&self, key: &Key, result: SlotResult<T>) {
        if let Some((_, boxed)) = self.in_flight.remove(key) {
            if let Ok(sender) = boxed.downcast::<broadcast::Sender<SlotResult<T>>>() {
                let _ = sender.send(result);
            }
        }
    }

    async fn write_through<T: Serialize>(&self, key: &Key, value: &T, policy: &CachePolicy) -> Result<(), CacheError> {
        let bytes = encode(value)?;
        let now = chrono::Utc::now();
        let expires_at = policy.duration.map(|d| now + d);
        let entry = CacheEntry::new(bytes, policy.tags.clone(), now, expires_at);
        self.coordinator.set(key, entry).await?;
        Ok(())
    }

    /// Removes every entry tagged with any of `tags`.
    pub async fn invalidate_by_tags(&self, tags: &[Tag]) -> Result<(), CacheError> {
        for tag in tags {
            self.coordinator.remove_by_tag(tag).await?;
        }
        Ok(())
    }

    /// Removes the entries for `keys`.
    pub async fn invalidate_by_keys(&self, keys: &[Key]) -> Result<(), CacheError> {
        for key in keys {
            self.coordinator.remove(key).await?;
        }
        Ok(())
    }

    /// Removes every entry whose tag matches the glob-style `pattern`.
    pub async fn invalidate_by_tag_pattern(&self, pattern: &str) -> Result<(), CacheError> {
        self.coordinator.remove_by_tag_pattern(pattern).await?;
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Bytes, CacheError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| CacheError::Serialization(Arc::new(e)))
}

fn decode<T: DeserializeOwned>(bytes: &Bytes) -> Result<T, CacheError> {
    serde_json::from_slice(bytes).map_err(|e| CacheError::Serialization(Arc::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachekit_core::clock::system_clock;
    use cachekit_storage::{AsyncWritePolicy, MemoryLayer, PromotionCaps, TagIndex};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    async fn build_manager() -> CacheManager {
        let layer: Arc<cachekit_storage::SyncLayer> = Arc::new(MemoryLayer::new("l1", 0, system_clock()));
        let coordinator = Arc::new(Coordinator::new(
            vec![layer],
            Arc::new(TagIndex::new()),
            None,
            PromotionCaps::default(),
            AsyncWritePolicy::new(),
        ));
        let pipeline = Arc::new(PolicyPipeline::builder().build().await.unwrap());
        CacheManager::new(pipeline, coordinator)
    }

    #[tokio::test]
    async fn miss_then_hit_invokes_factory_once() {
        let manager = build_manager().await;
        let method_id = MethodId::new("Orders", "GetById");
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        for _ in 0..3 {
            let calls = calls.clone();
            let value = manager
                .get_or_create(
                    &method_id,
                    &[Arg::Int(1)],
                    || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, std::io::Error>(42u32)
                        }
                    },
                    RuntimeOptions::new(),
                    &cancel,
                )
                .await
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_calls_for_same_key_share_one_factory_invocation() {
        let manager = Arc::new(build_manager().await);
        let method_id = MethodId::new("Orders", "GetById");
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            let method_id = method_id.clone();
            let calls = calls.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .get_or_create(
                        &method_id,
                        &[Arg::Int(7)],
                        || {
                            let calls = calls.clone();
                            async move {
                                calls.fetch_add(1, Ordering::SeqCst);
                                tokio::time::sleep(StdDuration::from_millis(20)).await;
                                Ok::<_, std::io::Error>(99u32)
                            }
                        },
                        RuntimeOptions::new(),
                        &cancel,
                    )
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 99);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn factory_error_is_observed_by_every_waiter() {
        let manager = Arc::new(build_manager().await);
        let method_id = MethodId::new("Orders", "GetById");
        let cancel = CancellationToken::new();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let manager = manager.clone();
            let method_id = method_id.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .get_or_create::<u32, _, _, _>(
                        &method_id,
                        &[Arg::Int(3)],
                        || async {
                            tokio::time::sleep(StdDuration::from_millis(10)).await;
                            Err(std::io::Error::other("upstream exploded"))
                        },
                        RuntimeOptions::new(),
                        &cancel,
                    )
                    .await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap();
            assert!(matches!(result, Err(CacheError::Factory(_))));
        }
    }

    #[tokio::test]
    async fn non_idempotent_call_is_refused_when_policy_requires_idempotency() {
        let overrides = cachekit_policy::RuntimeOverrideSource::new(16);
        let method_id = MethodId::new("Orders", "Charge");
        overrides.apply(vec![(
            method_id.clone(),
            CachePolicy {
                require_idempotent: Some(true),
                ..CachePolicy::empty()
            },
        )]);

        let layer: Arc<cachekit_storage::SyncLayer> = Arc::new(MemoryLayer::new("l1", 0, system_clock()));
        let coordinator = Arc::new(Coordinator::new(
            vec![layer],
            Arc::new(TagIndex::new()),
            None,
            PromotionCaps::default(),
            AsyncWritePolicy::new(),
        ));
        let pipeline = Arc::new(
            PolicyPipeline::builder()
                .register_source(Arc::new(overrides), 100)
                .build()
                .await
                .unwrap(),
        );
        let manager = CacheManager::new(pipeline, coordinator);
        let cancel = CancellationToken::new();

        let result = manager
            .get_or_create(
                &method_id,
                &[],
                || async { Ok::<_, std::io::Error>(1u32) },
                RuntimeOptions::new().non_idempotent(),
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(CacheError::NonIdempotentFactory { .. })));
    }
}
