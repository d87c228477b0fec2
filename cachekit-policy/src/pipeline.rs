//! Wires policy sources, the resolver, and the registry together: register
//! sources in priority order, materialize their starting state, and keep
//! the resolver live off each source's change stream for the pipeline's
//! lifetime.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

use cachekit_core::{CachePolicy, MethodId};

use crate::error::PolicyError;
use crate::registry::Registry;
use crate::resolver::{PolicyStream, Resolver};
use crate::source::PolicySource;

/// Builds a [`PolicyPipeline`] from an ordered list of sources.
///
/// Registration order is the tie-break for sources registered at the same
/// priority: a source registered later in the same `build()` call wins
/// ties against one registered earlier.
pub struct PolicyPipelineBuilder {
    entries: Vec<(Arc<dyn PolicySource>, i64)>,
    watch_capacity: usize,
}

impl PolicyPipelineBuilder {
    /// Starts an empty builder with the default per-method watch buffer.
    pub fn new() -> Self {
        PolicyPipelineBuilder {
            entries: Vec::new(),
            watch_capacity: 64,
        }
    }

    /// Overrides the broadcast buffer size used for each method's watch
    /// channel.
    pub fn with_watch_capacity(mut self, capacity: usize) -> Self {
        self.watch_capacity = capacity;
        self
    }

    /// Registers `source` at `priority`. Higher priority wins on conflict;
    /// see [`cachekit_core::SourcePriority`] for the recommended scale.
    pub fn register_source(mut self, source: Arc<dyn PolicySource>, priority: i64) -> Self {
        self.entries.push((source, priority));
        self
    }

    /// Materializes every registered source's current state and starts a
    /// background task per source forwarding its change stream into the
    /// resolver.
    pub async fn build(self) -> Result<PolicyPipeline, PolicyError> {
        let priorities: Vec<(i64, String)> = self
            .entries
            .iter()
            .map(|(source, priority)| (*priority, source.source_id().to_string()))
            .collect();
        let resolver = Arc::new(Resolver::new(priorities, self.watch_capacity));
        let sources: Vec<Arc<dyn PolicySource>> = self.entries.into_iter().map(|(source, _)| source).collect();

        for (idx, source) in sources.iter().enumerate() {
            let snapshot = source.snapshot().await?;
            resolver.apply_snapshot(idx, snapshot);
        }

        let mut tasks = Vec::with_capacity(sources.len());
        for (idx, source) in sources.iter().enumerate() {
            let resolver = resolver.clone();
            let mut changes = source.watch();
            tasks.push(tokio::spawn(async move {
                while let Some(change) = changes.next().await {
                    resolver.apply_change(idx, change);
                }
            }));
        }

        let registry = Registry::new(resolver.clone());
        Ok(PolicyPipeline {
            resolver,
            registry,
            tasks: Mutex::new(tasks),
        })
    }
}

impl Default for PolicyPipelineBuilder {
    fn default() -> Self {
        PolicyPipelineBuilder::new()
    }
}

/// A running set of policy sources feeding one resolver and registry.
pub struct PolicyPipeline {
    resolver: Arc<Resolver>,
    registry: Registry,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PolicyPipeline {
    /// Starts building a pipeline.
    pub fn builder() -> PolicyPipelineBuilder {
        PolicyPipelineBuilder::new()
    }

    /// The current effective policy for `method_id`.
    pub fn resolve(&self, method_id: &MethodId) -> Arc<CachePolicy> {
        self.resolver.resolve(method_id)
    }

    /// Subscribes to future resolved-policy updates for `method_id`.
    pub fn watch(&self, method_id: &MethodId) -> PolicyStream {
        self.resolver.watch(method_id)
    }

    /// Diagnostic read access over the current resolver state.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Stops every background source-forwarding task. The pipeline keeps
    /// serving `resolve`/`watch` against its last-known state afterward.
    pub fn dispose(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for PolicyPipeline {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{AttributesSource, RuntimeOverrideSource};
    use cachekit_core::SourcePriority;
    use std::time::Duration;

    #[tokio::test]
    async fn runtime_override_wins_over_attributes_on_conflicting_fields() {
        let attributes = AttributesSource::new().register(
            MethodId::new("Orders", "GetById"),
            CachePolicy {
                duration: Some(Duration::from_secs(300)),
                ..CachePolicy::empty()
            },
        );
        let overrides = RuntimeOverrideSource::new(16);
        overrides.apply(vec![(
            MethodId::new("Orders", "GetById"),
            CachePolicy {
                duration: Some(Duration::from_secs(5)),
                ..CachePolicy::empty()
            },
        )]);

        let pipeline = PolicyPipeline::builder()
            .register_source(Arc::new(attributes), SourcePriority::ATTRIBUTES.0)
            .register_source(Arc::new(overrides), SourcePriority::RUNTIME_OVERRIDE.0)
            .build()
            .await
            .unwrap();

        let resolved = pipeline.resolve(&MethodId::new("Orders", "GetById"));
        assert_eq!(resolved.duration, Some(Duration::from_secs(5)));

        pipeline.dispose();
    }

    #[tokio::test]
    async fn runtime_override_changes_propagate_to_watchers() {
        let overrides = Arc::new(RuntimeOverrideSource::new(16));
        let pipeline = PolicyPipeline::builder()
            .register_source(overrides.clone(), SourcePriority::RUNTIME_OVERRIDE.0)
            .build()
            .await
            .unwrap();

        let method_id = MethodId::new("Orders", "GetById");
        let mut stream = pipeline.watch(&method_id);

        overrides.apply(vec![(
            method_id.clone(),
            CachePolicy {
                version: Some(2),
                ..CachePolicy::empty()
            },
        )]);

        let observed = stream.next().await.unwrap();
        assert_eq!(observed.version, Some(2));

        pipeline.dispose();
    }
}
