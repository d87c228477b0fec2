//! Attribute-declared policies, registered explicitly rather than discovered
//! by scanning compiled code for annotations.
//!
//! An external code-generation collaborator is expected to call
//! [`AttributesSource::register`] once per cached method at process
//! startup; this source then serves those entries read-only.

use async_trait::async_trait;

use cachekit_core::{CachePolicy, MethodId, PolicySnapshot};

use crate::error::SourceError;
use crate::source::{ChangeStream, PolicySource};

/// A fixed table of compile-time-declared policies, built once via
/// [`AttributesSource::register`] and never mutated afterward.
#[derive(Debug, Default)]
pub struct AttributesSource {
    entries: Vec<(MethodId, CachePolicy)>,
}

impl AttributesSource {
    /// Builds an empty registration table.
    pub fn new() -> Self {
        AttributesSource::default()
    }

    /// Registers the policy a code-generation collaborator computed for
    /// `method_id` from its annotation fields (duration string, tags,
    /// key-generator identifier, version, require-idempotent, and a
    /// `group` metadata entry). Missing fields mean "unset from this
    /// source", never a default.
    pub fn register(mut self, method_id: MethodId, policy: CachePolicy) -> Self {
        self.entries.push((method_id, policy));
        self
    }
}

#[async_trait]
impl PolicySource for AttributesSource {
    fn source_id(&self) -> &str {
        "attributes"
    }

    async fn snapshot(&self) -> Result<Vec<PolicySnapshot>, SourceError> {
        let now = chrono::Utc::now();
        Ok(self
            .entries
            .iter()
            .map(|(method_id, policy)| PolicySnapshot {
                source_id: self.source_id().into(),
                method_id: method_id.clone(),
                policy: policy.clone(),
                produced_at: now,
                metadata: Default::default(),
            })
            .collect())
    }

    fn watch(&self) -> ChangeStream {
        Box::pin(tokio_stream::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn registered_entries_are_returned_as_snapshots() {
        let source = AttributesSource::new().register(
            MethodId::new("Orders", "GetById"),
            CachePolicy {
                duration: Some(Duration::from_secs(300)),
                ..CachePolicy::empty()
            },
        );
        let snapshots = source.snapshot().await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].policy.duration, Some(Duration::from_secs(300)));
    }

    #[tokio::test]
    async fn is_read_only() {
        let source = AttributesSource::new();
        let mut stream = source.watch();
        assert!(stream.next().await.is_none());
    }
}
