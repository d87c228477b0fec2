//! Programmatic policy configuration: a caller-supplied list of
//! `(methodId, partialPolicy)` entries, produced by a fluent builder at the
//! call site rather than parsed from a file.

use async_trait::async_trait;

use cachekit_core::{CachePolicy, MethodId, PolicySnapshot};

use crate::error::SourceError;
use crate::source::{ChangeStream, PolicySource};

/// A fixed list of programmatically-built policy entries. Read-only: one
/// snapshot per entry, no subsequent changes.
#[derive(Debug, Default)]
pub struct FluentSource {
    entries: Vec<(MethodId, CachePolicy)>,
}

impl FluentSource {
    /// Builds a source from a caller-supplied list of entries.
    pub fn new(entries: Vec<(MethodId, CachePolicy)>) -> Self {
        FluentSource { entries }
    }
}

#[async_trait]
impl PolicySource for FluentSource {
    fn source_id(&self) -> &str {
        "fluent"
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

    #[tokio::test]
    async fn one_snapshot_per_entry() {
        let source = FluentSource::new(vec![
            (
                MethodId::new("Orders", "GetById"),
                CachePolicy {
                    duration: Some(Duration::from_secs(60)),
                    ..CachePolicy::empty()
                },
            ),
            (MethodId::new("Orders", "List"), CachePolicy::empty()),
        ]);
        let snapshots = source.snapshot().await.unwrap();
        assert_eq!(snapshots.len(), 2);
    }
}
