//! Cross-instance invalidation fan-out.
//!
//! Wraps a pub/sub-shaped [`Backplane`] collaborator, tagging every outgoing
//! message with this process's [`InstanceId`] and discarding inbound
//! messages that carry the same id — the loop-prevention invariant: a node
//! must never reprocess its own invalidation broadcast.

use async_trait::async_trait;
use tokio_stream::Stream;

use cachekit_core::{InstanceId, Key, Tag};

use crate::error::StorageError;

/// One cross-instance invalidation event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvalidationMessage {
    /// A single key was invalidated.
    Key {
        /// Originating instance.
        origin: InstanceId,
        /// The invalidated key.
        key: Key,
    },
    /// Every entry carrying `tag` was invalidated.
    Tag {
        /// Originating instance.
        origin: InstanceId,
        /// The invalidated tag.
        tag: Tag,
    },
    /// Every entry was invalidated.
    ClearAll {
        /// Originating instance.
        origin: InstanceId,
    },
}

impl InvalidationMessage {
    /// The instance that published this message.
    pub fn origin(&self) -> InstanceId {
        match self {
            InvalidationMessage::Key { origin, .. } => *origin,
            InvalidationMessage::Tag { origin, .. } => *origin,
            InvalidationMessage::ClearAll { origin } => *origin,
        }
    }
}

/// Publishes and subscribes to cross-instance invalidation events.
///
/// Specified only as a trait; no concrete transport ships in this crate
/// (`cachekit-test-support` provides an in-memory fake built on
/// `tokio::sync::broadcast` for tests).
#[async_trait]
pub trait Backplane: Send + Sync {
    /// Publishes a single-key invalidation.
    async fn publish_invalidation(&self, origin: InstanceId, key: &Key) -> Result<(), StorageError>;

    /// Publishes a tag invalidation.
    async fn publish_tag_invalidation(&self, origin: InstanceId, tag: &Tag) -> Result<(), StorageError>;

    /// Publishes a clear-everything invalidation.
    async fn publish_clear_all(&self, origin: InstanceId) -> Result<(), StorageError>;

    /// Subscribes to the invalidation stream. Each call yields an
    /// independent stream of every message published after subscription,
    /// including this process's own (the [`BackplaneListener`] is
    /// responsible for filtering those back out).
    fn subscribe(&self) -> std::pin::Pin<Box<dyn Stream<Item = InvalidationMessage> + Send>>;
}

/// Wraps a [`Backplane`] with this process's instance id, publishing
/// outbound events and filtering out echoes of its own messages from the
/// inbound stream.
pub struct BackplaneListener {
    instance_id: InstanceId,
    inner: std::sync::Arc<dyn Backplane>,
}

impl BackplaneListener {
    /// Builds a listener tagging outgoing messages with `instance_id`.
    pub fn new(instance_id: InstanceId, inner: std::sync::Arc<dyn Backplane>) -> Self {
        BackplaneListener { instance_id, inner }
    }

    /// Publishes a single-key invalidation, logging (not propagating)
    /// transport failures.
    pub async fn publish_invalidation(&self, key: &Key) {
        if let Err(err) = self.inner.publish_invalidation(self.instance_id, key).await {
            tracing::warn!(error = %err, "backplane publish_invalidation failed");
        }
    }

    /// Publishes a tag invalidation, logging (not propagating) transport
    /// failures.
    pub async fn publish_tag_invalidation(&self, tag: &Tag) {
        if let Err(err) = self
            .inner
            .publish_tag_invalidation(self.instance_id, tag)
            .await
        {
            tracing::warn!(error = %err, "backplane publish_tag_invalidation failed");
        }
    }

    /// Publishes a clear-everything invalidation, logging (not propagating)
    /// transport failures.
    pub async fn publish_clear_all(&self) {
        if let Err(err) = self.inner.publish_clear_all(self.instance_id).await {
            tracing::warn!(error = %err, "backplane publish_clear_all failed");
        }
    }

    /// Subscribes to invalidation events originating from *other* instances.
    /// Messages this process published itself are filtered out.
    pub fn subscribe_foreign(&self) -> impl Stream<Item = InvalidationMessage> + Send {
        use tokio_stream::StreamExt;
        let own_id = self.instance_id;
        self.inner
            .subscribe()
            .filter(move |message| message.origin() != own_id)
    }
}
