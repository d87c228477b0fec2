//! An in-memory fake for the `Backplane` collaborator trait, built on
//! `tokio::sync::broadcast` — sufficient to exercise cross-instance
//! invalidation in tests without a real pub/sub dependency.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use cachekit_core::{InstanceId, Key, Tag};
use cachekit_storage::{Backplane, InvalidationMessage, StorageError};

/// Single-process in-memory backplane. Every subscriber receives every
/// message published after it subscribed, own-instance messages included —
/// filtering those out is `BackplaneListener`'s job, not this fake's.
#[derive(Debug)]
pub struct InMemoryBackplane {
    sender: broadcast::Sender<InvalidationMessage>,
}

impl InMemoryBackplane {
    /// Builds a fake with a 256-message broadcast buffer.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        InMemoryBackplane { sender }
    }
}

impl Default for InMemoryBackplane {
    fn default() -> Self {
        InMemoryBackplane::new()
    }
}

#[async_trait]
impl Backplane for InMemoryBackplane {
    async fn publish_invalidation(&self, origin: InstanceId, key: &Key) -> Result<(), StorageError> {
        let _ = self.sender.send(InvalidationMessage::Key {
            origin,
            key: key.clone(),
        });
        Ok(())
    }

    async fn publish_tag_invalidation(&self, origin: InstanceId, tag: &Tag) -> Result<(), StorageError> {
        let _ = self.sender.send(InvalidationMessage::Tag {
            origin,
            tag: tag.clone(),
        });
        Ok(())
    }

    async fn publish_clear_all(&self, origin: InstanceId) -> Result<(), StorageError> {
        let _ = self.sender.send(InvalidationMessage::ClearAll { origin });
        Ok(())
    }

    fn subscribe(&self) -> std::pin::Pin<Box<dyn tokio_stream::Stream<Item = InvalidationMessage> + Send>> {
        let stream = BroadcastStream::new(self.sender.subscribe()).filter_map(|item| item.ok());
        Box::pin(stream)
    }
}
