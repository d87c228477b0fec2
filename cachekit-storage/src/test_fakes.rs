//! Local mirror of `cachekit_test_support::InMemoryBackplane`, used only by
//! this crate's own unit tests.
//!
//! `cachekit-test-support` depends on `cachekit-storage` to implement the
//! `Backplane` trait, so pulling it in as a dev-dependency here would create
//! a dependency cycle that makes Cargo compile two distinct instances of
//! this crate (one for the lib-under-test, one for `cachekit-storage` as
//! seen by `cachekit-test-support`), and the `Backplane` impl from one
//! instance doesn't satisfy the trait from the other. Keeping this fake
//! in-crate avoids the cycle.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use cachekit_core::{InstanceId, Key, Tag};

use crate::{Backplane, InvalidationMessage, StorageError};

/// Single-process in-memory backplane. Every subscriber receives every
/// message published after it subscribed, own-instance messages included —
/// filtering those out is `BackplaneListener`'s job, not this fake's.
#[derive(Debug)]
pub(crate) struct InMemoryBackplane {
    sender: broadcast::Sender<InvalidationMessage>,
}

impl InMemoryBackplane {
    /// Builds a fake with a 256-message broadcast buffer.
    pub(crate) fn new() -> Self {
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
