//! Errors raised by the storage layer contract and coordinator.

use thiserror::Error;

/// Failure surfaced by a [`StorageLayer`](crate::layer::StorageLayer) or the
/// [`Coordinator`](crate::coordinator::Coordinator) driving it.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A layer could not be reached (distributed/persistent backend down,
    /// connection refused, timeout).
    #[error("storage layer {layer} unavailable: {source}")]
    Unavailable {
        /// The layer's id, as reported by [`StorageLayer::id`](crate::layer::StorageLayer::id).
        layer: String,
        /// The underlying collaborator error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The async write queue was full and rejected a write.
    #[error("async write queue rejected item for layer {layer} (queue full)")]
    QueueFull {
        /// The layer the rejected write targeted.
        layer: String,
    },

    /// The operation's cancellation token was triggered before it completed.
    #[error("storage operation cancelled")]
    Cancelled,

    /// A backplane publish or subscribe call failed. Never fatal to the
    /// calling operation — logged and otherwise ignored, per spec.
    #[error("backplane operation failed: {0}")]
    Backplane(String),
}
