//! The unified error type surfaced by [`crate::CacheManager::get_or_create`]
//! and the invalidation operations.

use std::sync::Arc;

use cachekit_core::MethodId;
use thiserror::Error;

/// A factory failure shared across every single-flight waiter.
///
/// Only the message survives the hop through the broadcast channel — the
/// flight owner still gets the original typed error via its own
/// [`CacheError::Factory`]; waiters get this lighter, `Clone`-able form of
/// the same failure.
#[derive(Clone, Debug, Error)]
#[error("{0}")]
pub struct SharedFactoryError(pub Arc<str>);

impl SharedFactoryError {
    /// Captures `error`'s display text.
    pub fn new(error: &(dyn std::error::Error + 'static)) -> Self {
        SharedFactoryError(Arc::from(error.to_string()))
    }
}

/// Errors surfaced by the cache manager.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Policy resolution failed (only possible during pipeline setup; a
    /// running pipeline falls back to the last-known-good policy instead).
    #[error(transparent)]
    Policy(#[from] cachekit_policy::PolicyError),

    /// A storage layer failed in a way the coordinator could not route
    /// around.
    #[error(transparent)]
    Storage(#[from] cachekit_storage::StorageError),

    /// Cache key generation failed (e.g. an HMAC key generator missing its
    /// signing key).
    #[error(transparent)]
    KeyGen(#[from] cachekit_core::KeyGenError),

    /// The factory invoked for a miss returned an error.
    #[error("factory failed: {0}")]
    Factory(#[source] SharedFactoryError),

    /// The caller marked its factory non-idempotent, but `method_id`'s
    /// policy requires idempotency.
    #[error("method {method_id} requires an idempotent factory")]
    NonIdempotentFactory {
        /// The offending method.
        method_id: MethodId,
    },

    /// Encoding or decoding the cached value failed.
    #[error("value (de)serialization failed: {0}")]
    Serialization(Arc<dyn std::error::Error + Send + Sync>),

    /// The operation was cancelled cooperatively.
    #[error("operation cancelled")]
    Cancelled,
}
