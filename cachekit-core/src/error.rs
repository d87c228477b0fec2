//! Error kinds owned by the data-model crate.
//!
//! `SourceError`, `StorageError`, `FactoryError`, and `CancellationError`
//! are defined closer to where they are raised — `cachekit-policy`,
//! `cachekit-storage`, and `cachekit-manager` respectively — and converted
//! into the manager's unified `CacheError` via `#[from]`.

use thiserror::Error;

/// Invalid configuration supplied to the policy pipeline or key generators.
///
/// Surfaced at startup/apply time; fatal for the offending call, never
/// silently ignored.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A duration field was zero or negative.
    #[error("duration must be positive, got {0:?}")]
    NonPositiveDuration(std::time::Duration),

    /// A `MethodId` was built from an empty service type or method name.
    #[error("method id must not be empty")]
    EmptyMethodId,

    /// A tag was empty.
    #[error("tag must not be empty")]
    EmptyTag,

    /// A `PolicyDelta` had overlapping set/clear masks.
    #[error("policy delta set_mask and clear_mask overlap")]
    OverlappingDelta,

    /// A metadata key was empty.
    #[error("metadata key must not be empty")]
    EmptyMetadataKey,
}

/// Failure while generating a cache key.
#[derive(Debug, Error)]
pub enum KeyGenError {
    /// The canonical encoding step failed (e.g. non-finite float, or the
    /// JSON/MessagePack serializer rejected an argument).
    #[error("failed to canonicalize cache key arguments: {0}")]
    Canonicalization(String),

    /// An HMAC generator was used without a configured signing key.
    #[error("HMAC key generator requires a signing key")]
    MissingSigningKey,

    /// No [`KeyGenerator`](crate::keygen::KeyGenerator) is registered for a
    /// policy's selected [`KeyGeneratorKind`](crate::keygen::KeyGeneratorKind).
    #[error("no key generator registered for {0:?}")]
    UnregisteredGenerator(crate::keygen::KeyGeneratorKind),
}
