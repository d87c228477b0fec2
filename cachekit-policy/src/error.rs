//! Errors raised by policy sources and the resolver.

use smol_str::SmolStr;
use thiserror::Error;

/// Failure raised by a [`PolicySource`](crate::source::PolicySource) while
/// producing a snapshot or change stream.
///
/// A failed source is skipped for resolution but keeps its last-known-good
/// contribution in the resolver until it recovers.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source's backing collaborator (config provider, attribute
    /// registry, ...) failed to produce a snapshot.
    #[error("policy source {source_id} failed: {cause}")]
    Failed {
        /// The failing source's id.
        source_id: SmolStr,
        /// The underlying collaborator error.
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Errors surfaced by `cachekit-policy` as a whole: invalid configuration
/// plus source failures, unified so callers outside this crate only need to
/// match one type.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Invalid policy configuration (negative duration, empty method id, ...).
    #[error(transparent)]
    Config(#[from] cachekit_core::ConfigError),

    /// A policy source failed to produce a snapshot or change.
    #[error(transparent)]
    Source(#[from] SourceError),
}
