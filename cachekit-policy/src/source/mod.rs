//! Policy source variants: Attributes, Fluent, ConfigFile, RuntimeOverride.

pub mod attributes;
pub mod config_file;
pub mod fluent;
pub mod runtime_override;

use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;

use cachekit_core::{PolicyChange, PolicySnapshot};

use crate::error::SourceError;

pub use attributes::AttributesSource;
pub use config_file::ConfigFileSource;
pub use fluent::FluentSource;
pub use runtime_override::RuntimeOverrideSource;

/// A stream of [`PolicyChange`]s, boxed for dyn-compatibility.
pub type ChangeStream = Pin<Box<dyn Stream<Item = PolicyChange> + Send>>;

/// One contributor to the effective policy for a set of methods.
///
/// `snapshot` returns the source's complete current state (finite,
/// restartable); `watch` is a hot stream of incremental changes beginning
/// from the subscription point. Ordering within a source is FIFO per
/// method id.
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// Stable identifier for this source, used in provenance and logs.
    fn source_id(&self) -> &str;

    /// The source's current contributions.
    async fn snapshot(&self) -> Result<Vec<PolicySnapshot>, SourceError>;

    /// A stream of incremental changes. Sources that never change after
    /// construction (Attributes, Fluent) return an empty stream.
    fn watch(&self) -> ChangeStream;
}
