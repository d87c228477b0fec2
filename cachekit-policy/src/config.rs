//! The `ConfigProvider` collaborator seam and the logical configuration
//! schema the `ConfigFile` source consumes.
//!
//! This crate ships the trait and the schema, not a YAML/TOML/JSON reader —
//! parsing an actual configuration file is the host application's job.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use tokio_stream::Stream;

use crate::error::SourceError;

/// Per-method settings under `services.{type}.methods.{name}`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawMethodSettings {
    /// Overrides the service-level default duration for this method.
    #[serde(default)]
    pub duration: Option<Duration>,
    /// Tags attached to entries cached by this method.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Cache key version for this method.
    #[serde(default)]
    pub version: Option<u32>,
    /// `false` means this method bypasses caching entirely.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Opaque ETag-style cache-busting token.
    #[serde(default)]
    pub e_tag: Option<String>,
}

/// Per-service-type settings under `services.{type}`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawServiceSettings {
    /// Default duration for every method of this service type, unless
    /// overridden per method.
    #[serde(default)]
    pub default_duration: Option<Duration>,
    /// Default tags for every method of this service type.
    #[serde(default)]
    pub default_tags: Vec<String>,
    /// Service-level ETag token.
    #[serde(default)]
    pub e_tag: Option<String>,
    /// Per-method overrides, keyed by method name.
    #[serde(default)]
    pub methods: BTreeMap<String, RawMethodSettings>,
}

/// A point-in-time configuration snapshot, mirroring the logical schema:
/// `{defaultDuration, globalTags, services.{type}.{...}}`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawConfigSnapshot {
    /// Process-wide default duration, applied when neither a service nor a
    /// method overrides it.
    #[serde(default)]
    pub default_duration: Option<Duration>,
    /// Process-wide default tags, merged with any service/method tags.
    #[serde(default)]
    pub global_tags: Vec<String>,
    /// Settings keyed by service type name.
    #[serde(default)]
    pub services: BTreeMap<String, RawServiceSettings>,
}

/// A stream of configuration snapshots, boxed for dyn-compatibility.
pub type ConfigSnapshotStream = Pin<Box<dyn Stream<Item = Result<RawConfigSnapshot, SourceError>> + Send>>;

/// Supplies the latest configuration snapshot and a reload stream.
///
/// The seam the excluded configuration-file parser plugs into: an
/// implementation reads and watches an actual file/remote config store and
/// hands back [`RawConfigSnapshot`] values; this crate never picks a format.
pub trait ConfigProvider: Send + Sync {
    /// Returns the current snapshot.
    fn snapshot(&self) -> Result<RawConfigSnapshot, SourceError>;

    /// A stream yielding a new snapshot every time the provider reloads.
    fn watch(&self) -> ConfigSnapshotStream;
}
