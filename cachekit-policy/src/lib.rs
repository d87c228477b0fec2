//! Policy sources, resolver, registry, and pipeline for the cachekit
//! caching runtime.
//!
//! Four [`source::PolicySource`] variants (attribute-declared, fluent,
//! config-file, runtime-override) each contribute a partial policy per
//! method; [`resolver::Resolver`] folds them by ascending priority into one
//! effective [`cachekit_core::CachePolicy`], and [`pipeline::PolicyPipeline`]
//! ties registration, materialization, and live updates together.
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod source;

pub use config::{ConfigProvider, ConfigSnapshotStream, RawConfigSnapshot, RawMethodSettings, RawServiceSettings};
pub use error::{PolicyError, SourceError};
pub use pipeline::{PolicyPipeline, PolicyPipelineBuilder};
pub use registry::{Registry, ResolvedPolicy};
pub use resolver::{PolicyStream, Resolver};
pub use source::{AttributesSource, ChangeStream, ConfigFileSource, FluentSource, PolicySource, RuntimeOverrideSource};
