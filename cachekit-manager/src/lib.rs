//! Cache manager for the cachekit caching runtime: resolves a policy,
//! generates a key, and single-flights factory calls behind the storage
//! [`cachekit_storage::Coordinator`].
#![warn(missing_docs)]

pub mod error;
pub mod keygen;
pub mod manager;
pub mod options;

#[cfg(feature = "metrics")]
pub mod metrics;

pub use error::{CacheError, SharedFactoryError};
pub use keygen::KeyGeneratorRegistry;
pub use manager::CacheManager;
pub use options::RuntimeOptions;
