//! Policy, key, and value data model shared by the cachekit caching runtime.
//!
//! This crate has no async runtime dependency and no I/O: it defines the
//! types that `cachekit-policy`, `cachekit-storage`, and `cachekit-manager`
//! pass between each other — method identifiers, cache policies and their
//! provenance, cache entries, and the five key-generation strategies.
#![warn(missing_docs)]

pub mod clock;
pub mod context;
pub mod error;
pub mod key;
pub mod keygen;
pub mod method_id;
pub mod policy;
pub mod snapshot;
pub mod tag;
pub mod value;

pub use clock::{Clock, SharedClock, SystemClock, system_clock};
pub use context::{CoreContext, InstanceId};
pub use error::{ConfigError, KeyGenError};
pub use key::Key;
pub use keygen::{
    Arg, FastHashKeyGenerator, HmacKeyGenerator, JsonKeyGenerator, KeyGenerator, KeyGeneratorKind,
    MessagePackKeyGenerator, SmartKeyGenerator,
};
pub use method_id::MethodId;
pub use policy::{CachePolicy, Contribution, EntityPolicyConfig, FieldMask, PolicyDelta};
pub use snapshot::{ChangeReason, PolicyChange, PolicySnapshot, SourcePriority};
pub use tag::Tag;
pub use value::CacheEntry;
