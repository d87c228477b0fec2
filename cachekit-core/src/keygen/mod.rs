//! Cache key generation.
//!
//! A [`CachePolicy`](crate::policy::CachePolicy) names which generator to
//! use via [`KeyGeneratorKind`]; the actual [`KeyGenerator`] implementation
//! is resolved from that descriptor by whichever crate owns the call path
//! (the manager, in practice) so that a `Hmac` kind can be paired with a
//! signing key that never lives inside the policy itself.

pub mod canonical;
mod fasthash;
mod hmac;
mod json;
mod msgpack;
mod smart;

use std::fmt;

pub use canonical::{Arg, MethodArgs};
pub use fasthash::FastHashKeyGenerator;
pub use hmac::HmacKeyGenerator;
pub use json::JsonKeyGenerator;
pub use msgpack::MessagePackKeyGenerator;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
pub use smart::SmartKeyGenerator;

use crate::error::KeyGenError;
use crate::key::Key;
use crate::method_id::MethodId;

/// Which key-generation strategy a policy selects.
///
/// This is a descriptor, not an implementation: it travels with the policy
/// (serialized in config files, compared for equality, merged across
/// sources) while the matching [`KeyGenerator`] is constructed once, out of
/// band, by whoever owns the signing key material for `Hmac`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeyGeneratorKind {
    /// Non-cryptographic FNV-1a hash. Fast, not collision-resistant against
    /// an adversarial caller.
    FastHash,
    /// Keyed HMAC-SHA256, identified by which signing key to use.
    Hmac {
        /// Identifies which configured signing key to sign with.
        key_id: SmolStr,
    },
    /// Canonical sorted-key JSON text.
    Json,
    /// Deterministic MessagePack encoding, digested with SHA-256.
    MessagePack,
    /// Human-readable key built only from explicit arguments — no
    /// reflection over call-site closures or source spans.
    Smart,
}

impl Default for KeyGeneratorKind {
    fn default() -> Self {
        KeyGeneratorKind::FastHash
    }
}

/// Produces a [`Key`] from a method id and its canonicalized arguments.
pub trait KeyGenerator: Send + Sync + fmt::Debug {
    /// Generates a key for `method_id` called with `args`.
    fn generate(&self, method_id: &MethodId, args: &[Arg]) -> Result<Key, KeyGenError>;

    /// The descriptor this implementation corresponds to.
    fn kind(&self) -> KeyGeneratorKind;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_kind_is_fasthash() {
        assert_eq!(KeyGeneratorKind::default(), KeyGeneratorKind::FastHash);
    }

    #[test]
    fn kind_round_trips_through_json() {
        let kind = KeyGeneratorKind::Hmac {
            key_id: "primary".into(),
        };
        let encoded = serde_json::to_string(&kind).unwrap();
        let decoded: KeyGeneratorKind = serde_json::from_str(&encoded).unwrap();
        assert_eq!(kind, decoded);
    }
}
