//! Resolves a policy's [`KeyGeneratorKind`] to a constructed
//! [`KeyGenerator`] instance.
//!
//! `KeyGeneratorKind` travels as a plain descriptor so it can be compared,
//! merged across policy sources, and serialized; the manager is what pairs
//! it with an actual implementation (and, for `Hmac`, the signing key that
//! must never live inside a policy).

use std::sync::Arc;

use cachekit_core::keygen::{KeyGenerator, KeyGeneratorKind};
use cachekit_core::KeyGenError;

/// An ordered list of available key generators, matched against a policy's
/// `KeyGeneratorKind` by equality (including, for `Hmac`, the `key_id`).
pub struct KeyGeneratorRegistry {
    generators: Vec<Arc<dyn KeyGenerator>>,
}

impl KeyGeneratorRegistry {
    /// Starts a registry with `default` (normally a
    /// [`cachekit_core::FastHashKeyGenerator`]) as its only entry.
    pub fn new(default: Arc<dyn KeyGenerator>) -> Self {
        KeyGeneratorRegistry {
            generators: vec![default],
        }
    }

    /// Registers another generator, e.g. an `Hmac` variant bound to a
    /// specific signing key.
    pub fn with_generator(mut self, generator: Arc<dyn KeyGenerator>) -> Self {
        self.generators.push(generator);
        self
    }

    /// Finds the generator matching `kind`, if any.
    pub fn resolve(&self, kind: &KeyGeneratorKind) -> Result<&Arc<dyn KeyGenerator>, KeyGenError> {
        self.generators
            .iter()
            .find(|generator| &generator.kind() == kind)
            .ok_or_else(|| KeyGenError::UnregisteredGenerator(kind.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachekit_core::FastHashKeyGenerator;

    #[test]
    fn falls_back_to_default_for_default_kind() {
        let registry = KeyGeneratorRegistry::new(Arc::new(FastHashKeyGenerator));
        let resolved = registry.resolve(&KeyGeneratorKind::FastHash).unwrap();
        assert_eq!(resolved.kind(), KeyGeneratorKind::FastHash);
    }

    #[test]
    fn unregistered_kind_is_an_error() {
        let registry = KeyGeneratorRegistry::new(Arc::new(FastHashKeyGenerator));
        assert!(registry.resolve(&KeyGeneratorKind::Json).is_err());
    }
}
